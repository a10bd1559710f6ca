//! Custom error types for the sdts-reader crate.

use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// I/O failures are wrapped verbatim; everything else describes structural
/// corruption in the transfer file. Structural errors are not retryable,
/// the file is what it is, but the caller decides whether one bad file
/// aborts a whole batch.
#[derive(Debug, Error)]
pub enum SdtsError {
    /// An error originating from I/O operations.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a record.
    #[error("Truncated record: expected {expected} bytes, got {found}")]
    TruncatedRecord { expected: usize, found: usize },

    /// The 24-byte record leader is malformed (non-numeric length, unknown
    /// leader identifier, entry-map width out of range, bad base address).
    #[error("Invalid record leader: {0}")]
    InvalidLeader(String),

    /// A long record's directory did not terminate within the scan window.
    #[error("Directory terminator not found within {scanned} bytes")]
    UnterminatedDirectory { scanned: usize },

    /// A reserved tag (all zeros plus a selector digit of 2 or more) was
    /// found in the descriptor record. Only selectors 0 and 1 are defined.
    #[error("Reserved tag {0} uses an unsupported selector")]
    ReservedTag(String),

    /// A data record references a tag the descriptor record never declared.
    #[error("Data record references tag {0} absent from the descriptor record")]
    UnknownTag(String),

    /// The subfield format string violates the mini-language grammar.
    #[error("Format string syntax error: {0}")]
    FormatSyntax(String),

    /// A binary (`B`) format spec declared a bit width that is not a whole
    /// number of bytes.
    #[error("Binary subfield width of {0} bits is not a whole number of bytes")]
    BitWidthNotByteAligned(u32),

    /// A field declared both subfield labels and format specs, but their
    /// counts disagree.
    #[error("Subfield label/format count mismatch: {labels} labels vs {formats} formats")]
    LabelFormatMismatch { labels: usize, formats: usize },

    /// The file is structurally invalid in a way not covered above.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// A convenience `Result` type alias using the crate's `SdtsError` type.
pub type Result<T> = std::result::Result<T, SdtsError>;
