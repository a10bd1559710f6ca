//! # sdts-reader
//!
//! A reader for USGS SDTS spatial transfer files, built on the ISO 8211
//! self-describing record format. Handles plain and gzip-compressed files,
//! the long-record escape, and leaderless terminal records.
//!
//! The decoder is entirely metadata-driven: the file's first record (the
//! Data Descriptor Record) is compiled into an in-memory schema, which then
//! carves every following data record into typed, labeled subfields.
//!
//! ```no_run
//! use sdts_reader::SdtsReader;
//!
//! # fn main() -> sdts_reader::Result<()> {
//! let mut reader = SdtsReader::open("1107CEL0.DDF")?;
//! while let Some(subfield) = reader.next_subfield()? {
//!     println!("{}/{}: {} bytes", subfield.tag(), subfield.label(), subfield.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Binary (`B`-format) subfield payloads are returned as raw, unswabbed
//! bytes; byte-order interpretation depends on the producing platform and
//! is left to the caller.
pub mod iso8211;

// Re-export the main types for convenience
pub use iso8211::{
    ByteSource, FieldDescriptor, FieldStructure, FormatSpec, OwnedSubfield, Result, SdtsError,
    SdtsReader, Subfield, SubfieldLabel,
};
