//! Low-level byte scanning utilities

use super::error::{Result, SdtsError};
use super::models::{FIELD_TERMINATOR, UNIT_TERMINATOR};

/// Parse a blank-padded ASCII decimal field.
///
/// Leading and trailing blanks are tolerated; an all-blank field is an
/// error. Used for the leader's base address and the directory's length and
/// position fields.
pub(crate) fn ascii_usize(bytes: &[u8], what: &str) -> Result<usize> {
    let text = trim_blanks(bytes);
    if text.is_empty() {
        return Err(SdtsError::InvalidFormat(format!(
            "{} field is blank: {:?}",
            what,
            String::from_utf8_lossy(bytes)
        )));
    }
    parse_digits(text, bytes, what)
}

/// Same as [`ascii_usize`], but an all-blank field parses as zero.
///
/// Used for fields the standard allows to be absent, like the field control
/// length of a data record leader.
pub(crate) fn ascii_usize_or_blank(bytes: &[u8], what: &str) -> Result<usize> {
    let text = trim_blanks(bytes);
    if text.is_empty() {
        return Ok(0);
    }
    parse_digits(text, bytes, what)
}

fn trim_blanks(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != b' ').unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| *b != b' ').map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn parse_digits(text: &[u8], raw: &[u8], what: &str) -> Result<usize> {
    if !text.iter().all(|b| b.is_ascii_digit()) {
        return Err(SdtsError::InvalidFormat(format!(
            "{} field is not numeric: {:?}",
            what,
            String::from_utf8_lossy(raw)
        )));
    }
    let mut value = 0usize;
    for b in text {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as usize))
            .ok_or_else(|| {
                SdtsError::InvalidFormat(format!("{} field overflows: {:?}", what, String::from_utf8_lossy(raw)))
            })?;
    }
    Ok(value)
}

/// Find the first unit or field terminator in `buf[from..end]`.
///
/// Returns the absolute index of the terminator byte.
pub(crate) fn find_terminator(buf: &[u8], from: usize, end: usize) -> Option<usize> {
    buf[from..end]
        .iter()
        .position(|b| *b == UNIT_TERMINATOR || *b == FIELD_TERMINATOR)
        .map(|i| from + i)
}

/// Decode a byte range as a string, replacing any non-UTF-8 content.
///
/// SDTS metadata is plain ASCII in practice, so the lossy path never fires
/// on conforming files.
pub(crate) fn ascii_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
