//! 24-byte record leader parsing.
//!
//! Leader layout (byte offsets):
//! - 0..5:   record length, 5 ASCII digits (all blank or all zero marks the
//!           long-record escape)
//! - 5:      interchange level (digit 1-3 or blank)
//! - 6:      leader identifier (`L` descriptor / `D` data / `R` terminal)
//! - 7..10:  inline code extension, version, application indicator (ignored)
//! - 10..12: field control area length (digit pair or blank)
//! - 12..17: field area base address, 5 ASCII digits, at least 24
//! - 17..20: extended character set indicator (stored, not validated)
//! - 20:     size of field-length directory field (1-9)
//! - 21:     size of field-position directory field (1-9)
//! - 22:     reserved (ignored)
//! - 23:     size of tag directory field (1-7)

use log::trace;

use super::error::{Result, SdtsError};
use super::models::{EntryMap, InterchangeLevel, Leader, LeaderKind, LEADER_LEN};
use super::utils::{ascii_usize, ascii_usize_or_blank};

/// Parse the 5-byte record length prefix.
///
/// Returns zero for the long-record escape (all blanks or all zeros); any
/// other non-numeric content is fatal. The record reader branches on this
/// before the remaining 19 leader bytes are consumed.
pub(crate) fn parse_length_prefix(prefix: &[u8; 5]) -> Result<usize> {
    if prefix.iter().all(|b| *b == b' ') || prefix.iter().all(|b| *b == b'0') {
        return Ok(0);
    }
    ascii_usize(prefix, "record length")
        .map_err(|_| SdtsError::InvalidLeader(format!(
            "record length field is not numeric: {:?}",
            String::from_utf8_lossy(prefix)
        )))
}

/// Parse a complete 24-byte leader.
///
/// `bytes` must be exactly [`LEADER_LEN`] long. The record length comes out
/// as zero for long records; the reader recomputes it from the directory.
pub(crate) fn parse(bytes: &[u8]) -> Result<Leader> {
    debug_assert_eq!(bytes.len(), LEADER_LEN);

    let mut prefix = [0u8; 5];
    prefix.copy_from_slice(&bytes[0..5]);
    let record_len = parse_length_prefix(&prefix)?;

    let level = InterchangeLevel::try_from(bytes[5])?;
    let kind = LeaderKind::try_from(bytes[6])?;
    // Bytes 7..10 (inline code extension, version, application indicator)
    // are read and ignored, as the standard allows them to be blank.
    let field_control_len = ascii_usize_or_blank(&bytes[10..12], "field control length")
        .map_err(bad_leader)?;
    let base_addr = ascii_usize(&bytes[12..17], "base address").map_err(bad_leader)?;
    if base_addr < LEADER_LEN {
        return Err(SdtsError::InvalidLeader(format!(
            "base address {} is inside the leader",
            base_addr
        )));
    }

    let mut charset = [0u8; 3];
    charset.copy_from_slice(&bytes[17..20]);

    let entry_map = EntryMap {
        len_width: width_digit(bytes[20], 9, "field length width")?,
        pos_width: width_digit(bytes[21], 9, "field position width")?,
        tag_width: width_digit(bytes[23], 7, "tag width")?,
    };

    trace!(
        "Leader: len={}, kind={:?}, level={:?}, base={}, entry map {}/{}/{}",
        record_len,
        kind,
        level,
        base_addr,
        entry_map.tag_width,
        entry_map.len_width,
        entry_map.pos_width
    );

    Ok(Leader {
        record_len,
        level,
        kind,
        field_control_len,
        base_addr,
        charset,
        entry_map,
    })
}

/// Validate a single-digit entry map width against its documented range.
fn width_digit(byte: u8, max: usize, what: &str) -> Result<usize> {
    if !byte.is_ascii_digit() {
        return Err(SdtsError::InvalidLeader(format!(
            "{} byte {:?} is not a digit",
            what, byte as char
        )));
    }
    let width = (byte - b'0') as usize;
    if width == 0 || width > max {
        return Err(SdtsError::InvalidLeader(format!(
            "{} {} is outside 1-{}",
            what, width, max
        )));
    }
    Ok(width)
}

fn bad_leader(err: SdtsError) -> SdtsError {
    SdtsError::InvalidLeader(err.to_string())
}
