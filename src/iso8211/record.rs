//! Physical record reading, including the long-record escape.
//!
//! A record longer than 99999 bytes cannot state its length in the 5-digit
//! leader field, so it leaves the field blank. For those records the reader
//! buffers the leader, scans forward to the directory's field terminator,
//! and recomputes the true length from the last directory entry before
//! reading the remainder.

use log::{debug, trace};

use super::error::{Result, SdtsError};
use super::leader;
use super::models::{DirEntry, EntryMap, Leader, FIELD_TERMINATOR, LEADER_LEN};
use super::source::ByteSource;
use super::utils::{ascii_string, ascii_usize};

/// Upper bound on the byte-by-byte directory scan of a long record. A
/// directory that has not terminated by then is corrupt.
const LONG_RECORD_SCAN_LIMIT: usize = 64 * 1024;

/// One physical record: its parsed leader and the complete record bytes
/// (leader, directory, and field area).
#[derive(Debug)]
pub(crate) struct RawRecord {
    pub leader: Leader,
    pub buf: Vec<u8>,
}

/// Read one complete physical record.
///
/// Returns `Ok(None)` on a clean end of file before the length prefix.
pub(crate) fn read_record(source: &mut ByteSource) -> Result<Option<RawRecord>> {
    let mut prefix = [0u8; 5];
    if !source.read_exact_or_eof(&mut prefix)? {
        return Ok(None);
    }

    let declared_len = leader::parse_length_prefix(&prefix)?;
    let record = if declared_len > 0 {
        read_sized_record(source, &prefix, declared_len)?
    } else {
        read_long_record(source, &prefix)?
    };

    debug!(
        "Record read: kind={:?}, {} bytes, base address {}",
        record.leader.kind,
        record.buf.len(),
        record.leader.base_addr
    );
    Ok(Some(record))
}

/// Normal path: the leader states the record length.
fn read_sized_record(source: &mut ByteSource, prefix: &[u8; 5], len: usize) -> Result<RawRecord> {
    if len < LEADER_LEN {
        return Err(SdtsError::InvalidLeader(format!(
            "declared record length {} is shorter than the leader",
            len
        )));
    }
    let mut buf = vec![0u8; len];
    buf[..5].copy_from_slice(prefix);
    source.read_exact(&mut buf[5..])?;

    let leader = leader::parse(&buf[..LEADER_LEN])?;
    if leader.base_addr > len {
        return Err(SdtsError::InvalidLeader(format!(
            "base address {} exceeds record length {}",
            leader.base_addr, len
        )));
    }
    Ok(RawRecord { leader, buf })
}

/// Long-record path: recover the true length from the last directory entry.
fn read_long_record(source: &mut ByteSource, prefix: &[u8; 5]) -> Result<RawRecord> {
    let mut buf = Vec::with_capacity(LEADER_LEN + 256);
    buf.extend_from_slice(prefix);
    buf.resize(LEADER_LEN, 0);
    source.read_exact(&mut buf[5..])?;

    let mut leader = leader::parse(&buf[..LEADER_LEN])?;

    // Scan forward one byte at a time until the directory terminates.
    loop {
        match source.read_byte()? {
            Some(byte) => {
                buf.push(byte);
                if byte == FIELD_TERMINATOR {
                    break;
                }
                if buf.len() - LEADER_LEN > LONG_RECORD_SCAN_LIMIT {
                    return Err(SdtsError::UnterminatedDirectory {
                        scanned: buf.len() - LEADER_LEN,
                    });
                }
            }
            None => {
                return Err(SdtsError::TruncatedRecord {
                    expected: buf.len() + 1,
                    found: buf.len(),
                })
            }
        }
    }

    let entry_len = leader.entry_map.entry_len();
    let dir_len = buf.len() - LEADER_LEN - 1;
    if dir_len == 0 || dir_len % entry_len != 0 {
        return Err(SdtsError::InvalidFormat(format!(
            "long record directory of {} bytes is not a multiple of the {}-byte entry size",
            dir_len, entry_len
        )));
    }

    // True length = base address + last entry's position + last entry's
    // length (which includes that field's terminator).
    let last = parse_entry(
        &leader.entry_map,
        &buf[LEADER_LEN + dir_len - entry_len..LEADER_LEN + dir_len],
    )?;
    let true_len = leader
        .base_addr
        .checked_add(last.pos)
        .and_then(|v| v.checked_add(last.len))
        .ok_or_else(|| SdtsError::InvalidFormat("long record length overflows".to_string()))?;
    trace!(
        "Long record: last entry tag {} pos {} len {} -> true length {}",
        last.tag,
        last.pos,
        last.len,
        true_len
    );
    if leader.base_addr != buf.len() {
        return Err(SdtsError::InvalidFormat(format!(
            "long record directory ends at {} but base address is {}",
            buf.len(),
            leader.base_addr
        )));
    }
    if true_len < buf.len() {
        return Err(SdtsError::InvalidFormat(format!(
            "long record length {} is shorter than its own directory",
            true_len
        )));
    }

    let already = buf.len();
    buf.resize(true_len, 0);
    source.read_exact(&mut buf[already..])?;
    leader.record_len = true_len;

    Ok(RawRecord { leader, buf })
}

/// Parse the record's directory into entries, validating each field's byte
/// range against the record bounds.
pub(crate) fn parse_directory(leader: &Leader, buf: &[u8]) -> Result<Vec<DirEntry>> {
    let dir_end = leader.base_addr - 1;
    if dir_end > buf.len() || buf.get(dir_end).copied() != Some(FIELD_TERMINATOR) {
        return Err(SdtsError::InvalidFormat(
            "directory is not terminated at the base address".to_string(),
        ));
    }

    let region = &buf[LEADER_LEN..dir_end];
    let entry_len = leader.entry_map.entry_len();
    if region.len() % entry_len != 0 {
        return Err(SdtsError::InvalidFormat(format!(
            "directory of {} bytes is not a multiple of the {}-byte entry size",
            region.len(),
            entry_len
        )));
    }

    let mut entries = Vec::with_capacity(region.len() / entry_len);
    for chunk in region.chunks_exact(entry_len) {
        let entry = parse_entry(&leader.entry_map, chunk)?;
        let end = leader
            .base_addr
            .checked_add(entry.pos)
            .and_then(|v| v.checked_add(entry.len));
        if !matches!(end, Some(end) if end <= buf.len()) {
            return Err(SdtsError::InvalidFormat(format!(
                "field {} at {}+{} overruns the record",
                entry.tag, entry.pos, entry.len
            )));
        }
        entries.push(entry);
    }
    trace!("Directory: {} entries", entries.len());
    Ok(entries)
}

fn parse_entry(map: &EntryMap, bytes: &[u8]) -> Result<DirEntry> {
    let tag = ascii_string(&bytes[..map.tag_width]);
    let len = ascii_usize(&bytes[map.tag_width..map.tag_width + map.len_width], "field length")?;
    let pos = ascii_usize(&bytes[map.tag_width + map.len_width..], "field position")?;
    Ok(DirEntry { tag, len, pos })
}
