//! Subfield format mini-language parser.
//!
//! The DDR describes each vector/array field's subfields with a compact
//! format string such as `(A,I,B(16),3I)` or `(A(3),2(I,R))`. This module
//! compiles one of those strings into a flat, repeat-expanded list of
//! [`FormatSpec`]s that the cursor consumes at decode time.
//!
//! Grammar actually supported (the USGS SDTS profile):
//! - comma-separated items inside one pair of parentheses, with one
//!   redundant nested pair stripped if present;
//! - an item is a format letter with an optional parenthesized size, or a
//!   parenthesized group;
//! - a leading integer repeats the following letter or group;
//! - groups nest at most two deep.
//!
//! A parenthesized size is a byte count, except for binary (`B`) specs
//! where it is a bit count that must divide evenly by 8. A size that does
//! not parse as a plain integer (delimited-string idioms like `A(,)`) is
//! tolerated and treated as "discover via terminator at decode time".

use log::trace;

use super::error::{Result, SdtsError};
use super::models::FormatSpec;

/// Deepest group nesting accepted. Anything richer than the depth the USGS
/// profile uses is rejected rather than half-parsed.
const MAX_GROUP_DEPTH: usize = 2;

/// Compile a full format string (outer parentheses included) into an
/// ordered, repeat-expanded spec list.
pub fn parse(format: &str) -> Result<Vec<FormatSpec>> {
    let inner = strip_outer_parens(format.trim())?;
    let inner = strip_redundant_pair(inner);

    let mut cursor = Cursor {
        bytes: inner.as_bytes(),
        pos: 0,
    };
    let mut specs = Vec::new();
    parse_items(&mut cursor, 1, &mut specs)?;
    if cursor.pos != cursor.bytes.len() {
        return Err(SdtsError::FormatSyntax(format!(
            "trailing content at offset {} in {:?}",
            cursor.pos, inner
        )));
    }
    trace!("Format {:?} compiled to {} specs", format, specs.len());
    Ok(specs)
}

fn strip_outer_parens(format: &str) -> Result<&str> {
    let stripped = format
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'));
    stripped.ok_or_else(|| {
        SdtsError::FormatSyntax(format!("format string {:?} is not parenthesized", format))
    })
}

/// Some writers emit `((...))`; one redundant pair is stripped when the
/// opening parenthesis matches the final closing one.
fn strip_redundant_pair(inner: &str) -> &str {
    let bytes = inner.as_bytes();
    if bytes.first() != Some(&b'(') || bytes.last() != Some(&b')') {
        return inner;
    }
    let mut depth = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return if i == bytes.len() - 1 {
                        &inner[1..inner.len() - 1]
                    } else {
                        inner
                    };
                }
            }
            _ => {}
        }
    }
    inner
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consume a run of decimal digits, if any.
    fn take_int(&mut self) -> Option<usize> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
    }
}

/// Parse a comma-separated item list until the cursor hits a closing
/// parenthesis (group end) or the end of input.
fn parse_items(cursor: &mut Cursor<'_>, depth: usize, out: &mut Vec<FormatSpec>) -> Result<()> {
    loop {
        parse_item(cursor, depth, out)?;
        match cursor.peek() {
            Some(b',') => {
                cursor.bump();
            }
            Some(b')') | None => return Ok(()),
            Some(other) => {
                return Err(SdtsError::FormatSyntax(format!(
                    "unexpected {:?} at offset {}",
                    other as char, cursor.pos
                )))
            }
        }
    }
}

fn parse_item(cursor: &mut Cursor<'_>, depth: usize, out: &mut Vec<FormatSpec>) -> Result<()> {
    let repeat = cursor.take_int().unwrap_or(1);
    if repeat == 0 {
        return Err(SdtsError::FormatSyntax(format!(
            "repeat count of zero at offset {}",
            cursor.pos
        )));
    }

    match cursor.peek() {
        Some(b'(') => {
            // Repeated group: parse once, then splice repeat copies.
            if depth >= MAX_GROUP_DEPTH {
                return Err(SdtsError::FormatSyntax(format!(
                    "group nesting deeper than {} at offset {}",
                    MAX_GROUP_DEPTH, cursor.pos
                )));
            }
            cursor.bump();
            let mut group = Vec::new();
            parse_items(cursor, depth + 1, &mut group)?;
            if cursor.bump() != Some(b')') {
                return Err(SdtsError::FormatSyntax("unclosed group".to_string()));
            }
            for _ in 0..repeat {
                out.extend_from_slice(&group);
            }
            Ok(())
        }
        Some(letter) if letter.is_ascii_alphabetic() => {
            cursor.bump();
            let spec = parse_size(cursor, letter.to_ascii_uppercase() as char)?;
            for _ in 0..repeat {
                out.push(spec);
            }
            Ok(())
        }
        other => Err(SdtsError::FormatSyntax(format!(
            "expected format letter or group, found {:?} at offset {}",
            other.map(|b| b as char),
            cursor.pos
        ))),
    }
}

/// Parse the optional parenthesized size following a format letter.
fn parse_size(cursor: &mut Cursor<'_>, letter: char) -> Result<FormatSpec> {
    if cursor.peek() != Some(b'(') {
        return Ok(FormatSpec { letter, size: 0 });
    }
    cursor.bump();
    let start = cursor.pos;
    while !matches!(cursor.peek(), Some(b')') | None) {
        cursor.pos += 1;
    }
    if cursor.bump() != Some(b')') {
        return Err(SdtsError::FormatSyntax(format!(
            "unclosed size after {:?}",
            letter
        )));
    }
    let size_text = std::str::from_utf8(&cursor.bytes[start..cursor.pos - 1])
        .map_err(|_| SdtsError::FormatSyntax(format!("non-ASCII size after {:?}", letter)))?;

    let size = match size_text.trim().parse::<u32>() {
        Ok(bits) if letter == 'B' => {
            // Binary sizes are bit counts; only whole bytes are decodable.
            if bits % 8 != 0 {
                return Err(SdtsError::BitWidthNotByteAligned(bits));
            }
            (bits / 8) as usize
        }
        Ok(bytes) => bytes as usize,
        // Delimited-string idioms (e.g. `A(,)`) carry a non-numeric "size";
        // the value is discovered via terminator at decode time instead.
        Err(_) => 0,
    };
    Ok(FormatSpec { letter, size })
}
