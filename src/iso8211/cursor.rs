//! Resumable subfield cursor over the current record's field area.
//!
//! The cursor carries the only state that survives between retrieval calls:
//! which directory entry, which label/format index, and how far into the
//! field's bytes the previous call stopped. It never touches the byte
//! source; the session feeds it the current record buffer and resets it
//! whenever a new physical record arrives.
//!
//! Array-structure fields are handled in the single-delimiter cartesian
//! form USGS files actually use (`*LABEL` or `*LABEL1!LABEL2`, one
//! repeating row of one or two subfields). A richer two-sided cartesian
//! array decodes best-effort under the same rules and may mis-assign
//! labels; no sample data exists to pin down a fuller semantics.

use std::ops::Range;

use log::trace;

use super::error::{Result, SdtsError};
use super::models::{DirEntry, FieldDescriptor, FieldStructure, FIELD_TERMINATOR};
use super::utils::find_terminator;

/// Cursor position: `(field index, subfield index, byte offset)`.
///
/// The byte offset is relative to the current field's start.
#[derive(Debug, Default)]
pub(crate) struct SubfieldCursor {
    field_idx: usize,
    subfield_idx: usize,
    offset: usize,
}

/// One subfield carved out of the record buffer, as indices and a byte
/// range. The session materializes this into a borrowed [`Subfield`]
/// after the mutable advance is done.
///
/// [`Subfield`]: super::models::Subfield
#[derive(Debug)]
pub(crate) struct SubfieldSpan {
    pub dir_idx: usize,
    pub desc_idx: usize,
    /// Label/format index; `None` for a whole-field elementary value.
    pub subfield_idx: Option<usize>,
    pub range: Range<usize>,
}

impl SubfieldCursor {
    /// Rewind to the first field of a fresh record.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Carve the next subfield out of the current record.
    ///
    /// `base` is the offset of the field area within `buf` (zero for
    /// leaderless continuation blocks, which carry no leader or directory).
    /// Returns `Ok(None)` once every directory entry is exhausted.
    pub fn advance(
        &mut self,
        base: usize,
        directory: &[DirEntry],
        descriptors: &[FieldDescriptor],
        buf: &[u8],
    ) -> Result<Option<SubfieldSpan>> {
        loop {
            let Some(entry) = directory.get(self.field_idx) else {
                return Ok(None);
            };
            if entry.len == 0 {
                self.next_field();
                continue;
            }

            let desc_idx = descriptors
                .iter()
                .position(|d| d.tag == entry.tag)
                .ok_or_else(|| SdtsError::UnknownTag(entry.tag.clone()))?;
            let desc = &descriptors[desc_idx];

            let field_start = base + entry.pos;
            let field_end = field_start + entry.len;
            if field_end > buf.len() {
                return Err(SdtsError::InvalidFormat(format!(
                    "field {} overruns the record buffer",
                    entry.tag
                )));
            }
            if field_start + self.offset >= field_end {
                self.next_field();
                continue;
            }

            // A field without labels and formats, or declared elementary, is
            // one opaque value per instance: the field bytes minus the
            // trailing terminator.
            if desc.structure == FieldStructure::Elementary || desc.subfield_count() == 0 {
                let span = SubfieldSpan {
                    dir_idx: self.field_idx,
                    desc_idx,
                    subfield_idx: None,
                    range: field_start..field_end - 1,
                };
                self.next_field();
                return Ok(Some(span));
            }

            return self
                .advance_in_field(desc_idx, desc, field_start, field_end, buf)
                .map(Some);
        }
    }

    /// Carve one vector/array subfield and update the cursor.
    fn advance_in_field(
        &mut self,
        desc_idx: usize,
        desc: &FieldDescriptor,
        field_start: usize,
        field_end: usize,
        buf: &[u8],
    ) -> Result<SubfieldSpan> {
        let start = field_start + self.offset;
        let fmt = desc.formats.get(self.subfield_idx);
        let explicit = fmt.map(|f| f.size).unwrap_or(0);

        let (range, consumed) = if explicit > 0 {
            // Explicit sizes step over raw bytes; binary payloads may
            // legally contain terminator bytes, so no scanning here.
            if start + explicit > field_end {
                return Err(SdtsError::InvalidFormat(format!(
                    "subfield {}/{} of {} bytes overruns its field",
                    desc.tag, self.subfield_idx, explicit
                )));
            }
            // Sized values carry no delimiter of their own, so a field
            // terminator left as the sole remaining byte is field layout,
            // not an empty value: step over it. Scanned values own their
            // delimiters, and a terminator found there delimits a value,
            // possibly an empty one.
            let consumed = if field_end - (start + explicit) == 1
                && buf[field_end - 1] == FIELD_TERMINATOR
            {
                explicit + 1
            } else {
                explicit
            };
            (start..start + explicit, consumed)
        } else {
            match find_terminator(buf, start, field_end) {
                Some(term) => (start..term, term - start + 1),
                None => (start..field_end, field_end - start),
            }
        };

        let span = SubfieldSpan {
            dir_idx: self.field_idx,
            desc_idx,
            subfield_idx: Some(self.subfield_idx),
            range,
        };

        self.offset += consumed;
        self.subfield_idx += 1;

        let at_end = field_start + self.offset >= field_end;
        let exhausted = self.subfield_idx >= desc.subfield_count();
        match desc.structure {
            // A vector yields one pass over its labels, then moves on, even
            // if trailing bytes remain.
            FieldStructure::Vector => {
                if at_end || exhausted {
                    self.next_field();
                }
            }
            // An array repeats its (cartesian) labels until the field ends.
            FieldStructure::Array => {
                if at_end {
                    self.next_field();
                } else if exhausted {
                    self.subfield_idx = desc.cycle_start();
                }
            }
            FieldStructure::Elementary => unreachable!("elementary handled by caller"),
        }

        trace!(
            "Subfield {}/{:?}: {} bytes",
            desc.tag,
            span.subfield_idx,
            span.range.len()
        );
        Ok(span)
    }

    fn next_field(&mut self) {
        self.field_idx += 1;
        self.subfield_idx = 0;
        self.offset = 0;
    }
}
