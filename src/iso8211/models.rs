//! Data structures representing ISO 8211 record components

use super::error::{Result, SdtsError};

/// Field terminator control byte (0x1E). Ends every field's byte range and
/// the directory itself.
pub const FIELD_TERMINATOR: u8 = 0x1E;

/// Unit terminator control byte (0x1F). Delimits subfields whose format
/// carries no explicit size.
pub const UNIT_TERMINATOR: u8 = 0x1F;

/// Size of the fixed record leader in bytes.
pub const LEADER_LEN: usize = 24;

/// The leader identifier byte, telling what kind of record follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderKind {
    /// `L`: the Data Descriptor Record, first in the file.
    Descriptor,
    /// `D`: an ordinary Data Record.
    Data,
    /// `R`: the terminal Data Record. Its directory is reused for every
    /// remaining physical block until end of file.
    TerminalData,
}

impl TryFrom<u8> for LeaderKind {
    type Error = SdtsError;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'L' => Ok(Self::Descriptor),
            b'D' => Ok(Self::Data),
            b'R' => Ok(Self::TerminalData),
            _ => Err(SdtsError::InvalidLeader(format!(
                "unknown leader identifier {:?}",
                value as char
            ))),
        }
    }
}

/// Interchange level from leader byte 5.
///
/// Levels 2 and 3 carry a field control area per descriptor field; level 1
/// and unspecified do not, and all of their fields decode as elementary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterchangeLevel {
    Unspecified,
    Level(u8),
}

impl InterchangeLevel {
    /// Whether descriptor fields at this level carry a field control area.
    pub fn has_field_control(&self) -> bool {
        matches!(self, InterchangeLevel::Level(2) | InterchangeLevel::Level(3))
    }
}

impl TryFrom<u8> for InterchangeLevel {
    type Error = SdtsError;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            b' ' => Ok(Self::Unspecified),
            b'1'..=b'3' => Ok(Self::Level(value - b'0')),
            _ => Err(SdtsError::InvalidLeader(format!(
                "interchange level byte {:?} is not a digit 1-3 or blank",
                value as char
            ))),
        }
    }
}

/// The three directory entry widths from leader bytes 20, 21 and 23.
///
/// Every later part of the record is laid out according to these numbers.
#[derive(Debug, Clone, Copy)]
pub struct EntryMap {
    /// Width of the field-length field of each directory entry (1-9).
    pub len_width: usize,
    /// Width of the field-position field of each directory entry (1-9).
    pub pos_width: usize,
    /// Width of the tag field of each directory entry (1-7).
    pub tag_width: usize,
}

impl EntryMap {
    /// Total size in bytes of one directory entry.
    pub fn entry_len(&self) -> usize {
        self.tag_width + self.len_width + self.pos_width
    }
}

/// Parsed 24-byte record leader.
#[derive(Debug, Clone)]
pub struct Leader {
    /// Total record length in bytes. Zero means the 5-digit length field was
    /// blank: the long-record escape, resolved by the record reader.
    pub record_len: usize,
    pub level: InterchangeLevel,
    pub kind: LeaderKind,
    /// Length of the field control area of each descriptor field.
    pub field_control_len: usize,
    /// Offset of the field area from the start of the record. At least 24.
    pub base_addr: usize,
    /// Extended character set indicator, stored but not validated.
    pub charset: [u8; 3],
    pub entry_map: EntryMap,
}

/// One directory entry: which field, how long, and where in the field area.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub tag: String,
    /// Field length in bytes, including its trailing field terminator.
    pub len: usize,
    /// Field offset in bytes, relative to the field area base.
    pub pos: usize,
}

/// Classifies a tag that is all zero digits except a final selector digit.
///
/// Returns the selector for reserved tags (`0` = file control, `1` = record
/// identifier, `2+` = unsupported), or `None` for ordinary user tags.
pub fn reserved_selector(tag: &str) -> Option<u8> {
    let bytes = tag.as_bytes();
    let (last, prefix) = bytes.split_last()?;
    if prefix.iter().all(|b| *b == b'0') && last.is_ascii_digit() {
        Some(last - b'0')
    } else {
        None
    }
}

/// Field structure type from the first byte of the field control area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStructure {
    /// `0`: one opaque value per field instance.
    Elementary,
    /// `1`: a flat list of labeled subfields.
    Vector,
    /// `2`: a repeating row of subfields (single-delimiter cartesian form).
    Array,
}

impl TryFrom<u8> for FieldStructure {
    type Error = SdtsError;
    fn try_from(value: u8) -> Result<Self> {
        match value {
            b'0' => Ok(Self::Elementary),
            b'1' => Ok(Self::Vector),
            b'2' => Ok(Self::Array),
            _ => Err(SdtsError::InvalidFormat(format!(
                "unknown field structure code {:?}",
                value as char
            ))),
        }
    }
}

/// One subfield label from a descriptor field's label list.
#[derive(Debug, Clone)]
pub struct SubfieldLabel {
    pub text: String,
    /// Set for labels following the `*` cartesian row/column delimiter; the
    /// cursor cycles back to the first such label when an array field holds
    /// more rows than the label list.
    pub cartesian: bool,
}

/// One parsed format spec: the format letter and its explicit size.
///
/// A size of zero means "no explicit size": the value extends to the next
/// unit or field terminator. For binary (`B`) specs the declared bit count
/// has already been converted to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub letter: char,
    pub size: usize,
}

/// Compiled description of one field tag, built once from the DDR.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub tag: String,
    pub structure: FieldStructure,
    /// Raw data type code byte from the field control area (0 if absent).
    pub data_type: u8,
    /// Human-readable field name.
    pub name: String,
    pub labels: Vec<SubfieldLabel>,
    pub formats: Vec<FormatSpec>,
}

impl FieldDescriptor {
    /// Number of subfields one pass over the label/format lists yields.
    pub fn subfield_count(&self) -> usize {
        self.labels.len().max(self.formats.len())
    }

    /// Index the label/format cycle restarts from when an array field holds
    /// more values than one pass covers.
    pub fn cycle_start(&self) -> usize {
        self.labels
            .iter()
            .position(|l| l.cartesian)
            .unwrap_or(0)
    }
}

/// One decoded subfield, borrowed from the session.
///
/// The tag and label borrow from the compiled schema; the value bytes borrow
/// from the current record buffer. Both are valid only until the next
/// retrieval call, which the borrow on the session enforces.
#[derive(Debug, Clone, Copy)]
pub struct Subfield<'a> {
    pub(crate) tag: &'a str,
    pub(crate) label: &'a str,
    pub(crate) format: Option<FormatSpec>,
    pub(crate) data: &'a [u8],
}

impl<'a> Subfield<'a> {
    /// The field tag this subfield belongs to.
    pub fn tag(&self) -> &'a str {
        self.tag
    }

    /// The subfield label, empty for elementary fields.
    pub fn label(&self) -> &'a str {
        self.label
    }

    /// The format spec this subfield was decoded under, if the field had one.
    pub fn format(&self) -> Option<FormatSpec> {
        self.format
    }

    /// Raw value bytes, terminator excluded. Binary (`B`) payloads are
    /// returned unswabbed; byte-order interpretation is the caller's.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Value length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this subfield was declared with the binary (`B`) format.
    pub fn is_binary(&self) -> bool {
        matches!(self.format, Some(FormatSpec { letter: 'B', .. }))
    }

    /// The value as trimmed ASCII text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&'a str> {
        std::str::from_utf8(self.data)
            .ok()
            .map(|s| s.trim_matches(' '))
    }

    /// Parses an `I`-format value (blank-padded decimal integer).
    pub fn parse_int(&self) -> Option<i64> {
        let text = self.text()?;
        if text.is_empty() {
            return Some(0);
        }
        text.parse().ok()
    }

    /// Parses an `R`-format value (blank-padded decimal real).
    pub fn parse_real(&self) -> Option<f64> {
        let text = self.text()?;
        if text.is_empty() {
            return Some(0.0);
        }
        text.parse().ok()
    }

    /// Clones into an owned subfield that outlives the session borrow.
    pub fn to_owned(&self) -> OwnedSubfield {
        OwnedSubfield {
            tag: self.tag.to_string(),
            label: self.label.to_string(),
            format: self.format,
            data: self.data.to_vec(),
        }
    }
}

/// An owned clone of a [`Subfield`], yielded by the iterator adapter.
#[derive(Debug, Clone)]
pub struct OwnedSubfield {
    pub tag: String,
    pub label: String,
    pub format: Option<FormatSpec>,
    pub data: Vec<u8>,
}
