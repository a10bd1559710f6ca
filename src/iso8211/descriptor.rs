//! Descriptor record compilation.
//!
//! Runs exactly once per session, on the record whose leader kind is `L`.
//! Walks the DDR's directory and builds one [`FieldDescriptor`] per tag:
//! structure type, data type code, field name, subfield labels, and parsed
//! format specs. That compiled schema then drives the decoding of every
//! data record in the file.

use log::{debug, info};

use super::error::{Result, SdtsError};
use super::format;
use super::models::{
    reserved_selector, DirEntry, FieldDescriptor, FieldStructure, Leader, SubfieldLabel,
    UNIT_TERMINATOR,
};
use super::utils::{ascii_string, find_terminator};

/// Compile the DDR into the session schema.
///
/// Returns the descriptors plus the file title extracted from the reserved
/// file-control field (empty if the DDR carries none).
pub(crate) fn compile(
    leader: &Leader,
    buf: &[u8],
    directory: &[DirEntry],
) -> Result<(Vec<FieldDescriptor>, String)> {
    let mut descriptors = Vec::with_capacity(directory.len());
    let mut file_title = String::new();

    for entry in directory {
        let start = leader.base_addr + entry.pos;
        let end = start + entry.len;
        let field = &buf[start..end];

        match reserved_selector(&entry.tag) {
            Some(0) => {
                // File control field: only the title is of interest.
                file_title = extract_name(leader, field);
                debug!("File control field: title {:?}", file_title);
                continue;
            }
            Some(1) | None => {
                // The record identifier field is described and decoded like
                // any ordinary field.
                descriptors.push(compile_field(leader, &entry.tag, field)?);
            }
            Some(_) => return Err(SdtsError::ReservedTag(entry.tag.clone())),
        }
    }

    info!(
        "Descriptor record compiled: {} field tags, title {:?}",
        descriptors.len(),
        file_title
    );
    Ok((descriptors, file_title))
}

/// Build the descriptor for one ordinary field.
fn compile_field(leader: &Leader, tag: &str, field: &[u8]) -> Result<FieldDescriptor> {
    // The field control area exists only at interchange level 2/3; without
    // it the field is a single opaque value per instance.
    let (structure, data_type, name_start) =
        if leader.level.has_field_control() && leader.field_control_len >= 2 {
            let control = field.get(..leader.field_control_len).ok_or_else(|| {
                SdtsError::InvalidFormat(format!("field {} is shorter than its control area", tag))
            })?;
            (
                FieldStructure::try_from(control[0])?,
                control[1],
                leader.field_control_len,
            )
        } else {
            (FieldStructure::Elementary, 0, 0)
        };

    let name_end = find_terminator(field, name_start, field.len()).ok_or_else(|| {
        SdtsError::InvalidFormat(format!("unterminated name in descriptor field {}", tag))
    })?;
    let name = ascii_string(&field[name_start..name_end]);

    let mut labels = Vec::new();
    let mut formats = Vec::new();
    if structure != FieldStructure::Elementary && field[name_end] == UNIT_TERMINATOR {
        let labels_end = find_terminator(field, name_end + 1, field.len()).ok_or_else(|| {
            SdtsError::InvalidFormat(format!("unterminated labels in descriptor field {}", tag))
        })?;
        labels = parse_labels(&field[name_end + 1..labels_end]);

        if field[labels_end] == UNIT_TERMINATOR {
            let fmt_end = find_terminator(field, labels_end + 1, field.len())
                .unwrap_or(field.len());
            let fmt_text = ascii_string(&field[labels_end + 1..fmt_end]);
            if !fmt_text.is_empty() {
                formats = format::parse(&fmt_text)?;
            }
        }
    }

    if !labels.is_empty() && !formats.is_empty() && labels.len() != formats.len() {
        return Err(SdtsError::LabelFormatMismatch {
            labels: labels.len(),
            formats: formats.len(),
        });
    }

    debug!(
        "Field {}: {:?} {:?}, {} labels, {} formats",
        tag,
        structure,
        name,
        labels.len(),
        formats.len()
    );
    Ok(FieldDescriptor {
        tag: tag.to_string(),
        structure,
        data_type,
        name,
        labels,
        formats,
    })
}

/// Extract the name string of the reserved file-control field.
fn extract_name(leader: &Leader, field: &[u8]) -> String {
    let start = if leader.level.has_field_control() {
        leader.field_control_len.min(field.len())
    } else {
        0
    };
    let end = find_terminator(field, start, field.len()).unwrap_or(field.len());
    ascii_string(&field[start..end])
}

/// Split the label list on `!`, with a `*` switching every following label
/// into the cartesian column position.
fn parse_labels(text: &[u8]) -> Vec<SubfieldLabel> {
    let text = ascii_string(text);
    if text.is_empty() {
        return Vec::new();
    }

    let mut labels = Vec::new();
    let (rows, cols) = match text.split_once('*') {
        Some((rows, cols)) => (rows, Some(cols)),
        None => (text.as_str(), None),
    };
    if !rows.is_empty() {
        labels.extend(rows.split('!').map(|l| SubfieldLabel {
            text: l.to_string(),
            cartesian: false,
        }));
    }
    if let Some(cols) = cols {
        labels.extend(cols.split('!').map(|l| SubfieldLabel {
            text: l.to_string(),
            cartesian: true,
        }));
    }
    labels
}
