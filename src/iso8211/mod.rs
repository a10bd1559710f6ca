//! Core ISO 8211 / SDTS record decoding module

pub mod error;
pub mod format;
pub mod models;
pub mod source;
mod cursor;
mod descriptor;
mod leader;
mod record;
mod utils;

use std::path::Path;

use log::{debug, info};

use cursor::SubfieldCursor;
use models::{DirEntry, LeaderKind};

pub use error::{Result, SdtsError};
pub use models::{
    FieldDescriptor, FieldStructure, FormatSpec, OwnedSubfield, Subfield, SubfieldLabel,
};
pub use source::ByteSource;

/// A decoding session over one SDTS (ISO 8211) file.
///
/// Opening a reader performs the one-time descriptor compile pass over the
/// file's first record; every subsequent data record is then decoded one
/// subfield at a time through [`next_subfield`](Self::next_subfield).
///
/// The reader is a move-only owned value: dropping it releases every
/// buffer, and the borrow on `next_subfield` pins each returned
/// [`Subfield`] to the interval before the next retrieval call.
#[derive(Debug)]
pub struct SdtsReader {
    source: ByteSource,
    descriptors: Vec<FieldDescriptor>,
    file_title: String,

    directory: Vec<DirEntry>,
    buf: Vec<u8>,
    /// Offset of the field area within `buf`; zero for leaderless blocks.
    base: usize,
    /// Field area span of the last leadered record, reused for leaderless
    /// continuation blocks.
    field_area_len: usize,

    cursor: SubfieldCursor,
    have_record: bool,
    leaderless: bool,
    eof: bool,
}

impl SdtsReader {
    /// Open an SDTS file from the given path.
    ///
    /// Files ending in `.gz` are decompressed transparently. The descriptor
    /// record is compiled immediately.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be opened
    /// - The first record is missing or is not a descriptor record
    /// - The descriptor record is structurally malformed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening SDTS file: {}", path.display());
        Self::from_source(ByteSource::open(path)?)
    }

    /// Open a session over any sequential byte source.
    pub fn from_source(mut source: ByteSource) -> Result<Self> {
        let ddr = record::read_record(&mut source)?.ok_or_else(|| {
            SdtsError::InvalidFormat("stream is empty, no descriptor record".to_string())
        })?;
        if ddr.leader.kind != LeaderKind::Descriptor {
            return Err(SdtsError::InvalidFormat(
                "first record is not a descriptor record".to_string(),
            ));
        }

        let directory = record::parse_directory(&ddr.leader, &ddr.buf)?;
        let (descriptors, file_title) = descriptor::compile(&ddr.leader, &ddr.buf, &directory)?;

        Ok(Self {
            source,
            descriptors,
            file_title,
            directory: Vec::new(),
            buf: Vec::new(),
            base: 0,
            field_area_len: 0,
            cursor: SubfieldCursor::default(),
            have_record: false,
            leaderless: false,
            eof: false,
        })
    }

    /// Return the next subfield in file order, or `Ok(None)` at true end of
    /// file.
    ///
    /// The returned value borrows the current record buffer and the
    /// compiled schema; clone it (see [`Subfield::to_owned`]) to keep it
    /// past the next call.
    pub fn next_subfield(&mut self) -> Result<Option<Subfield<'_>>> {
        let span = loop {
            if self.eof {
                return Ok(None);
            }
            if !self.have_record {
                if !self.fetch_record()? {
                    self.eof = true;
                    info!("End of SDTS file");
                    return Ok(None);
                }
            }
            match self
                .cursor
                .advance(self.base, &self.directory, &self.descriptors, &self.buf)?
            {
                Some(span) => break span,
                None => self.have_record = false,
            }
        };

        let entry = &self.directory[span.dir_idx];
        let desc = &self.descriptors[span.desc_idx];
        let (label, fmt) = match span.subfield_idx {
            Some(i) => (
                desc.labels.get(i).map(|l| l.text.as_str()).unwrap_or(""),
                desc.formats.get(i).copied(),
            ),
            None => ("", None),
        };
        Ok(Some(Subfield {
            tag: &entry.tag,
            label,
            format: fmt,
            data: &self.buf[span.range],
        }))
    }

    /// Consume the session, releasing all buffers.
    ///
    /// Dropping the reader does the same; this exists for call-site
    /// symmetry with the open/iterate/close protocol.
    pub fn close(self) {}

    /// The compiled field descriptors, one per tag declared by the DDR.
    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// The file title from the DDR's file control field, empty if absent.
    pub fn file_title(&self) -> &str {
        &self.file_title
    }

    /// An iterator over owned subfields.
    ///
    /// A convenience for `for` loops; each subfield's bytes are cloned out
    /// of the record buffer. Use [`next_subfield`](Self::next_subfield)
    /// directly to avoid the copies.
    pub fn subfields(&mut self) -> Subfields<'_> {
        Subfields {
            reader: self,
            done: false,
        }
    }

    /// Load the next physical record, or the next leaderless continuation
    /// block once the terminal record has been seen.
    ///
    /// Returns false on a clean end of file.
    fn fetch_record(&mut self) -> Result<bool> {
        if self.leaderless {
            return self.fetch_leaderless_block();
        }

        let Some(rec) = record::read_record(&mut self.source)? else {
            return Ok(false);
        };
        match rec.leader.kind {
            LeaderKind::Descriptor => {
                return Err(SdtsError::InvalidFormat(
                    "unexpected second descriptor record".to_string(),
                ))
            }
            LeaderKind::TerminalData => {
                debug!("Terminal record: switching to leaderless continuation");
                self.leaderless = true;
            }
            LeaderKind::Data => {}
        }

        self.directory = record::parse_directory(&rec.leader, &rec.buf)?;
        self.base = rec.leader.base_addr;
        self.field_area_len = rec.leader.record_len - rec.leader.base_addr;
        self.buf = rec.buf;
        self.cursor.reset();
        self.have_record = true;
        Ok(true)
    }

    /// Re-read only the field area span, reusing the last parsed directory.
    ///
    /// Any short read here, partial or empty, is the end of the file: the
    /// continuation blocks carry no length of their own, so the stream
    /// simply stops when the data does.
    fn fetch_leaderless_block(&mut self) -> Result<bool> {
        if self.field_area_len == 0 {
            return Ok(false);
        }
        self.buf.clear();
        self.buf.resize(self.field_area_len, 0);
        let filled = self.source.read_up_to(&mut self.buf)?;
        if filled < self.field_area_len {
            debug!(
                "Short leaderless read ({} of {} bytes): end of file",
                filled, self.field_area_len
            );
            return Ok(false);
        }
        debug!("Leaderless block: {} bytes", self.field_area_len);
        self.base = 0;
        self.cursor.reset();
        self.have_record = true;
        Ok(true)
    }
}

/// Iterator over owned subfields, created by [`SdtsReader::subfields`].
///
/// Yields `Result<OwnedSubfield>`; fuses after the first error or the end
/// of the file.
#[derive(Debug)]
pub struct Subfields<'a> {
    reader: &'a mut SdtsReader,
    done: bool,
}

impl Iterator for Subfields<'_> {
    type Item = Result<OwnedSubfield>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_subfield() {
            Ok(Some(subfield)) => Some(Ok(subfield.to_owned())),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
