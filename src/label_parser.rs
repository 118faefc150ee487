use log::{debug, warn};
use std::io::{self, Read, Seek, SeekFrom};
use thiserror::Error;

use crate::{
    charset,
    geometry::{Geometry, GeometryAddress, Position},
    label::{Date, ErrorMapDescriptor, VolumeDescriptor, VolumeHeaderRecord},
};

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Image truncated: wanted {wanted} bytes at offset {position}")]
    TruncatedImage { position: u64, wanted: usize },
    #[error("Label {identifier:?} not found at offset {position}")]
    LabelNotFound { identifier: String, position: u64 },
    #[error("File header for {name:?} not found after {attempts} attempts")]
    FileHeaderNotFound { name: String, attempts: u32 },
    #[error("Malformed {field}: {raw:?}")]
    MalformedField { field: String, raw: String },
    #[error("Unrecognized {field} code {code:?}")]
    UnrecognizedFieldCode { field: &'static str, code: char },
    #[error("Malformed directory entry {index}: {reason}")]
    MalformedDirectoryEntry { index: usize, reason: String },
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid extent: start={start} end={end} last sector bytes={last_sector_bytes}")]
    InvalidExtent {
        start: u32,
        end: u32,
        last_sector_bytes: u32,
    },
    #[error("Extent truncated: wrote {written} of {expected} bytes")]
    TruncatedExtent { expected: u64, written: u64 },
}

pub type Result<T> = std::result::Result<T, LabelError>;

/// A problem that was tolerated while reading the image.
#[derive(Debug)]
pub struct Diagnostic {
    /// Image offset of the record being parsed.
    pub position: u64,
    pub error: LabelError,
}

/// A value parsed permissively, with the reason it was defaulted if it was.
#[derive(Debug, Clone, PartialEq)]
pub struct Lenient<T> {
    pub value: T,
    pub diagnostic: Option<String>,
}

/// Parses a field that should be all decimal digits. Blank is 0, anything
/// else that is not a run of digits is 0 with a diagnostic.
pub fn parse_decimal(text: &str) -> Lenient<u32> {
    if text.is_empty() {
        return Lenient {
            value: 0,
            diagnostic: None,
        };
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Lenient {
            value: 0,
            diagnostic: Some(format!("not a decimal number: {:?}", text)),
        };
    }
    match text.parse() {
        Ok(value) => Lenient {
            value,
            diagnostic: None,
        },
        Err(e) => Lenient {
            value: 0,
            diagnostic: Some(format!("{:?}: {}", text, e)),
        },
    }
}

/// Single-character label fields with a fixed set of known codes.
pub trait FieldCode: From<char> {
    const FIELD: &'static str;
    fn is_recognized(&self) -> bool;
}

/// Index cylinder sector holding the error map label.
pub const ERROR_MAP_SECTOR: u32 = 5;
/// Index cylinder sector holding the volume label.
pub const VOLUME_LABEL_SECTOR: u32 = 7;
/// Index cylinder sectors probed for volume-level HDR1 labels.
pub const VOLUME_HEADER_SECTORS: std::ops::RangeInclusive<u32> = 8..=26;
/// Size of the records on the index cylinder.
pub const INDEX_RECORD_SIZE: usize = 128;

/// Owned read cursor over a disk image. Every label, directory and file
/// read goes through one of these, and always seeks before reading.
pub struct RecordCursor<R: Read + Seek> {
    pub reader: R,
    geometry: Geometry,
    position: u64,
    record: Vec<u8>,
    record_position: u64,
    diagnostics: Vec<Diagnostic>,
}

impl<R: Read + Seek> RecordCursor<R> {
    pub fn new(reader: R) -> Self {
        Self::new_with_geometry(reader, Geometry::default())
    }

    pub fn new_with_geometry(reader: R, geometry: Geometry) -> Self {
        Self {
            reader,
            geometry,
            position: 0,
            record: Vec::new(),
            record_position: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
    }

    pub fn seek(&mut self, position: impl Into<Position>) -> Result<u64> {
        let offset = self.geometry.offset(position.into());
        self.reader.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(offset)
    }

    /// Reads `size` bytes at the cursor into the active record and advances.
    pub fn read_record(&mut self, size: usize) -> Result<&[u8]> {
        debug!("read_record: position={} size={}", self.position, size);
        self.record.resize(size, 0);
        self.reader.seek(SeekFrom::Start(self.position))?;
        if let Err(e) = self.reader.read_exact(&mut self.record) {
            self.record.clear();
            return Err(if e.kind() == io::ErrorKind::UnexpectedEof {
                LabelError::TruncatedImage {
                    position: self.position,
                    wanted: size,
                }
            } else {
                e.into()
            });
        }
        self.record_position = self.position;
        self.position += size as u64;
        Ok(&self.record)
    }

    /// Raw bytes of a field; `start` is 1-based. Clamped to the record.
    pub fn raw_field(&self, start: usize, length: usize) -> &[u8] {
        let begin = start.saturating_sub(1).min(self.record.len());
        let end = (begin + length).min(self.record.len());
        &self.record[begin..end]
    }

    pub fn extract_string(&self, start: usize, length: usize) -> String {
        charset::decode(self.raw_field(start, length))
            .trim()
            .to_string()
    }

    /// A single code character, untrimmed since blank is a meaningful code.
    pub fn extract_char(&self, column: usize) -> char {
        self.raw_field(column, 1)
            .first()
            .map(|&b| charset::decode_byte(b))
            .unwrap_or(' ')
    }

    pub fn extract_integer(&mut self, start: usize, length: usize) -> u32 {
        let text = self.extract_string(start, length);
        let parsed = parse_decimal(&text);
        if let Some(reason) = parsed.diagnostic {
            self.note(LabelError::MalformedField {
                field: format!("number at column {}", start),
                raw: reason,
            });
        }
        parsed.value
    }

    /// Six digits YYMMDD. A zero day means there is no date.
    pub fn extract_date(&mut self, start: usize) -> Date {
        Date {
            year: self.extract_integer(start, 2) as u8,
            month: self.extract_integer(start + 2, 2) as u8,
            day: self.extract_integer(start + 4, 2) as u8,
        }
    }

    pub fn extract_code<T: FieldCode>(&mut self, column: usize) -> T {
        let code = self.extract_char(column);
        let value = T::from(code);
        if !value.is_recognized() {
            self.note(LabelError::UnrecognizedFieldCode {
                field: T::FIELD,
                code,
            });
        }
        value
    }

    /// Reads one record and compares its leading identifier. Returns the
    /// character following the identifier when it matches.
    pub fn find_label(
        &mut self,
        identifier: &str,
        target: Option<Position>,
        record_size: usize,
    ) -> Result<Option<char>> {
        if let Some(target) = target {
            self.seek(target)?;
        }
        self.read_record(record_size)?;
        let found = charset::decode(self.raw_field(1, identifier.len()));
        let sequence = self.extract_char(identifier.len() + 1);
        debug!(
            "find_label({:?}) at {}: found {:?} sequence {:?}",
            identifier, self.record_position, found, sequence
        );
        Ok((found == identifier).then_some(sequence))
    }

    /// Like [`Self::find_label`] but the label and sequence are mandatory.
    pub fn require_label(
        &mut self,
        identifier: &str,
        sequence: char,
        target: Option<Position>,
        record_size: usize,
    ) -> Result<()> {
        match self.find_label(identifier, target, record_size)? {
            Some(found) if found == sequence => Ok(()),
            _ => Err(LabelError::LabelNotFound {
                identifier: format!("{}{}", identifier, sequence),
                position: self.record_position,
            }),
        }
    }

    /// Records a non-fatal problem against the active record.
    pub fn note(&mut self, error: LabelError) {
        warn!("offset {}: {}", self.record_position, error);
        self.diagnostics.push(Diagnostic {
            position: self.record_position,
            error,
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn read_error_map(&mut self) -> Result<ErrorMapDescriptor> {
        debug!("read_error_map");
        self.require_label(
            ErrorMapDescriptor::IDENTIFIER,
            ErrorMapDescriptor::SEQUENCE,
            Some(GeometryAddress::index_cylinder(ERROR_MAP_SECTOR).into()),
            INDEX_RECORD_SIZE,
        )?;
        Ok(ErrorMapDescriptor::read(self))
    }

    pub fn read_volume_descriptor(&mut self) -> Result<VolumeDescriptor> {
        debug!("read_volume_descriptor");
        self.require_label(
            VolumeDescriptor::IDENTIFIER,
            VolumeDescriptor::SEQUENCE,
            Some(GeometryAddress::index_cylinder(VOLUME_LABEL_SECTOR).into()),
            INDEX_RECORD_SIZE,
        )?;
        Ok(VolumeDescriptor::read(self))
    }

    /// Probes the index cylinder for volume headers. The first sector that
    /// does not hold a well-formed header ends the list.
    pub fn read_volume_headers(&mut self) -> Vec<VolumeHeaderRecord> {
        let mut headers = Vec::new();
        for sector in VOLUME_HEADER_SECTORS {
            match self.read_volume_header(sector) {
                Ok(Some(header)) => headers.push(header),
                Ok(None) => {
                    debug!("read_volume_headers: no header at sector {}", sector);
                    break;
                }
                Err(e) => {
                    debug!("read_volume_headers: stopping at sector {}: {}", sector, e);
                    break;
                }
            }
        }
        headers
    }

    fn read_volume_header(&mut self, sector: u32) -> Result<Option<VolumeHeaderRecord>> {
        let target = GeometryAddress::index_cylinder(sector).into();
        match self.find_label(
            VolumeHeaderRecord::IDENTIFIER,
            Some(target),
            INDEX_RECORD_SIZE,
        )? {
            Some(VolumeHeaderRecord::SEQUENCE) => VolumeHeaderRecord::read(self).map(Some),
            _ => Ok(None),
        }
    }
}
