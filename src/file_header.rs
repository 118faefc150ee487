use log::debug;
use std::io::{Read, Seek};

use crate::{
    directory::{DirectoryEntry, DirectoryLayout},
    extent_copier::FileExtent,
    geometry::Position,
    label::Date,
    label_parser::{LabelError, RecordCursor, Result},
};

pub const HDR1_SIZE: usize = 80;
pub const HDR2_SIZE: usize = 48;
pub const TRAILER_SIZE: usize = 128;
/// Extra sectors tried before the directory's start sector when HDR1 is not
/// where the directory says.
pub const BACK_SCAN_ATTEMPTS: u32 = 4;

/// The record following HDR1/HDR2. Only the date pair carries fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Trailer {
    Dates { first: Date, second: Date },
    IndexMarker,
    Header3,
    Unrecognized(String),
    /// The image ends before the trailer.
    Missing,
}

impl Trailer {
    fn from_tag<R: Read + Seek>(cursor: &mut RecordCursor<R>) -> Self {
        let tag = cursor.extract_string(1, 4);
        match tag.as_str() {
            "DATE" => Trailer::Dates {
                first: cursor.extract_date(5),
                second: cursor.extract_date(11),
            },
            "IDX1" => Trailer::IndexMarker,
            "HDR3" => Trailer::Header3,
            _ => {
                cursor.note(LabelError::MalformedField {
                    field: "trailer tag".to_string(),
                    raw: tag.clone(),
                });
                Trailer::Unrecognized(tag)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    /// Image offset where HDR1 was found.
    pub header_offset: u64,
    // HDR1
    pub name: String,
    pub file_set: String,
    pub section: u32,
    pub sequence: u32,
    pub generation: u32,
    pub generation_version: u32,
    pub created: Date,
    pub expires: Date,
    pub accessibility: char,
    pub block_count: u32,
    pub implementation: String,
    // HDR2
    pub spare: char,
    pub physical_record_size: u32,
    pub start_sector: u32,
    pub next_header_sector: u32,
    pub end_sector: u32,
    pub last_sector_bytes: u32,
    pub trailer: Trailer,
}

impl FileHeader {
    pub fn trailer_dates(&self) -> Option<(Date, Date)> {
        match self.trailer {
            Trailer::Dates { first, second } => Some((first, second)),
            _ => None,
        }
    }

    pub fn extent(&self, sector_size: u64) -> Result<FileExtent> {
        FileExtent::new(
            self.start_sector,
            self.end_sector,
            self.last_sector_bytes,
            sector_size,
        )
    }

    /// Exact file length in bytes.
    pub fn length(&self, sector_size: u64) -> Result<u64> {
        Ok(self.extent(sector_size)?.length())
    }
}

/// Locates and parses the header triplet of the file a directory entry
/// points at.
pub fn read_file_header<R: Read + Seek>(
    cursor: &mut RecordCursor<R>,
    layout: &DirectoryLayout,
    entry: &DirectoryEntry,
) -> Result<FileHeader> {
    let geometry = cursor.geometry();
    let sector_size = geometry.sector_size;
    let mut offset = layout
        .sector_offset(&geometry, entry.start_sector)
        .ok_or(LabelError::InvalidExtent {
            start: entry.start_sector,
            end: entry.start_sector,
            last_sector_bytes: 0,
        })?;

    let mut attempts = 0;
    loop {
        attempts += 1;
        match cursor.find_label("HDR1", Some(Position::Offset(offset)), HDR1_SIZE) {
            Ok(Some(_)) => break,
            Ok(None) | Err(LabelError::TruncatedImage { .. }) => {}
            Err(e) => return Err(e),
        }
        if attempts > BACK_SCAN_ATTEMPTS || offset < sector_size {
            return Err(LabelError::FileHeaderNotFound {
                name: entry.name.clone(),
                attempts,
            });
        }
        offset -= sector_size;
        debug!(
            "read_file_header({}): HDR1 missing, backing up to {}",
            entry.name, offset
        );
    }

    let name = cursor.extract_string(5, 17);
    let file_set = cursor.extract_string(22, 6);
    let section = cursor.extract_integer(28, 4);
    let sequence = cursor.extract_integer(32, 4);
    let generation = cursor.extract_integer(36, 4);
    let generation_version = cursor.extract_integer(40, 2);
    let created = cursor.extract_date(42);
    let expires = cursor.extract_date(48);
    let accessibility = cursor.extract_char(54);
    let block_count = cursor.extract_integer(55, 6);
    let implementation = cursor.extract_string(61, 13);

    let hdr2_offset = offset + HDR1_SIZE as u64;
    // the character after the identifier is the spare flag
    let spare = cursor
        .find_label("HDR2", Some(Position::Offset(hdr2_offset)), HDR2_SIZE)?
        .ok_or(LabelError::LabelNotFound {
            identifier: "HDR2".to_string(),
            position: hdr2_offset,
        })?;
    let physical_record_size = cursor.extract_integer(6, 5);
    let start_sector = cursor.extract_integer(11, 5);
    let next_header_sector = cursor.extract_integer(16, 5);
    let end_sector = cursor.extract_integer(21, 5);
    let last_sector_bytes = cursor.extract_integer(26, 4);
    if physical_record_size != 0 && physical_record_size as u64 != sector_size {
        cursor.note(LabelError::MalformedField {
            field: "physical record size".to_string(),
            raw: format!("{} (volume uses {})", physical_record_size, sector_size),
        });
    }

    cursor.seek(Position::Offset(offset + (HDR1_SIZE + HDR2_SIZE) as u64))?;
    let trailer = match cursor.read_record(TRAILER_SIZE).map(|_| ()) {
        Ok(()) => Trailer::from_tag(cursor),
        Err(LabelError::TruncatedImage { .. }) => Trailer::Missing,
        Err(e) => return Err(e),
    };

    let header = FileHeader {
        header_offset: offset,
        name,
        file_set,
        section,
        sequence,
        generation,
        generation_version,
        created,
        expires,
        accessibility,
        block_count,
        implementation,
        spare,
        physical_record_size,
        start_sector,
        next_header_sector,
        end_sector,
        last_sector_bytes,
        trailer,
    };
    debug!("read_file_header({}): {:?}", entry.name, header);
    Ok(header)
}
