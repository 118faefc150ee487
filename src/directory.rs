use log::{debug, warn};
use static_assertions::assert_eq_size;
use std::io::{Read, Seek};

use crate::{
    charset,
    geometry::{Geometry, Position, DEFAULT_SECTOR_SIZE, SECTORS_PER_TRACK},
    label::RecordLength,
    label_parser::{LabelError, RecordCursor, Result},
};

pub const DIRECTORY_ENTRY_SIZE: usize = 11;
/// Marks system/protected entries.
pub const SYSTEM_FLAG: u8 = 0x40;
/// First byte of the entry after the last one.
const SENTINEL: i8 = -1;

/// On-disk layout of one directory entry.
#[repr(C)]
struct RawDirectoryEntry {
    name: [u8; 8],
    flag: u8,
    /// big endian
    start_sector: [u8; 2],
}
assert_eq_size!(RawDirectoryEntry, [u8; DIRECTORY_ENTRY_SIZE]);

impl RawDirectoryEntry {
    fn read(bytes: &[u8]) -> Self {
        let mut name = [0u8; 8];
        name.copy_from_slice(&bytes[0..8]);
        Self {
            name,
            flag: bytes[8],
            start_sector: [bytes[9], bytes[10]],
        }
    }
}

/// Where the directory lives and how its sector numbers map to offsets.
///
/// Sector numbers in the directory and in file headers are linear
/// record numbers; record `n` starts at `(n - base_sector) * sector_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub directory_sector: u32,
    pub base_sector: u32,
}

impl DirectoryLayout {
    /// The directory starts on the first record boundary after the
    /// 128-byte index cylinder.
    pub fn for_record_length(record_length: RecordLength) -> Self {
        let index_cylinder_bytes = SECTORS_PER_TRACK * DEFAULT_SECTOR_SIZE;
        let sectors = index_cylinder_bytes.div_ceil(record_length.sector_size());
        Self {
            directory_sector: sectors as u32 + 1,
            base_sector: 1,
        }
    }

    pub fn sector_offset(&self, geometry: &Geometry, sector: u32) -> Option<u64> {
        geometry.linear_offset(sector, self.base_sector)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub flag: u8,
    pub start_sector: u32,
}

impl DirectoryEntry {
    /// Decodes one 11-byte entry. The error is the reason it is unusable.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        if bytes.len() < DIRECTORY_ENTRY_SIZE {
            return Err(format!("short entry of {} bytes", bytes.len()));
        }
        let raw = RawDirectoryEntry::read(bytes);
        let name = charset::decode(&raw.name).trim().to_string();
        if name.is_empty() {
            return Err("blank name".to_string());
        }
        if !name.chars().all(charset::is_name_char) {
            return Err(format!("unprintable name {:?}", name));
        }
        Ok(Self {
            name,
            flag: raw.flag,
            start_sector: u16::from_be_bytes(raw.start_sector) as u32,
        })
    }

    pub fn is_system(&self) -> bool {
        self.flag & SYSTEM_FLAG != 0
    }
}

/// Entries in on-disk order.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: Vec<DirectoryEntry>,
}

impl Directory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    /// First entry with this name; names are not unique on disk.
    pub fn find(&self, name: &str) -> Option<&DirectoryEntry> {
        let name = name.trim();
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn list_all(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scans the directory until the sentinel. Unusable entries are recorded as
/// diagnostics and skipped; running off the end of the image ends the scan.
pub fn read_directory<R: Read + Seek>(
    cursor: &mut RecordCursor<R>,
    layout: &DirectoryLayout,
) -> Result<Directory> {
    let geometry = cursor.geometry();
    let start = layout
        .sector_offset(&geometry, layout.directory_sector)
        .ok_or(LabelError::InvalidExtent {
            start: layout.directory_sector,
            end: layout.directory_sector,
            last_sector_bytes: 0,
        })?;
    debug!("read_directory: layout={:?} offset={}", layout, start);

    let mut entries = Vec::new();
    for index in 0.. {
        cursor.seek(Position::Offset(start + (index * DIRECTORY_ENTRY_SIZE) as u64))?;
        let bytes = match cursor.read_record(DIRECTORY_ENTRY_SIZE) {
            Ok(bytes) => bytes,
            Err(LabelError::TruncatedImage { position, .. }) => {
                warn!(
                    "read_directory: image ended at {} before the directory sentinel",
                    position
                );
                break;
            }
            Err(e) => return Err(e),
        };
        if bytes[0] as i8 == SENTINEL {
            debug!("read_directory: sentinel after {} entries", index);
            break;
        }
        match DirectoryEntry::decode(bytes) {
            Ok(entry) => {
                debug!("read_directory: {:?}", entry);
                entries.push(entry);
            }
            Err(reason) => cursor.note(LabelError::MalformedDirectoryEntry { index, reason }),
        }
    }
    Ok(Directory::new(entries))
}
