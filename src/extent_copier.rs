use log::debug;
use std::io::{Read, Seek, Write};

use crate::{
    directory::DirectoryLayout,
    geometry::Position,
    label_parser::{LabelError, RecordCursor, Result},
};

/// The sectors holding a file's data, from HDR2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileExtent {
    pub start_sector: u32,
    pub end_sector: u32,
    /// Bytes of `end_sector` that belong to the file.
    pub last_sector_bytes: u32,
    pub sector_size: u64,
}

impl FileExtent {
    pub fn new(
        start_sector: u32,
        end_sector: u32,
        last_sector_bytes: u32,
        sector_size: u64,
    ) -> Result<Self> {
        if end_sector < start_sector || last_sector_bytes as u64 > sector_size {
            return Err(LabelError::InvalidExtent {
                start: start_sector,
                end: end_sector,
                last_sector_bytes,
            });
        }
        Ok(Self {
            start_sector,
            end_sector,
            last_sector_bytes,
            sector_size,
        })
    }

    pub fn length(&self) -> u64 {
        (self.end_sector - self.start_sector) as u64 * self.sector_size
            + self.last_sector_bytes as u64
    }
}

/// Streams exactly `extent.length()` bytes to `out`, one sector at a time.
/// Only the final sector is cut short.
pub fn copy_extent<R: Read + Seek, W: Write>(
    cursor: &mut RecordCursor<R>,
    layout: &DirectoryLayout,
    extent: &FileExtent,
    out: &mut W,
) -> Result<u64> {
    let geometry = cursor.geometry();
    let expected = extent.length();
    let mut remaining = expected;
    let mut written = 0u64;
    debug!("copy_extent: {:?} length={}", extent, expected);

    for sector in extent.start_sector..=extent.end_sector {
        if remaining == 0 {
            break;
        }
        let offset = layout
            .sector_offset(&geometry, sector)
            .ok_or(LabelError::InvalidExtent {
                start: extent.start_sector,
                end: extent.end_sector,
                last_sector_bytes: extent.last_sector_bytes,
            })?;
        cursor.seek(Position::Offset(offset))?;
        let data = match cursor.read_record(extent.sector_size as usize) {
            Ok(data) => data,
            Err(LabelError::TruncatedImage { .. }) => {
                return Err(LabelError::TruncatedExtent { expected, written })
            }
            Err(e) => return Err(e),
        };
        let take = remaining.min(extent.sector_size);
        out.write_all(&data[..take as usize])?;
        written += take;
        remaining -= take;
    }

    if written != expected {
        return Err(LabelError::TruncatedExtent { expected, written });
    }
    Ok(written)
}
