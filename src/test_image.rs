//! Builds synthetic diskette images for tests.

use crate::{
    directory::{DirectoryLayout, DIRECTORY_ENTRY_SIZE},
    file_header::{HDR1_SIZE, HDR2_SIZE, TRAILER_SIZE},
    geometry::{Geometry, GeometryAddress, DEFAULT_SECTOR_SIZE, SECTORS_PER_TRACK},
    label::RecordLength,
    label_parser::{ERROR_MAP_SECTOR, INDEX_RECORD_SIZE, VOLUME_LABEL_SECTOR},
};

/// Writes `bytes` at 1-based column `start` of `record`.
pub fn field(record: &mut [u8], start: usize, bytes: &[u8]) {
    record[start - 1..start - 1 + bytes.len()].copy_from_slice(bytes);
}

fn blank_record(size: usize) -> Vec<u8> {
    vec![b' '; size]
}

pub struct ImageBuilder {
    data: Vec<u8>,
    record_length: RecordLength,
    layout: DirectoryLayout,
    entries: Vec<[u8; DIRECTORY_ENTRY_SIZE]>,
}

impl ImageBuilder {
    pub fn new(record_length: RecordLength) -> Self {
        let mut builder = Self {
            data: vec![0u8; (SECTORS_PER_TRACK * DEFAULT_SECTOR_SIZE) as usize],
            record_length,
            layout: DirectoryLayout::for_record_length(record_length),
            entries: Vec::new(),
        };

        let mut error_map = blank_record(INDEX_RECORD_SIZE);
        field(&mut error_map, 1, b"ERMAP");
        builder.write_index_sector(ERROR_MAP_SECTOR, &error_map);

        let mut volume = blank_record(INDEX_RECORD_SIZE);
        field(&mut volume, 1, b"VOL1");
        field(&mut volume, 5, b"VOLID ");
        field(&mut volume, 76, &[record_length.code() as u8]);
        field(&mut volume, 77, b"01");
        field(&mut volume, 80, b"W");
        builder.write_index_sector(VOLUME_LABEL_SECTOR, &volume);
        builder
    }

    pub fn record_length(&self) -> RecordLength {
        self.record_length
    }

    fn sector_size(&self) -> usize {
        self.record_length.sector_size() as usize
    }

    fn index_offset(sector: u32) -> usize {
        Geometry::default().offset(GeometryAddress::index_cylinder(sector).into()) as usize
    }

    fn write_index_sector(&mut self, sector: u32, record: &[u8]) {
        self.patch(Self::index_offset(sector), record);
    }

    /// Overwrites bytes at 1-based `column` of an index cylinder sector.
    pub fn patch_index_sector(&mut self, sector: u32, column: usize, bytes: &[u8]) {
        self.patch(Self::index_offset(sector) + column - 1, bytes);
    }

    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
    }

    pub fn volume_owner(&mut self, owner: &str) {
        self.patch_index_sector(VOLUME_LABEL_SECTOR, 38, owner.as_bytes());
    }

    pub fn volume_header(&mut self, sector: u32, identifier: &str) {
        let mut record = blank_record(INDEX_RECORD_SIZE);
        field(&mut record, 1, b"HDR1");
        field(&mut record, 6, identifier.as_bytes());
        field(&mut record, 23, b"00128");
        field(&mut record, 29, b"01001");
        field(&mut record, 35, b"73026");
        field(&mut record, 48, b"850314");
        field(&mut record, 54, b"0080");
        field(&mut record, 75, b"02001");
        self.write_index_sector(sector, &record);
    }

    pub fn directory_sector(&mut self, sector: u32) {
        self.layout.directory_sector = sector;
    }

    pub fn entry(&mut self, name: &str, flag: u8, start_sector: u16) {
        let mut entry = [b' '; DIRECTORY_ENTRY_SIZE];
        entry[..name.len()].copy_from_slice(name.as_bytes());
        entry[8] = flag;
        entry[9..].copy_from_slice(&start_sector.to_be_bytes());
        self.entries.push(entry);
    }

    fn sector_offset(&self, sector: u32) -> usize {
        (sector - self.layout.base_sector) as usize * self.sector_size()
    }

    /// A file whose header sits where its directory entry says.
    pub fn file(&mut self, name: &str, start_sector: u32, contents: &[u8]) {
        self.file_at(name, start_sector, start_sector, contents);
    }

    /// A file listed at `entry_sector` whose header really is at
    /// `header_sector`.
    pub fn file_at(&mut self, name: &str, entry_sector: u32, header_sector: u32, contents: &[u8]) {
        let size = self.sector_size();
        let header_bytes = HDR1_SIZE + HDR2_SIZE + TRAILER_SIZE;
        let data_start = header_sector + header_bytes.div_ceil(size) as u32;
        let sectors = contents.len().div_ceil(size).max(1);
        let end = data_start + sectors as u32 - 1;
        let last = contents.len() - (sectors - 1) * size;

        let mut hdr1 = blank_record(HDR1_SIZE);
        field(&mut hdr1, 1, b"HDR1");
        field(&mut hdr1, 5, name.as_bytes());
        field(&mut hdr1, 22, b"SET001");
        field(&mut hdr1, 28, b"0001");
        field(&mut hdr1, 32, b"0001");
        field(&mut hdr1, 36, b"0001");
        field(&mut hdr1, 40, b"00");
        field(&mut hdr1, 42, b"850314");
        field(&mut hdr1, 55, format!("{:06}", sectors).as_bytes());
        field(&mut hdr1, 61, b"ECMAFLOPPY");

        let mut hdr2 = blank_record(HDR2_SIZE);
        field(&mut hdr2, 1, b"HDR2u");
        field(&mut hdr2, 6, format!("{:05}", size).as_bytes());
        field(&mut hdr2, 11, format!("{:05}", data_start).as_bytes());
        field(&mut hdr2, 16, b"00000");
        field(&mut hdr2, 21, format!("{:05}", end).as_bytes());
        field(&mut hdr2, 26, format!("{:04}", last).as_bytes());

        let mut trailer = blank_record(TRAILER_SIZE);
        field(&mut trailer, 1, b"DATE850101850202");

        let offset = self.sector_offset(header_sector);
        self.patch(offset, &hdr1);
        self.patch(offset + HDR1_SIZE, &hdr2);
        self.patch(offset + HDR1_SIZE + HDR2_SIZE, &trailer);

        let data_offset = self.sector_offset(data_start);
        let mut data = contents.to_vec();
        data.resize(sectors * size, 0);
        self.patch(data_offset, &data);

        self.entry(name, 0, entry_sector as u16);
    }

    pub fn build(mut self) -> Vec<u8> {
        let mut directory: Vec<u8> = self.entries.concat();
        directory.push(0xFF);
        let offset = self.sector_offset(self.layout.directory_sector);
        self.patch(offset, &directory);
        let size = self.sector_size();
        let whole = self.data.len().div_ceil(size) * size;
        self.data.resize(whole, 0);
        self.data
    }
}
