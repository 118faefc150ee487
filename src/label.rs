//! Fixed-format labels recorded on the index cylinder.
//!
//! Field columns are 1-based, as printed in the labelling standards
//! (ECMA-13 for the header layout, ECMA-58 for the diskette variants).

use std::fmt;
use std::io::{Read, Seek};

use crate::label_parser::{FieldCode, LabelError, RecordCursor, Result};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// YYMMDD date. A zero day is the "no date" sentinel.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: u8,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub fn is_present(&self) -> bool {
        self.day != 0
    }

    pub fn month_name(&self) -> &'static str {
        (self.month as usize)
            .checked_sub(1)
            .and_then(|i| MONTHS.get(i))
            .copied()
            .unwrap_or("???")
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_present() {
            return Ok(());
        }
        write!(f, "{} {} {:02}", self.day, self.month_name(), self.year)
    }
}

/// A `CCHSS` sector address as written in header labels.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub cylinder: u8,
    pub side: u8,
    pub sector: u8,
}

impl Extent {
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = || LabelError::MalformedField {
            field: "extent".to_string(),
            raw: text.to_string(),
        };
        if text.len() != 5 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let number = |range: std::ops::Range<usize>| text[range].parse::<u8>().map_err(|_| malformed());
        Ok(Self {
            cylinder: number(0..2)?,
            side: number(2..3)?,
            sector: number(3..5)?,
        })
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{}{:02}", self.cylinder, self.side, self.sector)
    }
}

/// How the surfaces were formatted (VOL1 column 72).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    SingleSideEcma54,
    DoubleSideEcma59,
    DoubleSideEcma69,
    Other(char),
}

impl From<char> for SurfaceFormat {
    fn from(code: char) -> Self {
        match code {
            ' ' => SurfaceFormat::SingleSideEcma54,
            '1' => SurfaceFormat::DoubleSideEcma59,
            '2' => SurfaceFormat::DoubleSideEcma69,
            other => SurfaceFormat::Other(other),
        }
    }
}

impl FieldCode for SurfaceFormat {
    const FIELD: &'static str = "surface format";
    fn is_recognized(&self) -> bool {
        !matches!(self, SurfaceFormat::Other(_))
    }
}

impl fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceFormat::SingleSideEcma54 => f.write_str("single side (ECMA-54)"),
            SurfaceFormat::DoubleSideEcma59 => f.write_str("double side (ECMA-59)"),
            SurfaceFormat::DoubleSideEcma69 => f.write_str("double side (ECMA-69)"),
            SurfaceFormat::Other(code) => write!(f, "{:?}", code),
        }
    }
}

/// Physical record length (VOL1 column 76).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLength {
    Bytes128,
    Bytes256,
    Bytes512,
    Bytes1024,
    Other(char),
}

impl RecordLength {
    /// Sector size in bytes. Unknown codes fall back to 128.
    pub fn sector_size(&self) -> u64 {
        match self {
            RecordLength::Bytes128 | RecordLength::Other(_) => 128,
            RecordLength::Bytes256 => 256,
            RecordLength::Bytes512 => 512,
            RecordLength::Bytes1024 => 1024,
        }
    }

    pub fn code(&self) -> char {
        match self {
            RecordLength::Bytes128 => ' ',
            RecordLength::Bytes256 => '1',
            RecordLength::Bytes512 => '2',
            RecordLength::Bytes1024 => '3',
            RecordLength::Other(code) => *code,
        }
    }
}

impl From<char> for RecordLength {
    fn from(code: char) -> Self {
        match code {
            ' ' => RecordLength::Bytes128,
            '1' => RecordLength::Bytes256,
            '2' => RecordLength::Bytes512,
            '3' => RecordLength::Bytes1024,
            other => RecordLength::Other(other),
        }
    }
}

impl FieldCode for RecordLength {
    const FIELD: &'static str = "record length";
    fn is_recognized(&self) -> bool {
        !matches!(self, RecordLength::Other(_))
    }
}

impl fmt::Display for RecordLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordLength::Other(code) => write!(f, "{:?}", code),
            known => write!(f, "{} bytes", known.sector_size()),
        }
    }
}

/// Sidedness of the allocation (VOL1 column 73).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    SingleSided,
    DoubleSided,
    Other(char),
}

impl From<char> for Allocation {
    fn from(code: char) -> Self {
        match code {
            ' ' | '1' => Allocation::SingleSided,
            '2' => Allocation::DoubleSided,
            other => Allocation::Other(other),
        }
    }
}

impl FieldCode for Allocation {
    const FIELD: &'static str = "allocation";
    fn is_recognized(&self) -> bool {
        !matches!(self, Allocation::Other(_))
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Allocation::SingleSided => f.write_str("single sided"),
            Allocation::DoubleSided => f.write_str("double sided"),
            Allocation::Other(code) => write!(f, "{:?}", code),
        }
    }
}

/// VOL1, cylinder 0 sector 7.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeDescriptor {
    pub identifier: String,
    pub accessibility: char,
    pub owner: String,
    pub surface: SurfaceFormat,
    pub allocation: Allocation,
    pub record_length: RecordLength,
    pub sector_sequence: u32,
    pub version: char,
}

impl VolumeDescriptor {
    pub const IDENTIFIER: &'static str = "VOL";
    pub const SEQUENCE: char = '1';

    /// Parses the active record, which must already hold a VOL1 label.
    pub fn read<R: Read + Seek>(cursor: &mut RecordCursor<R>) -> Self {
        Self {
            identifier: cursor.extract_string(5, 6),
            accessibility: cursor.extract_char(11),
            owner: cursor.extract_string(38, 14),
            surface: cursor.extract_code(72),
            allocation: cursor.extract_code(73),
            record_length: cursor.extract_code(76),
            sector_sequence: cursor.extract_integer(77, 2),
            version: cursor.extract_char(80),
        }
    }

    pub fn sector_size(&self) -> u64 {
        self.record_length.sector_size()
    }
}

/// ERMAP, cylinder 0 sector 5.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMapDescriptor {
    pub first_defective_cylinder: String,
    pub second_defective_cylinder: String,
    pub relocation: char,
    pub error_directory_indicator: char,
    /// Kept verbatim; its layout is implementation defined.
    pub error_directory: Vec<u8>,
}

impl ErrorMapDescriptor {
    pub const IDENTIFIER: &'static str = "ERM";
    pub const SEQUENCE: char = 'A';
    pub const ERROR_DIRECTORY_SIZE: usize = 48;

    pub fn read<R: Read + Seek>(cursor: &mut RecordCursor<R>) -> Self {
        Self {
            first_defective_cylinder: cursor.extract_string(7, 5),
            second_defective_cylinder: cursor.extract_string(13, 5),
            relocation: cursor.extract_char(23),
            error_directory_indicator: cursor.extract_char(24),
            error_directory: cursor
                .raw_field(33, Self::ERROR_DIRECTORY_SIZE)
                .to_vec(),
        }
    }

    pub fn has_defects(&self) -> bool {
        !self.first_defective_cylinder.is_empty() || !self.second_defective_cylinder.is_empty()
    }
}

/// A volume-level HDR1 on the index cylinder, one per data set.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeHeaderRecord {
    pub identifier: String,
    pub block_length: u32,
    pub record_format: char,
    pub begin: Extent,
    pub end: Extent,
    pub bypass: char,
    pub access: char,
    pub write_protect: char,
    pub interchange: char,
    pub multivolume: char,
    pub section: u32,
    pub created: Date,
    pub record_length: u32,
    pub attribute: char,
    pub expires: Date,
    pub verify: char,
    pub organization: char,
    pub end_of_data: Extent,
}

impl VolumeHeaderRecord {
    pub const IDENTIFIER: &'static str = "HDR";
    pub const SEQUENCE: char = '1';

    /// Extents are parsed strictly; a bad one fails the whole header.
    pub fn read<R: Read + Seek>(cursor: &mut RecordCursor<R>) -> Result<Self> {
        Ok(Self {
            identifier: cursor.extract_string(6, 17),
            block_length: cursor.extract_integer(23, 5),
            record_format: cursor.extract_char(28),
            begin: Extent::parse(&cursor.extract_string(29, 5))?,
            end: Extent::parse(&cursor.extract_string(35, 5))?,
            bypass: cursor.extract_char(41),
            access: cursor.extract_char(42),
            write_protect: cursor.extract_char(43),
            interchange: cursor.extract_char(44),
            multivolume: cursor.extract_char(45),
            section: cursor.extract_integer(46, 2),
            created: cursor.extract_date(48),
            record_length: cursor.extract_integer(54, 4),
            attribute: cursor.extract_char(63),
            expires: cursor.extract_date(67),
            verify: cursor.extract_char(73),
            organization: cursor.extract_char(74),
            end_of_data: Extent::parse(&cursor.extract_string(75, 5))?,
        })
    }
}
