//! Cylinder/side/sector addressing for hard-sectored 8" media.

use std::fmt;

/// Every track on the supported media carries 26 hard sectors.
pub const SECTORS_PER_TRACK: u64 = 26;
/// Record size of the index cylinder and the default for data cylinders.
pub const DEFAULT_SECTOR_SIZE: u64 = 128;

/// A physical sector address. Sector numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryAddress {
    pub cylinder: u32,
    pub side: u8,
    pub sector: u32,
}

impl GeometryAddress {
    pub fn new(cylinder: u32, side: u8, sector: u32) -> Self {
        Self {
            cylinder,
            side,
            sector,
        }
    }

    /// A sector on the index cylinder (cylinder 0, side 0).
    pub fn index_cylinder(sector: u32) -> Self {
        Self::new(0, 0, sector)
    }
}

impl fmt::Display for GeometryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}/{:02}", self.cylinder, self.side, self.sector)
    }
}

/// Where a record read should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Chs(GeometryAddress),
    Offset(u64),
}

impl From<GeometryAddress> for Position {
    fn from(address: GeometryAddress) -> Self {
        Position::Chs(address)
    }
}

impl From<u64> for Position {
    fn from(offset: u64) -> Self {
        Position::Offset(offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub sectors_per_track: u64,
    pub sector_size: u64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::with_sector_size(DEFAULT_SECTOR_SIZE)
    }
}

impl Geometry {
    pub fn with_sector_size(sector_size: u64) -> Self {
        Self {
            sectors_per_track: SECTORS_PER_TRACK,
            sector_size,
        }
    }

    /// Absolute byte offset of a position in the image.
    ///
    /// Side 1 doubles the cylinder's contribution instead of adding one
    /// track; images written by the original tooling depend on this.
    /// Out-of-range sectors are not rejected.
    pub fn offset(&self, position: Position) -> u64 {
        match position {
            Position::Offset(offset) => offset,
            Position::Chs(address) => {
                let track = address.cylinder as u64 * (address.side as u64 + 1);
                (track * self.sectors_per_track + address.sector as u64)
                    .wrapping_sub(1)
                    .wrapping_mul(self.sector_size)
            }
        }
    }

    /// Byte offset of a linear record number relative to `base_sector`.
    pub fn linear_offset(&self, sector: u32, base_sector: u32) -> Option<u64> {
        sector
            .checked_sub(base_sector)
            .map(|relative| relative as u64 * self.sector_size)
    }
}
