//! Reads hard-sectored 8" diskette images labelled in the ECMA tape-label
//! style: volume label, error map, index cylinder headers, directory and
//! per-file header records, and extracts the files they describe.

pub mod charset;
pub mod directory;
pub mod disk_image;
pub mod extent_copier;
pub mod file_header;
pub mod geometry;
pub mod label;
pub mod label_parser;
pub mod textcopy;

#[cfg(test)]
mod test_image;

pub use disk_image::{DiskImage, ImageOptions};
pub use label_parser::{LabelError, Result};
