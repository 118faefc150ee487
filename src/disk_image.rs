use log::{debug, error, warn};
use std::{
    fs::{remove_file, File},
    io::{BufWriter, Read, Seek, Write},
    path::Path,
};

use crate::{
    directory::{read_directory, Directory, DirectoryEntry, DirectoryLayout},
    extent_copier::copy_extent,
    file_header::{read_file_header, FileHeader},
    geometry::Geometry,
    label::{ErrorMapDescriptor, VolumeDescriptor, VolumeHeaderRecord},
    label_parser::{Diagnostic, LabelError, RecordCursor, Result},
};

#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    /// Overrides the layout derived from the volume's record length.
    pub directory: Option<DirectoryLayout>,
}

/// An opened diskette image with its index cylinder and directory parsed.
pub struct DiskImage<R: Read + Seek> {
    cursor: RecordCursor<R>,
    volume: VolumeDescriptor,
    error_map: ErrorMapDescriptor,
    headers: Vec<VolumeHeaderRecord>,
    layout: DirectoryLayout,
    directory: Directory,
}

impl DiskImage<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, ImageOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: ImageOptions) -> Result<Self> {
        debug!("open: {:?}", path.as_ref());
        Self::from_reader(File::open(path)?, options)
    }
}

impl<R: Read + Seek> DiskImage<R> {
    /// The error map and volume label are required; volume headers and
    /// directory entries are taken as far as they can be read.
    pub fn from_reader(reader: R, options: ImageOptions) -> Result<Self> {
        let mut cursor = RecordCursor::new(reader);
        let error_map = cursor.read_error_map()?;
        let volume = cursor.read_volume_descriptor()?;
        debug!("from_reader: volume={:?}", volume);
        let headers = cursor.read_volume_headers();
        debug!("from_reader: {} volume headers", headers.len());

        cursor.set_geometry(Geometry::with_sector_size(volume.sector_size()));
        let layout = options
            .directory
            .unwrap_or_else(|| DirectoryLayout::for_record_length(volume.record_length));
        let directory = read_directory(&mut cursor, &layout)?;
        debug!("from_reader: {} directory entries", directory.len());

        Ok(Self {
            cursor,
            volume,
            error_map,
            headers,
            layout,
            directory,
        })
    }

    pub fn volume_descriptor(&self) -> &VolumeDescriptor {
        &self.volume
    }

    pub fn error_map(&self) -> &ErrorMapDescriptor {
        &self.error_map
    }

    pub fn headers(&self) -> &[VolumeHeaderRecord] {
        &self.headers
    }

    pub fn list_directory(&self) -> &[DirectoryEntry] {
        self.directory.list_all()
    }

    pub fn layout(&self) -> &DirectoryLayout {
        &self.layout
    }

    pub fn sector_size(&self) -> u64 {
        self.cursor.geometry().sector_size
    }

    /// Every tolerated problem seen so far, in the order it was seen.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.cursor.diagnostics()
    }

    pub fn find_file(&mut self, name: &str) -> Result<FileHeader> {
        let entry = self.find_entry(name)?;
        self.read_header(&entry)
    }

    /// Reads the header of one particular entry, which need not be the
    /// first with its name.
    pub fn read_header(&mut self, entry: &DirectoryEntry) -> Result<FileHeader> {
        read_file_header(&mut self.cursor, &self.layout, entry)
    }

    fn find_entry(&self, name: &str) -> Result<DirectoryEntry> {
        self.directory
            .find(name)
            .cloned()
            .ok_or_else(|| LabelError::FileNotFound(name.to_string()))
    }

    /// Writes the file's exact contents to `out` and returns the length.
    pub fn extract_to<W: Write>(&mut self, name: &str, out: &mut W) -> Result<u64> {
        let entry = self.find_entry(name)?;
        self.extract_entry_to(&entry, out)
    }

    pub fn extract_entry_to<W: Write>(
        &mut self,
        entry: &DirectoryEntry,
        out: &mut W,
    ) -> Result<u64> {
        let header = self.read_header(entry)?;
        let extent = header.extent(self.sector_size())?;
        copy_extent(&mut self.cursor, &self.layout, &extent, out)
    }

    pub fn extract_file(&mut self, name: &str, destination: impl AsRef<Path>) -> Result<u64> {
        let entry = self.find_entry(name)?;
        self.extract_entry(&entry, destination)
    }

    /// Extracts to a new file at `destination`. An existing file is never
    /// overwritten, and a partially written file is removed.
    pub fn extract_entry(
        &mut self,
        entry: &DirectoryEntry,
        destination: impl AsRef<Path>,
    ) -> Result<u64> {
        let destination = destination.as_ref();
        let header = self.read_header(entry)?;
        let extent = header.extent(self.sector_size())?;
        let file = File::create_new(destination).map_err(|err| {
            error!("Could not create output file {:?}: {}", destination, err);
            err
        })?;
        let mut out = BufWriter::new(file);
        let written = match copy_extent(&mut self.cursor, &self.layout, &extent, &mut out) {
            Ok(written) => written,
            Err(e) => {
                drop(out);
                discard_partial(destination);
                return Err(e);
            }
        };
        let synced = out
            .into_inner()
            .map_err(|err| err.into_error())
            .and_then(|file| file.sync_all());
        if let Err(e) = synced {
            discard_partial(destination);
            return Err(e.into());
        }
        debug!(
            "extract_entry: {} -> {:?}: {} bytes",
            entry.name, destination, written
        );
        Ok(written)
    }
}

fn discard_partial(destination: &Path) {
    if let Err(err) = remove_file(destination) {
        warn!("Could not remove partial output {:?}: {}", destination, err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::RecordLength;
    use crate::test_image::ImageBuilder;
    use std::io::Cursor;

    fn sample() -> ImageBuilder {
        let mut builder = ImageBuilder::new(RecordLength::Bytes128);
        builder.volume_header(8, "DATA1");
        builder.volume_header(9, "DATA2");
        builder.file("README", 40, b"Hello from the index cylinder era.\r\n");
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        builder.file("PAYLOAD", 50, &payload);
        builder.file("EMPTY", 60, b"");
        builder
    }

    fn open(builder: ImageBuilder) -> DiskImage<Cursor<Vec<u8>>> {
        DiskImage::from_reader(Cursor::new(builder.build()), ImageOptions::default()).unwrap()
    }

    #[test]
    fn test_open_parses_metadata() {
        let _ = env_logger::try_init();
        let image = open(sample());
        assert_eq!(image.volume_descriptor().identifier, "VOLID");
        assert_eq!(image.sector_size(), 128);
        assert!(!image.error_map().has_defects());
        assert_eq!(image.headers().len(), 2);
        assert_eq!(
            image
                .list_directory()
                .iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>(),
            vec!["README", "PAYLOAD", "EMPTY"]
        );
        assert!(image.diagnostics().is_empty());
    }

    #[test]
    fn test_extract_to_writer() {
        let mut image = open(sample());
        let mut out = Vec::new();
        let written = image.extract_to("PAYLOAD", &mut out).unwrap();
        assert_eq!(written, 300);
        let expected: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(out, expected);

        let mut out = Vec::new();
        assert_eq!(image.extract_to("EMPTY", &mut out).unwrap(), 0);
    }

    #[test]
    fn test_failures_are_per_file() {
        let mut builder = sample();
        builder.entry("GHOST", 0, 90);
        let mut image = open(builder);
        assert!(matches!(
            image.find_file("NOPE"),
            Err(LabelError::FileNotFound(_))
        ));
        assert!(matches!(
            image.find_file("GHOST"),
            Err(LabelError::FileHeaderNotFound { .. })
        ));
        // the image is still usable afterwards
        assert_eq!(image.find_file("README").unwrap().name, "README");
    }

    #[test]
    fn test_extract_file_to_path() {
        let mut image = open(sample());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.txt");
        let written = image.extract_file("README", &path).unwrap();
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"Hello from the index cylinder era.\r\n"
        );
        assert_eq!(written, 36);

        // never overwrites
        assert!(matches!(
            image.extract_file("PAYLOAD", &path),
            Err(LabelError::Io(_))
        ));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"Hello from the index cylinder era.\r\n"
        );
    }

    #[test]
    fn test_truncated_extract_leaves_no_file() {
        let mut builder = ImageBuilder::new(RecordLength::Bytes128);
        // header at 40, trailer at 41, data in sectors 42..=44
        builder.file("CUT", 40, &[b'c'; 300]);
        let mut bytes = builder.build();
        assert_eq!(bytes.len(), 44 * 128);
        bytes.truncate(43 * 128 + 10);
        let mut image =
            DiskImage::from_reader(Cursor::new(bytes), ImageOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut");
        assert!(matches!(
            image.extract_file("CUT", &path),
            Err(LabelError::TruncatedExtent {
                expected: 300,
                written: 256
            })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_duplicate_names_extract_by_entry() {
        let mut builder = ImageBuilder::new(RecordLength::Bytes128);
        builder.file("TWIN", 40, b"first");
        builder.file("TWIN", 50, b"second");
        let mut image = open(builder);
        let entries = image.list_directory().to_vec();
        assert_eq!(entries.len(), 2);
        let contents: Vec<Vec<u8>> = entries
            .iter()
            .map(|entry| {
                let mut out = Vec::new();
                image.extract_entry_to(entry, &mut out).unwrap();
                out
            })
            .collect();
        assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec()]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twin.2");
        assert_eq!(image.extract_entry(&entries[1], &path).unwrap(), 6);
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        // lookup by name still means the first entry
        assert_eq!(image.find_file("TWIN").unwrap().start_sector, 42);
    }

    #[test]
    fn test_open_without_volume_label() {
        let mut builder = sample();
        builder.patch_index_sector(7, 1, b"    ");
        match DiskImage::from_reader(Cursor::new(builder.build()), ImageOptions::default()) {
            Err(LabelError::LabelNotFound { identifier, .. }) => assert_eq!(identifier, "VOL1"),
            Err(e) => panic!("unexpected {}", e),
            Ok(_) => panic!("opened an image without VOL1"),
        }
    }

    #[test]
    fn test_open_without_error_map() {
        let mut builder = sample();
        builder.patch_index_sector(5, 1, b"VOL1");
        assert!(matches!(
            DiskImage::from_reader(Cursor::new(builder.build()), ImageOptions::default()),
            Err(LabelError::LabelNotFound { .. })
        ));
    }

    #[test]
    fn test_truncated_index_cylinder_is_io_level() {
        let bytes = vec![0u8; 200];
        assert!(matches!(
            DiskImage::from_reader(Cursor::new(bytes), ImageOptions::default()),
            Err(LabelError::TruncatedImage { .. })
        ));
    }

    #[test]
    fn test_larger_records() {
        let mut builder = ImageBuilder::new(RecordLength::Bytes512);
        let text = vec![b'Z'; 1000];
        builder.file("BIG", 12, &text);
        let mut image = open(builder);
        assert_eq!(image.layout().directory_sector, 8);
        assert_eq!(image.find_file("BIG").unwrap().length(512).unwrap(), 1000);
        let mut out = Vec::new();
        image.extract_to("BIG", &mut out).unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn test_layout_override() {
        let mut builder = ImageBuilder::new(RecordLength::Bytes128);
        builder.directory_sector(30);
        builder.file("MOVED", 40, b"ok");
        let options = ImageOptions {
            directory: Some(DirectoryLayout {
                directory_sector: 30,
                base_sector: 1,
            }),
        };
        let mut image =
            DiskImage::from_reader(Cursor::new(builder.build()), options).unwrap();
        let mut out = Vec::new();
        image.extract_to("MOVED", &mut out).unwrap();
        assert_eq!(out, b"ok");
    }
}
