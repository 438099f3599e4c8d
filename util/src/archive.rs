//! CSV archiving functionality
//!
//! An [`Archiver`] owns one append-mode CSV file. Records are written already
//! formatted, so the caller fully controls the numeric precision of every
//! column, and each record is flushed as soon as it is written.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::{Path, PathBuf};
use std::fs::{File, OpenOptions};
use csv::WriterBuilder;
pub use csv::Writer;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    path: PathBuf,
    writer: Writer<File>,
    num_records: usize
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot open the archive file {0:?}: {1}")]
    OpenError(PathBuf, std::io::Error),

    #[error("Cannot write a record to the archive: {0}")]
    WriteError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver at the given path, writing the given header row.
    ///
    /// Any existing file at the path is truncated.
    pub fn from_path<P: AsRef<Path>, H: AsRef<[u8]>>(
        path: P,
        header: &[H]
    ) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();

        // Create the file (truncating any previous run)
        File::create(&path)
            .map_err(|e| ArchiveError::OpenError(path.clone(), e))?;

        // Open the file in append mode
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| ArchiveError::OpenError(path.clone(), e))?;

        let writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let mut archiver = Self {
            path,
            writer,
            num_records: 0
        };

        archiver.write_fields(header)?;

        Ok(archiver)
    }

    /// Write one record and flush it to disk.
    pub fn write_row<H: AsRef<[u8]>>(&mut self, fields: &[H]) -> Result<(), ArchiveError> {
        self.write_fields(fields)?;
        self.num_records += 1;
        Ok(())
    }

    /// Number of data records written (excluding the header).
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_fields<H: AsRef<[u8]>>(&mut self, fields: &[H]) -> Result<(), ArchiveError> {
        self.writer
            .write_record(fields)
            .map_err(ArchiveError::WriteError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rows_are_flushed() -> Result<(), ArchiveError> {
        let path = std::env::temp_dir().join("util_archive_test.csv");
        let mut arch = Archiver::from_path(&path, &["t", "x"])?;

        arch.write_row(&[format!("{:.2}", 0.0), format!("{:.4}", 1.0 / 3.0)])?;
        arch.write_row(&["0.05", "0.5000"])?;

        // Read back while the archiver is still open, rows must already be on
        // disk
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "t,x\n0.00,0.3333\n0.05,0.5000\n");
        assert_eq!(arch.num_records(), 2);

        // Re-creating the archive truncates the previous run
        let arch = Archiver::from_path(&path, &["t"])?;
        assert_eq!(arch.num_records(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "t\n");

        Ok(())
    }

    #[test]
    fn test_open_error() {
        match Archiver::from_path("/no/such/dir/out.csv", &["t"]) {
            Err(ArchiveError::OpenError(..)) => (),
            Err(e) => panic!("Unexpected error {}", e),
            Ok(_) => panic!("Expected an error")
        }
    }
}
