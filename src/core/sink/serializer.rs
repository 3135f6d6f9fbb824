//! Shared CSV serialization core
//!
//! Comma-delimited, LF-terminated. A field is quoted only when it contains a
//! comma, a double quote or a line break; embedded quotes are doubled. NULL
//! and empty values both render as an empty field.

use crate::adapters::source::RowBuffer;
use crate::domain::{Result, SyncError};
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Rows written between explicit flushes
pub const FLUSH_INTERVAL: u64 = 1000;

/// CSV writer over a local file, reused by every sink variant
pub struct CsvCore {
    writer: Writer<File>,
    path: PathBuf,
    row: RowBuffer,
    rows_written: u64,
}

impl CsvCore {
    /// Creates (or truncates) the destination file
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Sink` if the file cannot be created.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SyncError::Sink(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let file = File::create(path)
            .map_err(|e| SyncError::Sink(format!("cannot create {}: {}", path.display(), e)))?;

        let writer = WriterBuilder::new()
            .delimiter(b',')
            .quote(b'"')
            .double_quote(true)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .has_headers(false)
            .flexible(true)
            .from_writer(file);

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            row: RowBuffer::default(),
            rows_written: 0,
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the header line and sizes the row buffer
    pub fn write_headers(&mut self, columns: &[String]) -> Result<()> {
        self.writer.write_record(columns)?;
        self.row.reset(columns.len());
        Ok(())
    }

    /// Buffer the next row is scanned into
    pub fn row_buffer(&mut self) -> &mut RowBuffer {
        &mut self.row
    }

    /// Serializes the buffered row
    pub fn write_buffered_row(&mut self) -> Result<()> {
        self.writer.write_record(self.row.fields())?;
        self.rows_written += 1;
        if self.rows_written % FLUSH_INTERVAL == 0 {
            self.flush()?;
        }
        Ok(())
    }

    /// Data rows written so far (header excluded)
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Pushes buffered output to the file
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| SyncError::Sink(format!("flush {}: {}", self.path.display(), e)))
    }

    /// Flushes, syncs and closes the file
    pub fn finish(self) -> Result<PathBuf> {
        let path = self.path;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| SyncError::Sink(format!("flush {}: {}", path.display(), e.error())))?;
        file.sync_all()
            .map_err(|e| SyncError::Sink(format!("sync {}: {}", path.display(), e)))?;
        Ok(path)
    }

    /// Closes and deletes the file
    pub fn discard(self) -> Result<()> {
        let path = self.path;
        drop(self.writer);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Sink(format!(
                "cannot remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// One sink's output file across its lifecycle
///
/// The core is dropped once the output is discarded; later writes fail and
/// [`CsvOutput::row_buffer`] returns `None`.
pub struct CsvOutput {
    core: Option<CsvCore>,
    path: PathBuf,
}

impl CsvOutput {
    /// Creates the file immediately
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Sink` if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let core = CsvCore::create(&path)?;
        Ok(Self {
            core: Some(core),
            path,
        })
    }

    fn core(&mut self) -> Result<&mut CsvCore> {
        self.core
            .as_mut()
            .ok_or_else(|| SyncError::Sink(format!("{} already discarded", self.path.display())))
    }

    /// Writes the header line
    pub fn write_headers(&mut self, columns: &[String]) -> Result<()> {
        self.core()?.write_headers(columns)
    }

    /// Row buffer, `None` once discarded
    pub fn row_buffer(&mut self) -> Option<&mut RowBuffer> {
        self.core.as_mut().map(CsvCore::row_buffer)
    }

    /// Serializes the buffered row
    pub fn write_buffered_row(&mut self) -> Result<()> {
        self.core()?.write_buffered_row()
    }

    /// Pushes buffered output to the file
    pub fn flush(&mut self) -> Result<()> {
        self.core()?.flush()
    }

    /// Deletes the file if it holds no data rows; `true` if it was removed
    pub fn remove(&mut self) -> Result<bool> {
        if self.rows_written() > 0 {
            return Ok(false);
        }
        match self.core.take() {
            Some(core) => {
                core.discard()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deletes the file regardless of row count
    pub fn abort(&mut self) -> Result<()> {
        match self.core.take() {
            Some(core) => core.discard(),
            None => Ok(()),
        }
    }

    /// Data rows written (header excluded); zero once discarded
    pub fn rows_written(&self) -> u64 {
        self.core.as_ref().map_or(0, CsvCore::rows_written)
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the file
    ///
    /// # Returns
    ///
    /// The finished path, or `None` if the output was discarded.
    pub fn finish(self) -> Result<Option<PathBuf>> {
        self.core.map(CsvCore::finish).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_rows(rows: &[&[Option<&str>]]) -> String {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        let mut core = CsvCore::create(&path).unwrap();
        core.write_headers(&["id".to_string(), "note".to_string()])
            .unwrap();
        for row in rows {
            let buf = core.row_buffer();
            buf.reset(row.len());
            for (i, v) in row.iter().enumerate() {
                match v {
                    Some(v) => buf.set(i, v),
                    None => buf.set_null(i),
                }
            }
            core.write_buffered_row().unwrap();
        }
        let path = core.finish().unwrap();
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_plain_fields_are_unquoted() {
        let out = write_rows(&[&[Some("1"), Some("hello")]]);
        assert_eq!(out, "id,note\n1,hello\n");
    }

    #[test]
    fn test_quotes_only_when_needed() {
        let out = write_rows(&[
            &[Some("1"), Some("a,b")],
            &[Some("2"), Some("say \"hi\"")],
            &[Some("3"), Some("line1\nline2")],
            &[Some("4"), Some("cr\rhere")],
        ]);
        assert_eq!(
            out,
            "id,note\n1,\"a,b\"\n2,\"say \"\"hi\"\"\"\n3,\"line1\nline2\"\n4,\"cr\rhere\"\n"
        );
    }

    #[test]
    fn test_null_and_empty_render_the_same() {
        let out = write_rows(&[&[Some("1"), None], &[Some("2"), Some("")]]);
        assert_eq!(out, "id,note\n1,\n2,\n");
    }

    #[test]
    fn test_rows_written_excludes_header() {
        let dir = TempDir::new().unwrap();
        let mut core = CsvCore::create(&dir.path().join("x.csv")).unwrap();
        core.write_headers(&["a".to_string()]).unwrap();
        assert_eq!(core.rows_written(), 0);
        core.row_buffer().set(0, "v");
        core.write_buffered_row().unwrap();
        assert_eq!(core.rows_written(), 1);
    }

    #[test]
    fn test_periodic_flush_reaches_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.csv");
        let mut core = CsvCore::create(&path).unwrap();
        core.write_headers(&["a".to_string()]).unwrap();
        for i in 0..FLUSH_INTERVAL {
            core.row_buffer().set(0, &i.to_string());
            core.write_buffered_row().unwrap();
        }

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk.lines().count() as u64, FLUSH_INTERVAL + 1);
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.csv");
        let core = CsvCore::create(&path).unwrap();
        assert!(path.exists());
        core.discard().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_output_remove_keeps_file_with_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.csv");
        let mut output = CsvOutput::create(&path).unwrap();
        output.write_headers(&["a".to_string()]).unwrap();
        output.row_buffer().unwrap().set(0, "v");
        output.write_buffered_row().unwrap();

        assert!(!output.remove().unwrap());
        assert_eq!(output.rows_written(), 1);
        assert_eq!(output.finish().unwrap(), Some(path));
    }

    #[test]
    fn test_output_after_abort_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.csv");
        let mut output = CsvOutput::create(&path).unwrap();
        output.write_headers(&["a".to_string()]).unwrap();
        output.abort().unwrap();

        assert!(!path.exists());
        assert!(output.row_buffer().is_none());
        assert!(output.write_buffered_row().is_err());
        assert!(!output.remove().unwrap());
        assert_eq!(output.finish().unwrap(), None);
    }
}
