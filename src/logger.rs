use log::{error, info, warn};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::VnaError;

/// Buffered JSON-lines session log.
///
/// Entries are appended to `file_path` once `buffer_size` of them have
/// accumulated, and on drop. With `final_format_json` the file is rewritten
/// as a single pretty-printed JSON array when the logger is finalized.
#[derive(Debug)]
pub struct Logger<T>
where
    T: Serialize + DeserializeOwned,
{
    buffer: Vec<T>,
    buffer_size: usize,
    file_path: PathBuf,
    final_format_json: bool,
    finalized: bool,
    flush_failures: usize,
    max_flush_failures: usize,
}

impl<T> Logger<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new<P: Into<PathBuf>>(
        file_path: P,
        buffer_size: usize,
        final_format_json: bool,
    ) -> Self {
        let mut path = file_path.into();
        let extension = if final_format_json { "json" } else { "jsonl" };
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            path.set_extension(extension);
        }

        Self {
            buffer: Vec::with_capacity(buffer_size),
            buffer_size: buffer_size.max(1),
            file_path: path,
            final_format_json,
            finalized: false,
            flush_failures: 0,
            max_flush_failures: 10,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn add(&mut self, entry: T) -> Result<(), VnaError> {
        self.buffer.push(entry);
        if self.buffer.len() >= self.buffer_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Append buffered entries to the file.
    ///
    /// A failed write keeps the entries buffered and only becomes an error
    /// after `max_flush_failures` consecutive failures.
    pub fn flush(&mut self) -> Result<(), VnaError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        match self.write_buffer() {
            Ok(()) => {
                self.flush_failures = 0;
                self.buffer.clear();
                Ok(())
            }
            Err(e) => {
                self.flush_failures += 1;
                error!(
                    "Session log flush failure {}/{}: {}",
                    self.flush_failures, self.max_flush_failures, e
                );
                if self.flush_failures >= self.max_flush_failures {
                    return Err(VnaError::Io {
                        source: std::io::Error::other(e.to_string()),
                        context: format!(
                            "{} consecutive flush failures for {}",
                            self.flush_failures,
                            self.file_path.display()
                        ),
                    });
                }
                if self.flush_failures % 3 == 0 {
                    warn!("Session log keeps failing to flush, entries are being held in memory");
                }
                Ok(())
            }
        }
    }

    fn write_buffer(&self) -> Result<(), VnaError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .map_err(|source| VnaError::Io {
                source,
                context: format!("Failed to open {}", self.file_path.display()),
            })?;

        let mut writer = BufWriter::new(file);
        for entry in &self.buffer {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Flush, then rewrite the JSONL file as a JSON array if requested.
    pub fn finalize(&mut self) -> Result<(), VnaError> {
        self.flush()?;
        if !self.final_format_json || self.finalized || !self.file_path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&self.file_path).map_err(|source| VnaError::Io {
            source,
            context: format!("Failed to read {}", self.file_path.display()),
        })?;

        let entries = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str::<T>(line))
            .collect::<Result<Vec<T>, _>>()?;

        std::fs::write(&self.file_path, serde_json::to_string_pretty(&entries)?).map_err(
            |source| VnaError::Io {
                source,
                context: format!("Failed to write {}", self.file_path.display()),
            },
        )?;
        self.finalized = true;

        info!("Wrote {} session log entries to {}", entries.len(), self.file_path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl<T> Drop for Logger<T>
where
    T: Serialize + DeserializeOwned,
{
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            error!("Session log lost entries: {e}");
        }
    }
}
