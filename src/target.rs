//! Output descriptors for tasks.
//!
//! A task is considered complete exactly when its [`Target`] reports
//! existence, which is what makes re-runs of a finished pipeline free. The
//! trait is deliberately small so that tests can substitute an in-memory
//! backend for the filesystem.

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;

/// Locator for the single output of a task.
///
/// An output either exists in full or not at all. The write side hands out a
/// [`TargetWriter`] which publishes the data only on [`TargetWriter::commit`],
/// so a task action that fails midway leaves the target absent and the task
/// retryable.
pub trait Target: Send + Sync {
    /// Human-readable locator used in logs and error messages.
    fn locator(&self) -> String;

    /// Whether the output has been produced by a completed task.
    fn exists(&self) -> bool;

    fn open_read(&self) -> io::Result<Box<dyn BufRead + Send>>;

    fn open_write(&self) -> io::Result<Box<dyn TargetWriter>>;
}

/// Write half of a [`Target`].
///
/// Dropping the writer without calling `commit` discards everything written
/// so far and leaves the target in its previous state.
pub trait TargetWriter: Write + Send {
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// A [`Target`] backed by a file on disk.
///
/// Writes go to a temporary file in the destination directory and are moved
/// into place atomically on commit, so a crashed run never leaves a partially
/// written output behind.
#[derive(Debug, Clone)]
pub struct FileTarget {
    path: Utf8PathBuf,
}

impl FileTarget {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Target for FileTarget {
    fn locator(&self) -> String {
        self.path.to_string()
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn open_read(&self) -> io::Result<Box<dyn BufRead + Send>> {
        let file = fs::File::open(&self.path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self) -> io::Result<Box<dyn TargetWriter>> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let staging = NamedTempFile::new_in(&dir)?;
        Ok(Box::new(FileWriter {
            staging,
            dest: self.path.clone(),
        }))
    }
}

struct FileWriter {
    staging: NamedTempFile,
    dest: Utf8PathBuf,
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.staging.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.staging.flush()
    }
}

impl TargetWriter for FileWriter {
    fn commit(self: Box<Self>) -> io::Result<()> {
        let mut this = *self;
        this.staging.flush()?;
        this.staging
            .persist(this.dest.as_std_path())
            .map_err(|err| err.error)?;
        Ok(())
    }
}

/// A [`Target`] held entirely in memory, shared between clones.
///
/// Used by the scheduler and stage tests in place of [`FileTarget`].
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    name: String,
    cell: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell: Arc::new(Mutex::new(None)),
        }
    }

    /// A target whose output already exists, as if a prior run produced it.
    pub fn seeded(name: impl Into<String>, contents: &str) -> Self {
        Self {
            name: name.into(),
            cell: Arc::new(Mutex::new(Some(contents.as_bytes().to_vec()))),
        }
    }

    /// The committed contents, if any.
    pub fn contents(&self) -> Option<String> {
        let guard = self.cell.lock().unwrap();
        guard
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Target for MemoryTarget {
    fn locator(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn exists(&self) -> bool {
        self.cell.lock().unwrap().is_some()
    }

    fn open_read(&self) -> io::Result<Box<dyn BufRead + Send>> {
        let guard = self.cell.lock().unwrap();
        match guard.as_ref() {
            Some(bytes) => Ok(Box::new(io::Cursor::new(bytes.clone()))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("target '{}' has no contents", self.name),
            )),
        }
    }

    fn open_write(&self) -> io::Result<Box<dyn TargetWriter>> {
        Ok(Box::new(MemoryWriter {
            buffer: Vec::new(),
            cell: self.cell.clone(),
        }))
    }
}

struct MemoryWriter {
    buffer: Vec<u8>,
    cell: Arc<Mutex<Option<Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl TargetWriter for MemoryWriter {
    fn commit(self: Box<Self>) -> io::Result<()> {
        let this = *self;
        *this.cell.lock().unwrap() = Some(this.buffer);
        Ok(())
    }
}
