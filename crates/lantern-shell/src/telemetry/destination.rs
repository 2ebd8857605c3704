//! Sinks that receive formatted log lines.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Receives fully formatted lines from the pipeline.
///
/// Calls are serialised by the pipeline, so implementations need no locking
/// of their own.
pub trait LogDestination: Send {
    /// Writes one complete line, including its trailing newline.
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Flushes buffered output.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Human-readable name used when reporting write failures.
    fn describe(&self) -> String;
}

/// Size and retention limits for a rotating file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size in bytes the active file may reach before rotating.
    pub max_bytes: u64,
    /// Number of numbered files kept next to the active file.
    pub max_files: usize,
    /// Rotates a non-empty pre-existing file when the destination opens.
    pub rotate_on_open: bool,
}

/// File destination that rotates `name.log` into `name.log.1` .. `name.log.N`.
#[derive(Debug)]
pub struct RotatingFileDestination {
    path: PathBuf,
    policy: RotationPolicy,
    file: Option<File>,
    written: u64,
}

impl RotatingFileDestination {
    /// Opens (creating when needed) the active file at `path`.
    pub fn open(path: impl Into<PathBuf>, policy: RotationPolicy) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut destination = Self {
            path,
            policy,
            file: None,
            written: 0,
        };
        let existing = match fs::metadata(&destination.path) {
            Ok(metadata) => metadata.len(),
            Err(error) if error.kind() == io::ErrorKind::NotFound => 0,
            Err(error) => return Err(error),
        };
        if policy.rotate_on_open && existing > 0 {
            destination.rotate()?;
        } else {
            destination.written = existing;
            destination.reopen()?;
        }
        Ok(destination)
    }

    /// Path of the active file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the `index`th rotated file.
    #[must_use]
    pub fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn reopen(&mut self) -> io::Result<&mut File> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(self.file.insert(file))
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.policy.max_files == 0 {
            remove_if_present(&self.path)?;
        } else {
            remove_if_present(&self.rotated_path(self.policy.max_files))?;
            for index in (1..self.policy.max_files).rev() {
                rename_if_present(&self.rotated_path(index), &self.rotated_path(index + 1))?;
            }
            rename_if_present(&self.path, &self.rotated_path(1))?;
        }

        self.written = 0;
        self.reopen()?;
        Ok(())
    }
}

impl LogDestination for RotatingFileDestination {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let len = line.len() as u64;
        if self.written > 0 && self.written.saturating_add(len) > self.policy.max_bytes {
            self.rotate()?;
        }
        let file = match self.file.take() {
            Some(file) => self.file.insert(file),
            None => self.reopen()?,
        };
        file.write_all(line.as_bytes())?;
        self.written = self.written.saturating_add(len);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}

fn rename_if_present(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error),
        _ => Ok(()),
    }
}
