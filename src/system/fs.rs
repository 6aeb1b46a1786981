//! File System Utilities
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::system::Error;

/// Convenience wrapper for std::fs::read_to_string
pub fn read_file<P>(path: P) -> Result<String, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|e| Error::ReadFile(path.display().to_string(), e))
}

/// Wrapper for File::open
pub fn open<P>(path: P) -> Result<File, Error>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    File::open(path).map_err(|e| Error::ReadFile(path.display().to_string(), e))
}

/// Convenience wrapper for std::fs::write
pub fn write_file<P, S>(path: P, content: S) -> Result<(), Error>
where
    P: AsRef<Path>,
    S: AsRef<[u8]>,
{
    let path = path.as_ref();
    std::fs::write(path, content).map_err(|e| Error::WriteFile(path.display().to_string(), e))
}

pub trait PathExt {
    /// Wrapper for std::path::canonicalize, but maps the error to our own
    fn canonicalize2(&self) -> Result<PathBuf, Error>;

    /// Get the relative path from base to self. Base must be an absolute path.
    fn from_base<P>(&self, base: P) -> Result<PathBuf, Error>
    where
        P: AsRef<Path>;
}

impl<P> PathExt for P
where
    P: AsRef<Path>,
{
    fn canonicalize2(&self) -> Result<PathBuf, Error> {
        dunce::canonicalize(self)
            .map_err(|x| Error::InvalidPath(self.as_ref().display().to_string(), x))
    }

    fn from_base<PBase>(&self, base: PBase) -> Result<PathBuf, Error>
    where
        PBase: AsRef<Path>,
    {
        let path = self.as_ref();
        let base = base.as_ref();
        Ok(pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf()))
    }
}

/// Normalise a path for use as an output identifier: `/` `-` `.` all become `_`.
pub fn normalise_file_id<P>(path: P) -> String
where
    P: AsRef<Path>,
{
    path.as_ref()
        .to_string_lossy()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            '-' => '_',
            '.' => '_',
            other => other,
        })
        .collect()
}
