//! Filesystem collaborator: the storage root and the known-files registry
// (c) 2025 Ross Younger

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Local filesystem failures.
///
/// Converted at the handler boundary into a remote Error packet (server)
/// or a user-facing message (client); never closes a channel.
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum StorageError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("storage path {} is not writable", .0.display())]
    NotWritable(PathBuf),
    #[error("invalid file name {0:?}")]
    InvalidName(String),
    #[error("{name} is not a regular file")]
    NotAFile { name: String },
    #[error("{name} is too large to transfer ({size} bytes)")]
    TooLarge { name: String, size: u64 },
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reduces a caller- or peer-supplied name to its final path component.
///
/// Every name that crosses the storage boundary goes through here, in both
/// directions on both peers, so a name like `../../etc/passwd` cannot
/// escape the storage root.
pub fn base_name(name: &str) -> Result<&str, StorageError> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidName(name.to_string()))
}

/// A directory of regular files addressed by base name.
///
/// This is the whole filesystem surface the protocol engine needs:
/// create, open, delete and enumerate, plus the startup probes.
#[derive(Clone, Debug)]
pub struct StorageDir {
    root: PathBuf,
}

impl StorageDir {
    /// Opens a storage root. Fails unless `root` is a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StorageError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    /// The root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(base_name(name)?))
    }

    /// Creates (or truncates) a file for writing.
    pub fn create(&self, name: &str) -> Result<File, StorageError> {
        let path = self.entry(name)?;
        File::create(&path).map_err(|source| StorageError::Io { path, source })
    }

    /// Opens a regular file for reading, returning it with its size.
    ///
    /// Directories and anything larger than the wire's 32-bit size field
    /// are refused.
    pub fn open(&self, name: &str) -> Result<(File, u32), StorageError> {
        let path = self.entry(name)?;
        let file = File::open(&path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        let meta = file
            .metadata()
            .map_err(|source| StorageError::Io { path, source })?;
        if !meta.is_file() {
            return Err(StorageError::NotAFile {
                name: name.to_string(),
            });
        }
        let size = u32::try_from(meta.len()).map_err(|_| StorageError::TooLarge {
            name: name.to_string(),
            size: meta.len(),
        })?;
        Ok((file, size))
    }

    /// Deletes a file. Used to discard partial transfers.
    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.entry(name)?;
        fs::remove_file(&path).map_err(|source| StorageError::Io { path, source })
    }

    /// Names of the regular files currently present.
    pub fn enumerate(&self) -> Result<Vec<String>, StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.root.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Startup probe: storage must accept a write and a delete.
    /// The only portable way to verify that is to do it.
    pub fn probe_writable(&self) -> Result<(), StorageError> {
        let path = self.root.join(".dcp-write-probe");
        fs::write(&path, b"probe").map_err(|_| StorageError::NotWritable(self.root.clone()))?;
        fs::remove_file(&path).map_err(|_| StorageError::NotWritable(self.root.clone()))
    }
}

/// The server's in-memory record of the file names currently present in
/// storage.
///
/// Seeded once at startup; a name is added only after its file has been
/// fully and successfully received. Partial transfers never register.
#[derive(Debug, Default)]
pub struct KnownFiles {
    names: HashSet<String>,
}

impl KnownFiles {
    /// Seeds the registry, normally from [`StorageDir::enumerate`].
    pub fn seed<I: IntoIterator<Item = String>>(names: I) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }

    /// Whether `name` is available to GET.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Registers a fully received file.
    pub fn insert(&mut self, name: String) {
        let _ = self.names.insert(name);
    }

    /// Number of known files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when no files are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
