//! Filesystem access used by the source digester.
//!
//! The digester never touches `std::fs` directly. [`OsFilesystem`] is used in production;
//! [`MemoryFilesystem`] backs unit tests and lets a test control the order in which a
//! directory lists its children.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Anything else (sockets, fifos, dangling or unfollowed symlinks)
    Other,
}

/// Minimal read-only filesystem interface.
pub trait Filesystem: Send + Sync {
    /// Returns the kind of the entry at `path`, following symlinks, or `None` if it does not
    /// exist.
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>>;

    /// Returns the kind of the entry at `path` without following symlinks.
    ///
    /// Used inside directory walks. Defaults to [`entry_kind`](Self::entry_kind).
    fn entry_kind_no_follow(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        self.entry_kind(path)
    }

    /// Reads the full contents of a regular file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Lists the immediate children of a directory as full paths, in no particular order.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

fn kind_of(file_type: std::fs::FileType) -> EntryKind {
    if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::Other
    }
}

impl Filesystem for OsFilesystem {
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        match std::fs::metadata(path) {
            Ok(meta) => Ok(Some(kind_of(meta.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn entry_kind_no_follow(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        match std::fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(kind_of(meta.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        std::fs::read_dir(path)?.map(|entry| entry.map(|e| e.path())).collect()
    }
}

#[derive(Debug, Clone)]
enum MemoryEntry {
    File(Vec<u8>),
    Directory,
    Unreadable,
    Special,
}

/// In-memory [`Filesystem`] for tests.
///
/// Parent directories are created implicitly. Directory listings are returned in reverse
/// lexicographic order unless [`list_in_order`](Self::list_in_order) is called, so tests
/// exercise order-independence by default.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    entries: BTreeMap<PathBuf, MemoryEntry>,
    forward_listing: bool,
}

impl MemoryFilesystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists directory children in lexicographic order instead of reverse order.
    #[must_use]
    pub fn list_in_order(mut self) -> Self {
        self.forward_listing = true;
        self
    }

    /// Adds or replaces a file, creating parent directories.
    pub fn add_file(&mut self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        self.add_parents(path);
        self.entries.insert(path.to_path_buf(), MemoryEntry::File(contents.into()));
    }

    /// Adds an empty directory, creating parent directories.
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.add_parents(path);
        self.entries.insert(path.to_path_buf(), MemoryEntry::Directory);
    }

    /// Adds a file that exists but fails every read.
    pub fn add_unreadable(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.add_parents(path);
        self.entries.insert(path.to_path_buf(), MemoryEntry::Unreadable);
    }

    /// Adds an entry that is neither a file nor a directory, such as a fifo.
    pub fn add_special(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.add_parents(path);
        self.entries.insert(path.to_path_buf(), MemoryEntry::Special);
    }

    fn add_parents(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.entries.entry(ancestor.to_path_buf()).or_insert(MemoryEntry::Directory);
        }
    }
}

impl Filesystem for MemoryFilesystem {
    fn entry_kind(&self, path: &Path) -> io::Result<Option<EntryKind>> {
        Ok(self.entries.get(path).map(|entry| match entry {
            MemoryEntry::File(_) | MemoryEntry::Unreadable => EntryKind::File,
            MemoryEntry::Directory => EntryKind::Directory,
            MemoryEntry::Special => EntryKind::Other,
        }))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.entries.get(path) {
            Some(MemoryEntry::File(contents)) => Ok(contents.clone()),
            Some(MemoryEntry::Unreadable) => {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"))
            }
            Some(MemoryEntry::Directory) => {
                Err(io::Error::new(io::ErrorKind::InvalidInput, "is a directory"))
            }
            Some(MemoryEntry::Special) => {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "read would block"))
            }
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such file")),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        match self.entries.get(path) {
            Some(MemoryEntry::Directory) => {}
            Some(_) => return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a directory")),
            None => return Err(io::Error::new(io::ErrorKind::NotFound, "no such directory")),
        }

        let mut children: Vec<PathBuf> =
            self.entries.keys().filter(|p| p.parent() == Some(path)).cloned().collect();
        if !self.forward_listing {
            children.reverse();
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_parents_are_directories() {
        let mut fs = MemoryFilesystem::new();
        fs.add_file("/ws/pkg/sub/a.txt", "a");

        assert_eq!(fs.entry_kind(Path::new("/ws/pkg")).unwrap(), Some(EntryKind::Directory));
        assert_eq!(fs.entry_kind(Path::new("/ws/pkg/sub/a.txt")).unwrap(), Some(EntryKind::File));
        assert_eq!(fs.entry_kind(Path::new("/ws/missing")).unwrap(), None);
    }

    #[test]
    fn test_memory_listing_order() {
        let mut fs = MemoryFilesystem::new();
        fs.add_file("/d/a", "1");
        fs.add_file("/d/b", "2");
        fs.add_file("/d/sub/c", "3");

        let reversed = fs.read_dir(Path::new("/d")).unwrap();
        assert_eq!(reversed, vec![PathBuf::from("/d/sub"), PathBuf::from("/d/b"), PathBuf::from("/d/a")]);

        let forward = fs.clone().list_in_order().read_dir(Path::new("/d")).unwrap();
        assert_eq!(forward, vec![PathBuf::from("/d/a"), PathBuf::from("/d/b"), PathBuf::from("/d/sub")]);
    }

    #[test]
    fn test_os_filesystem_missing_path() {
        let temp = tempfile::tempdir().unwrap();
        let fs = OsFilesystem;
        assert_eq!(fs.entry_kind(&temp.path().join("nope")).unwrap(), None);
        assert_eq!(fs.entry_kind(temp.path()).unwrap(), Some(EntryKind::Directory));
    }
}
