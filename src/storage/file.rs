use std::fmt::Write as _;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::StorageError;
use super::Storage;

/// A storage backend keeping one file per key in a directory.
///
/// Independent processes opening the same directory share their settings.
/// Each `set` writes a temporary file next to the target and renames it into
/// place.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {

    /// Open a storage directory, creating it if it does not exist.
    pub fn open<P>(root: P) -> Result<FileStorage, StorageError> where P: AsRef<Path> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(FileStorage { root })
    }

    /// The directory holding the stored entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(file_name(key))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(ref error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut file = NamedTempFile::new_in(&self.root)?;
        file.write_all(value.as_bytes())?;
        file.persist(self.path(key)).map_err(|error| error.error)?;
        Ok(())
    }
}

/// Maps a key to a file name: bytes outside `[A-Za-z0-9._-]`, and a leading
/// dot, are written as `%XX`.
fn file_name(key: &str) -> String {
    let mut name = String::with_capacity(key.len());
    for (i, byte) in key.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric()
                 || byte == b'-'
                 || byte == b'_'
                 || (byte == b'.' && i > 0);
        if plain {
            name.push(byte as char);
        } else {
            let _ = write!(name, "%{:02X}", byte);
        }
    }
    name
}

#[cfg(test)]
mod test {

    use super::{file_name, FileStorage};
    use crate::Storage;

    #[test]
    fn check_file_names() {
        assert_eq!("geometry.clippingStartAngle", file_name("geometry.clippingStartAngle"));
        assert_eq!("ui.theme.time", file_name("ui.theme.time"));
        assert_eq!("a%2Fb", file_name("a/b"));
        assert_eq!("%2E.", file_name(".."));
        assert_eq!("%C3%A9", file_name("é"));
    }

    #[test]
    fn check_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        assert_eq!(None, storage.get("server.url").unwrap());
        storage.set("server.url", "\"http://localhost:5454\"").unwrap();
        storage.set("server.url.time", "1000").unwrap();

        assert_eq!(Some("\"http://localhost:5454\"".to_string()), storage.get("server.url").unwrap());
        assert_eq!(Some("1000".to_string()), storage.get("server.url.time").unwrap());
    }

    #[test]
    fn check_reopen_sees_entries() {
        let dir = tempfile::tempdir().unwrap();
        FileStorage::open(dir.path()).unwrap().set("../escape", "1").unwrap();

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(Some("1".to_string()), reopened.get("../escape").unwrap());
        assert_eq!(1, std::fs::read_dir(dir.path()).unwrap().count());
    }

    #[test]
    fn check_open_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = FileStorage::open(&nested).unwrap();
        assert_eq!(nested.as_path(), storage.root());
        assert!(nested.is_dir());
    }
}
