use std::{
    fs::{read_to_string, File},
    io::{self, Write},
    path::PathBuf,
};

use crate::object_id::ObjectId;

/// The ref every operation moves: the most recent commit.
pub const HEAD: &str = "head";

/// Named refs: a mapping from ref name to commit hash, one file per
/// ref (`<name>.txt` under the repository root). The core only ever
/// uses [`HEAD`], but nothing here assumes there is exactly one ref.
///
/// An existing-but-empty ref file means "no commit yet"; that is how a
/// freshly initialized repository looks.
#[derive(Debug, Clone)]
pub struct Refs {
    root: PathBuf,
}

impl Refs {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.txt"))
    }

    pub fn exists(&self, name: &str) -> Result<bool, io::Error> {
        self.ref_path(name).try_exists()
    }

    /// Reads a ref. `Ok(None)` means the ref file is empty, i.e. the
    /// ref has never been set.
    pub fn read(&self, name: &str) -> Result<Option<ObjectId>, io::Error> {
        let content = read_to_string(self.ref_path(name))?;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        ObjectId::from_hex(trimmed).map(Some).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("ref {name} holds a bad hash: {trimmed}"),
            )
        })
    }

    pub fn write(&self, name: &str, id: ObjectId) -> Result<(), io::Error> {
        let mut file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.ref_path(name))?;
        writeln!(file, "{}", id)?;
        Ok(())
    }

    /// Creates an empty ref file if one does not already exist.
    pub fn create_empty(&self, name: &str) -> Result<(), io::Error> {
        if !self.exists(name)? {
            File::options()
                .create(true)
                .write(true)
                .open(self.ref_path(name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ref_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let refs = Refs::new(dir.path().into());
        refs.create_empty(HEAD).unwrap();
        assert!(refs.exists(HEAD).unwrap());
        assert_eq!(refs.read(HEAD).unwrap(), None);
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let refs = Refs::new(dir.path().into());
        let id: ObjectId = b"a commit".as_slice().into();
        refs.write(HEAD, id).unwrap();
        assert_eq!(refs.read(HEAD).unwrap(), Some(id));
    }

    #[test]
    fn refs_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let refs = Refs::new(dir.path().into());
        let a: ObjectId = b"commit a".as_slice().into();
        let b: ObjectId = b"commit b".as_slice().into();
        refs.write(HEAD, a).unwrap();
        refs.write("release", b).unwrap();
        assert_eq!(refs.read(HEAD).unwrap(), Some(a));
        assert_eq!(refs.read("release").unwrap(), Some(b));
    }
}
