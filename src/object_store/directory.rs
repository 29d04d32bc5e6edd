use std::{
    fs::{create_dir_all, File},
    io::{ErrorKind, Read, Write},
    path::PathBuf,
};

use crate::object_id::ObjectId;

use super::ObjectStore;

/// A persistent [`ObjectStore`] stored in a directory, using the first
/// two hexadecimal characters of the [`ObjectId`] as a subdirectory and
/// the remaining characters as the file name, to bound the fan-out of
/// any one directory.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        if !root.try_exists()? {
            log::info!("creating directory store root: {:?}", root);
            create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    fn object_path(&self, id: ObjectId) -> PathBuf {
        let hex = id.to_string();
        let (subdir, filename) = hex.split_at(2);
        self.root.join(subdir).join(filename)
    }
}

impl ObjectStore for DirectoryObjectStore {
    type Error = std::io::Error;

    fn has(&self, id: ObjectId) -> Result<bool, Self::Error> {
        self.object_path(id).try_exists()
    }

    fn read(&self, id: ObjectId) -> Result<Option<Vec<u8>>, Self::Error> {
        log::info!("reading {} from {:?}", id, self.root);
        match File::options().read(true).open(self.object_path(id)) {
            Ok(mut f) => {
                let mut v = Vec::new();
                f.read_to_end(&mut v)?;
                Ok(Some(v))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn insert(&mut self, object: &[u8]) -> Result<ObjectId, Self::Error> {
        let id: ObjectId = object.into();
        let path = self.object_path(id);
        // Objects are write-once: re-inserting existing content is a no-op.
        if path.try_exists()? {
            log::info!("{} already stored, skipping write", id);
            return Ok(id);
        }
        log::info!("inserting {} into {:?}", id, self.root);
        let subdir = path.parent().unwrap_or(&self.root);
        if !subdir.try_exists()? {
            create_dir_all(subdir)?;
        }
        let mut f = File::options().create(true).write(true).open(path)?;
        f.write_all(object)?;
        Ok(id)
    }
}
