use std::{
    collections::BTreeMap,
    fs::{read_to_string, File},
    io::{self, Write},
    path::Path,
};

use crate::object_id::ObjectId;

/// The staging index: a mutable, path-keyed record of pending changes,
/// accumulated by `add` and consumed by the next commit.
///
/// Persisted as `index.txt`, one `path hash` line per entry, sorted by
/// path. Paths are exact string keys; callers are expected to
/// canonicalize before staging so the same file never appears twice
/// under different spellings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: BTreeMap<String, ObjectId>,
}

impl Index {
    /// Loads the index file, or `None` if it does not exist. A missing
    /// index means the repository was never initialized (or was
    /// tampered with), which callers surface as their own error.
    pub fn load(path: &Path) -> Result<Option<Self>, io::Error> {
        if !path.try_exists()? {
            return Ok(None);
        }
        let mut entries = BTreeMap::new();
        for line in read_to_string(path)?.lines() {
            if line.is_empty() {
                continue;
            }
            // The hash is the last space-separated field, so paths
            // containing spaces survive the round trip.
            let (p, hash) = line.rsplit_once(' ').ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("bad index line: {line}"))
            })?;
            let id = ObjectId::from_hex(hash).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("bad index hash: {hash}"))
            })?;
            entries.insert(p.to_string(), id);
        }
        Ok(Some(Index { entries }))
    }

    pub fn save(&self, path: &Path) -> Result<(), io::Error> {
        let mut file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        for (p, id) in &self.entries {
            writeln!(file, "{} {}", p, id)?;
        }
        Ok(())
    }

    /// Inserts or overwrites the entry for `path`. Returns `false` when
    /// the entry already held the same hash, so restaging unchanged
    /// content can skip the write-back.
    pub fn upsert(&mut self, path: String, id: ObjectId) -> bool {
        if self.entries.get(&path) == Some(&id) {
            return false;
        }
        self.entries.insert(path, id);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ObjectId)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(content: &str) -> ObjectId {
        content.as_bytes().into()
    }

    #[test]
    fn load_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        let mut index = Index::default();
        index.upsert("a.txt".into(), blob("a"));
        index.upsert("with space.txt".into(), blob("b"));
        index.save(&path).unwrap();
        let loaded = Index::load(&path).unwrap().unwrap();
        assert_eq!(index, loaded);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Index::load(&dir.path().join("index.txt")).unwrap().is_none());
    }

    #[test]
    fn upsert_is_idempotent_for_unchanged_content() {
        let mut index = Index::default();
        assert!(index.upsert("a.txt".into(), blob("hello")));
        assert!(!index.upsert("a.txt".into(), blob("hello")));
        assert!(index.upsert("a.txt".into(), blob("changed")));
        assert_eq!(index.entries().count(), 1);
    }

    #[test]
    fn clear_empties_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        let mut index = Index::default();
        index.upsert("a.txt".into(), blob("a"));
        index.clear();
        index.save(&path).unwrap();
        assert!(Index::load(&path).unwrap().unwrap().is_empty());
    }
}
