use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::object_id::ObjectId;

/// Schema version carried by every stored record.
pub const RECORD_VERSION: u32 = 1;

/// An immutable snapshot mapping tracked paths to blob hashes.
///
/// Entries live in a [`BTreeMap`], so serialization always walks paths
/// in lexicographic order and logically-identical trees encode to
/// identical bytes. That determinism is what makes tree deduplication
/// work; it is a hard requirement, not an optimization.
#[derive(PartialEq, Eq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tree {
    pub entries: BTreeMap<String, ObjectId>,
}

/// An immutable record linking a tree, an optional parent commit, and
/// metadata. The first commit of a repository has no parent.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub tree: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ObjectId>,
    pub date: DateTime<Utc>,
    pub message: String,
}

/// A stored record. Trees and commits share one address space with
/// blobs, so each record is tagged with its kind and schema version;
/// readers never infer the kind from the payload's shape.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Tree { version: u32, tree: Tree },
    Commit { version: u32, commit: Commit },
}

impl Record {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Returns the tree payload, or `None` if this record is a commit.
    pub fn into_tree(self) -> Option<Tree> {
        match self {
            Record::Tree { tree, .. } => Some(tree),
            Record::Commit { .. } => None,
        }
    }

    /// Returns the commit payload, or `None` if this record is a tree.
    pub fn into_commit(self) -> Option<Commit> {
        match self {
            Record::Commit { commit, .. } => Some(commit),
            Record::Tree { .. } => None,
        }
    }
}

impl From<Tree> for Record {
    fn from(tree: Tree) -> Self {
        Record::Tree {
            version: RECORD_VERSION,
            tree,
        }
    }
}

impl From<Commit> for Record {
    fn from(commit: Commit) -> Self {
        Record::Commit {
            version: RECORD_VERSION,
            commit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{in_memory::InMemoryObjectStore, ObjectStore};

    fn blob(content: &str) -> ObjectId {
        content.as_bytes().into()
    }

    #[test]
    fn tree_serialization_is_order_independent() {
        let mut forward = Tree::default();
        forward.entries.insert("a.txt".into(), blob("a"));
        forward.entries.insert("b.txt".into(), blob("b"));
        forward.entries.insert("sub/c.txt".into(), blob("c"));

        let mut backward = Tree::default();
        backward.entries.insert("sub/c.txt".into(), blob("c"));
        backward.entries.insert("b.txt".into(), blob("b"));
        backward.entries.insert("a.txt".into(), blob("a"));

        let fwd = Record::from(forward).encode().unwrap();
        let bwd = Record::from(backward).encode().unwrap();
        assert_eq!(fwd, bwd);
        assert_eq!(ObjectId::from(&fwd), ObjectId::from(&bwd));
    }

    #[test]
    fn unchanged_tree_is_stored_once() {
        let mut store = InMemoryObjectStore::new();
        let mut tree = Tree::default();
        tree.entries.insert("a.txt".into(), blob("hello"));
        let first = store
            .insert(&Record::from(tree.clone()).encode().unwrap())
            .unwrap();
        let second = store.insert(&Record::from(tree).encode().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn commit_round_trip() {
        let commit = Commit {
            tree: blob("tree bytes"),
            parent: Some(blob("parent bytes")),
            date: Utc::now(),
            message: "first".into(),
        };
        let bytes = Record::from(commit.clone()).encode().unwrap();
        let decoded = Record::decode(&bytes).unwrap().into_commit().unwrap();
        assert_eq!(commit, decoded);
    }

    #[test]
    fn first_commit_omits_parent() {
        let commit = Commit {
            tree: blob("tree bytes"),
            parent: None,
            date: Utc::now(),
            message: "first".into(),
        };
        let bytes = Record::from(commit).encode().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("parent"));
    }

    #[test]
    fn kind_is_tagged_not_guessed() {
        let tree = Tree::default();
        let bytes = Record::from(tree).encode().unwrap();
        let record = Record::decode(&bytes).unwrap();
        assert!(record.clone().into_commit().is_none());
        assert!(record.into_tree().is_some());
    }
}
