use std::{
    collections::BTreeSet,
    fs::{create_dir_all, read_dir, remove_dir, remove_file, File},
    io::Write,
    path::{Component, Path, PathBuf},
};

use chrono::Utc;
use derive_more::From;

use crate::{
    history::{HistoryLog, LogEntry},
    index::Index,
    object_id::ObjectId,
    object_store::{directory::DirectoryObjectStore, ObjectStore},
    record::{Commit, Record, Tree},
    refs::{Refs, HEAD},
};

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Io(std::io::Error),
    #[from]
    Serde(serde_json::Error),
    /// The repository metadata directory does not exist.
    NotInitialized(PathBuf),
    /// The file given to `add` does not exist.
    SourceNotFound(PathBuf),
    /// The staging index file is missing entirely.
    NoIndex,
    /// A commit record referenced by head or by a checkout target is
    /// absent from the store.
    CommitNotFound(ObjectId),
    /// A commit references a tree absent from the store.
    TreeNotFound(ObjectId),
    /// A tree references a blob absent from the store.
    BlobNotFound { path: String, id: ObjectId },
    /// The stored record at this id is not a parsable commit.
    MalformedCommit(ObjectId),
    /// The stored record at this id is not a parsable tree.
    MalformedTree(ObjectId),
    /// A user-supplied hash string is not a valid object id.
    BadObjectId(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Serde(err) => write!(f, "serialization error: {err}"),
            Error::NotInitialized(root) => {
                write!(f, "repository {} is not initialized", root.display())
            }
            Error::SourceNotFound(path) => {
                write!(f, "no such file to add: {}", path.display())
            }
            Error::NoIndex => write!(f, "staging index file is missing"),
            Error::CommitNotFound(id) => write!(f, "commit not found: {id}"),
            Error::TreeNotFound(id) => write!(f, "tree not found: {id}"),
            Error::BlobNotFound { path, id } => {
                write!(f, "blob for {path} not found: {id}")
            }
            Error::MalformedCommit(id) => write!(f, "object {id} is not a commit"),
            Error::MalformedTree(id) => write!(f, "object {id} is not a tree"),
            Error::BadObjectId(s) => write!(f, "not a valid object id: {s}"),
        }
    }
}

impl std::error::Error for Error {}

/// A repository rooted at a working directory, with all durable state
/// under a metadata directory inside it. Every operation goes through
/// an explicit `Repository` value; nothing is process-global.
pub struct Repository {
    worktree: PathBuf,
    root: PathBuf,
    refs: Refs,
    history: HistoryLog,
}

impl Repository {
    /// Initializes the metadata directory, the object store and the
    /// empty index, head and log files. Re-initializing an existing
    /// repository is a no-op; the returned flag is `true` only when
    /// the repository was freshly created.
    pub fn init(worktree: PathBuf, dir_name: &str) -> Result<(Self, bool), Error> {
        let root = worktree.join(dir_name);
        if root.try_exists()? {
            return Ok((Self::assemble(worktree, root), false));
        }
        create_dir_all(&root)?;
        DirectoryObjectStore::new(root.join("objects"))?;
        Index::default().save(&root.join("index.txt"))?;
        File::options()
            .create(true)
            .write(true)
            .open(root.join("log.txt"))?;
        let repo = Self::assemble(worktree, root);
        repo.refs.create_empty(HEAD)?;
        Ok((repo, true))
    }

    /// Opens an existing repository; fails if it was never initialized.
    pub fn open(worktree: PathBuf, dir_name: &str) -> Result<Self, Error> {
        let root = worktree.join(dir_name);
        if !root.try_exists()? {
            return Err(Error::NotInitialized(root));
        }
        Ok(Self::assemble(worktree, root))
    }

    fn assemble(worktree: PathBuf, root: PathBuf) -> Self {
        let refs = Refs::new(root.clone());
        let history = HistoryLog::new(root.join("log.txt"));
        Repository {
            worktree,
            root,
            refs,
            history,
        }
    }

    fn store(&self) -> Result<DirectoryObjectStore, Error> {
        Ok(DirectoryObjectStore::new(self.root.join("objects"))?)
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("index.txt")
    }

    fn load_index(&self) -> Result<Index, Error> {
        Index::load(&self.index_path())?.ok_or(Error::NoIndex)
    }

    /// The current head commit, or `None` before the first commit.
    pub fn head(&self) -> Result<Option<ObjectId>, Error> {
        Ok(self.refs.read(HEAD)?)
    }

    /// The staged entries, sorted by path.
    pub fn staged(&self) -> Result<Vec<(String, ObjectId)>, Error> {
        let index = self.load_index()?;
        Ok(index
            .entries()
            .map(|(p, id)| (p.clone(), *id))
            .collect())
    }

    /// Stages a file: stores its content as a blob and records the
    /// path → hash entry in the index. Restaging unchanged content is
    /// a no-op. Returns the blob's id.
    pub fn add(&self, path: &Path) -> Result<ObjectId, Error> {
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.worktree.join(path)
        };
        // Only regular files can be staged; a directory or a missing
        // path is the same "no such file" to the caller.
        if !full.is_file() {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        let key = self.worktree_key(path)?;
        let content = std::fs::read(&full)?;
        let mut store = self.store()?;
        let id = store.insert(&content)?;
        let mut index = self.load_index()?;
        if index.upsert(key.clone(), id) {
            index.save(&self.index_path())?;
            log::info!("staged {} as {}", key, id);
        } else {
            log::info!("{} unchanged, nothing to stage", key);
        }
        Ok(id)
    }

    /// Builds a new snapshot from the parent tree, the staged changes
    /// and the deletions observed in the working directory, then wraps
    /// it in a commit advancing head. Returns `None` when the merged
    /// tree equals the parent tree: nothing to commit, and no object
    /// is written. A deletion-only commit (empty index, tracked file
    /// gone from the working directory) does produce a new commit.
    pub fn commit(&self, message: &str) -> Result<Option<ObjectId>, Error> {
        let mut index = self.load_index()?;
        let mut store = self.store()?;
        let head = self.refs.read(HEAD)?;
        let parent = match head {
            None => Tree::default(),
            Some(id) => self.parent_tree(&store, id)?,
        };
        let mut tree = parent.clone();

        for (path, id) in index.entries() {
            tree.entries.insert(path.clone(), *id);
        }

        // Deletion detection is shallow: only the top-level listing of
        // the working directory is consulted. A tracked path that is
        // gone from that listing and not staged drops out of the tree.
        let present = self.top_level_files()?;
        let tracked: Vec<String> = tree.entries.keys().cloned().collect();
        for path in tracked {
            if !present.contains(&path) && !index.contains(&path) {
                if self.worktree.join(&path).is_file() {
                    log::warn!(
                        "{} still exists but is outside the top-level scan, dropping it",
                        path
                    );
                } else {
                    log::info!("{} deleted from working directory", path);
                }
                tree.entries.remove(&path);
            }
        }

        if tree == parent {
            return Ok(None);
        }

        let tree_id = store.insert(&Record::from(tree).encode()?)?;
        let commit = Commit {
            tree: tree_id,
            parent: head,
            date: Utc::now(),
            message: message.to_string(),
        };
        let commit_id = store.insert(&Record::from(commit.clone()).encode()?)?;

        self.refs.write(HEAD, commit_id)?;
        index.clear();
        index.save(&self.index_path())?;
        self.history.append(&LogEntry {
            commit: commit_id,
            date: commit.date,
            message: commit.message,
        })?;
        Ok(Some(commit_id))
    }

    /// Loads the tree the new snapshot starts from. A head that names
    /// a missing commit is a consistency fault and fails hard; a
    /// commit whose tree is missing degrades to an empty tree.
    fn parent_tree(&self, store: &DirectoryObjectStore, head: ObjectId) -> Result<Tree, Error> {
        let commit = read_commit(store, head)?;
        match store.read(commit.tree)? {
            None => {
                log::warn!("head commit {} has no stored tree, starting empty", head);
                Ok(Tree::default())
            }
            Some(bytes) => Record::decode(&bytes)
                .ok()
                .and_then(Record::into_tree)
                .ok_or(Error::MalformedTree(commit.tree)),
        }
    }

    /// Hard-resets the working directory to the given commit's tree
    /// and repoints head at it. Destructive: files not in the target
    /// tree are deleted, emptied directories pruned.
    pub fn checkout(&self, id: ObjectId) -> Result<(), Error> {
        let store = self.store()?;
        let commit = read_commit(&store, id)?;
        let tree = store
            .read(commit.tree)?
            .ok_or(Error::TreeNotFound(commit.tree))?;
        let tree = Record::decode(&tree)
            .ok()
            .and_then(Record::into_tree)
            .ok_or(Error::MalformedTree(commit.tree))?;

        let mut restored = BTreeSet::new();
        for (path, blob_id) in &tree.entries {
            let content = store.read(*blob_id)?.ok_or(Error::BlobNotFound {
                path: path.clone(),
                id: *blob_id,
            })?;
            let full = self.worktree.join(path);
            if let Some(parent) = full.parent() {
                create_dir_all(parent)?;
            }
            let mut file = File::options()
                .create(true)
                .write(true)
                .truncate(true)
                .open(full)?;
            file.write_all(&content)?;
            restored.insert(path.clone());
        }

        self.hard_reset_worktree(&restored)?;
        self.refs.write(HEAD, id)?;
        Ok(())
    }

    /// The history, most recent commit first, plus the count of
    /// malformed log lines skipped while reading.
    pub fn history(&self) -> Result<(Vec<LogEntry>, usize), Error> {
        Ok(self.history.read()?)
    }

    /// Canonicalizes a user-supplied path into the index key: relative
    /// to the worktree, forward slashes, no `.` components. Two
    /// spellings of the same file produce the same key.
    fn worktree_key(&self, path: &Path) -> Result<String, Error> {
        let relative = if path.is_absolute() {
            path.strip_prefix(&self.worktree)
                .map_err(|_| Error::SourceNotFound(path.to_path_buf()))?
        } else {
            path
        };
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(s) => parts.push(s),
                    None => return Err(Error::SourceNotFound(path.to_path_buf())),
                },
                Component::CurDir => continue,
                _ => return Err(Error::SourceNotFound(path.to_path_buf())),
            }
        }
        if parts.is_empty() {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        Ok(parts.join("/"))
    }

    /// File names at the top level of the working directory.
    fn top_level_files(&self) -> Result<BTreeSet<String>, Error> {
        let mut files = BTreeSet::new();
        for entry in read_dir(&self.worktree)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    files.insert(name.to_string());
                }
            }
        }
        Ok(files)
    }

    /// Deletes every file under the worktree that is not in `keep`
    /// (paths relative to the worktree, forward slashes), then prunes
    /// directories the deletions emptied. The metadata directory is
    /// never touched.
    fn hard_reset_worktree(&self, keep: &BTreeSet<String>) -> Result<(), Error> {
        let mut files = Vec::new();
        collect_files(&self.worktree, &self.root, String::new(), &mut files)?;
        for relative in files {
            if !keep.contains(&relative) {
                log::info!("removing untracked file {}", relative);
                remove_file(self.worktree.join(&relative))?;
            }
        }
        prune_empty_dirs(&self.worktree, &self.root)?;
        Ok(())
    }
}

/// Reads and decodes a commit record, distinguishing "absent from the
/// store" from "present but not a commit".
fn read_commit(store: &DirectoryObjectStore, id: ObjectId) -> Result<Commit, Error> {
    let bytes = store.read(id)?.ok_or(Error::CommitNotFound(id))?;
    Record::decode(&bytes)
        .ok()
        .and_then(Record::into_commit)
        .ok_or(Error::MalformedCommit(id))
}

/// Recursively collects worktree-relative paths of every file under
/// `dir`, skipping the repository metadata directory.
fn collect_files(
    dir: &Path,
    skip: &Path,
    prefix: String,
    out: &mut Vec<String>,
) -> Result<(), std::io::Error> {
    for entry in read_dir(dir)? {
        let entry = entry?;
        if entry.path() == skip {
            continue;
        }
        let name = match entry.file_name().to_str() {
            Some(s) => s.to_string(),
            None => {
                log::warn!("skipping non-utf8 name in {:?}", dir);
                continue;
            }
        };
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), skip, relative, out)?;
        } else if file_type.is_file() {
            out.push(relative);
        } else {
            log::warn!("skipping {} (not a regular file)", relative);
        }
    }
    Ok(())
}

/// Removes directories emptied by a hard reset, bottom-up. Returns
/// whether `dir` itself ended up empty.
fn prune_empty_dirs(dir: &Path, skip: &Path) -> Result<bool, std::io::Error> {
    let mut empty = true;
    for entry in read_dir(dir)? {
        let entry = entry?;
        if entry.path() == skip {
            empty = false;
            continue;
        }
        if entry.file_type()?.is_dir() {
            if prune_empty_dirs(&entry.path(), skip)? {
                remove_dir(entry.path())?;
            } else {
                empty = false;
            }
        } else {
            empty = false;
        }
    }
    Ok(empty)
}
