use crate::object_id::ObjectId;

pub mod directory;
pub mod in_memory;

/// A content-addressed store. Objects are keyed by the hash of their
/// bytes, so writes are idempotent and identical content is stored once.
pub trait ObjectStore {
    type Error;

    fn has(&self, id: ObjectId) -> Result<bool, Self::Error>;

    fn read(&self, id: ObjectId) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Computes the content hash and persists the bytes under it unless
    /// an object with that hash already exists. Returns the hash either
    /// way; existing objects are never overwritten.
    fn insert(&mut self, object: &[u8]) -> Result<ObjectId, Self::Error>;
}
