use blake3::Hash;
use serde::{Deserialize, Serialize};

use std::{fmt::Display, fs::File, io::Read, path::Path};

/// An identifier for a particular piece of binary content.
/// Under the hood, this is a [`blake3`] hash.
///
/// It is displayed in lowercase hexadecimal format, and serializes as
/// that hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectId(Hash);

impl ObjectId {
    /// Parses a 64-character hex string, as printed by [`Display`].
    /// Either case is accepted. Returns `None` for anything else, so
    /// user-supplied hashes can be rejected instead of panicking.
    pub fn from_hex(s: &str) -> Option<Self> {
        Hash::from_hex(s).ok().map(ObjectId)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl Ord for ObjectId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl PartialOrd for ObjectId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl From<&Vec<u8>> for ObjectId {
    fn from(vec: &Vec<u8>) -> Self {
        ObjectId(blake3::hash(vec))
    }
}

impl From<&[u8]> for ObjectId {
    fn from(bytes: &[u8]) -> Self {
        ObjectId(blake3::hash(bytes))
    }
}

impl TryFrom<File> for ObjectId {
    type Error = std::io::Error;

    fn try_from(mut f: File) -> Result<Self, Self::Error> {
        let mut vec = Vec::new();
        f.read_to_end(&mut vec)?;
        Ok((&vec).into())
    }
}

impl TryFrom<&Path> for ObjectId {
    type Error = std::io::Error;

    fn try_from(p: &Path) -> Result<Self, Self::Error> {
        let f = File::options().read(true).open(p)?;
        ObjectId::try_from(f)
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.to_hex().as_str().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ObjectId::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("bad object id: {s}")))
    }
}
