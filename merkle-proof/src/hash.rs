//! Hash values, sibling paths and the agreed content hash function.
//!
//! A [`Hash`] is always the lowercase hex rendering of a digest. Proof folding
//! concatenates these *string* forms, never the raw digest bytes, so the
//! textual representation is part of the protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Sha3_256;

use crate::error::{ProofError, Result};
use crate::traits::ContentHasher;

/// Hex digest exchanged between client and authority
///
/// Only `[0-9a-f]` is accepted, so the wire sentinels can never parse as a
/// hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(String);

impl Hash {
    /// Parse a hex digest
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() || !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(ProofError::InvalidHash(value));
        }
        Ok(Self(value))
    }

    /// Wrap a freshly computed digest
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Hash {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Hash {
    type Error = ProofError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<str> for Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered sibling hashes, exactly in fold order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiblingPath(Vec<Hash>);

impl SiblingPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, sibling: Hash) {
        self.0.push(sibling);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hash> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Hash] {
        &self.0
    }
}

impl From<Vec<Hash>> for SiblingPath {
    fn from(siblings: Vec<Hash>) -> Self {
        Self(siblings)
    }
}

impl FromIterator<Hash> for SiblingPath {
    fn from_iter<I: IntoIterator<Item = Hash>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SiblingPath {
    type Item = Hash;
    type IntoIter = std::vec::IntoIter<Hash>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a SiblingPath {
    type Item = &'a Hash;
    type IntoIter = std::slice::Iter<'a, Hash>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Supported content hash functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
    #[serde(rename = "sha3-256")]
    Sha3_256,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha3_256 => "sha3-256",
        }
    }
}

impl ContentHasher for HashAlgorithm {
    fn hash(&self, data: &[u8]) -> Hash {
        match self {
            HashAlgorithm::Sha256 => Hash::from_digest(&Sha256::digest(data)),
            HashAlgorithm::Sha3_256 => Hash::from_digest(&Sha3_256::digest(data)),
        }
    }

    fn algorithm_name(&self) -> &str {
        self.name()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ProofError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha3-256" | "sha3_256" | "sha3" => Ok(HashAlgorithm::Sha3_256),
            other => Err(ProofError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Hash arbitrary text, e.g. a raw transaction payload
pub fn hash_text<H: ContentHasher + ?Sized>(hasher: &H, text: &str) -> Hash {
    hasher.hash(text.as_bytes())
}
