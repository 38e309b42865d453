//! Precomputed proof index served by the authority.
//!
//! On disk the index is a JSON document:
//!
//! ```json
//! {
//!   "root": "9f86d0...",
//!   "proofs": {
//!     "6b86b2...": ["d4735e...", "4e0740..."]
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProofError, Result};
use crate::hash::{Hash, SiblingPath};
use crate::traits::{ContentHasher, ProofSource};
use crate::verify::fold;

/// Immutable table from transaction hash to its sibling path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofIndex {
    /// Root every path is expected to fold to, if advertised
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Hash>,

    #[serde(default)]
    proofs: HashMap<Hash, SiblingPath>,
}

impl ProofIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: Hash) -> Self {
        Self {
            root: Some(root),
            proofs: HashMap::new(),
        }
    }

    /// Register the path for a transaction, replacing any previous one
    pub fn insert(&mut self, transaction: Hash, siblings: SiblingPath) -> Option<SiblingPath> {
        self.proofs.insert(transaction, siblings)
    }

    pub fn len(&self) -> usize {
        self.proofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proofs.is_empty()
    }

    pub fn contains(&self, transaction: &Hash) -> bool {
        self.proofs.contains_key(transaction)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load an index file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let index = Self::from_json(&contents)?;
        debug!(path = %path.display(), entries = index.len(), "Loaded proof index");
        Ok(index)
    }

    /// Transactions whose path does not fold to the advertised root
    ///
    /// Empty when no root is advertised. Sorted for stable reporting.
    pub fn check_consistency<H: ContentHasher + ?Sized>(&self, hasher: &H) -> Vec<Hash> {
        let Some(root) = &self.root else {
            return Vec::new();
        };

        let mut mismatched: Vec<Hash> = self
            .proofs
            .iter()
            .filter(|(tx, siblings)| &fold(hasher, tx, siblings) != root)
            .map(|(tx, _)| tx.clone())
            .collect();
        mismatched.sort();
        mismatched
    }
}

impl ProofSource for ProofIndex {
    fn siblings_for(&self, transaction: &Hash) -> Result<SiblingPath> {
        self.proofs
            .get(transaction)
            .cloned()
            .ok_or_else(|| ProofError::UnknownTransaction(transaction.to_string()))
    }
}
