//! Validity report produced by one client session

use std::fmt;

use chrono::{DateTime, Utc};
use merkle_proof::{Hash, HashAlgorithm};
use serde::{Deserialize, Serialize};

/// Outcome for a single queried transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub transaction: Hash,
    pub valid: bool,
    /// Number of siblings the authority returned
    pub path_len: usize,
}

/// All verdicts of a session, in query order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidityReport {
    pub root: Hash,
    pub algorithm: HashAlgorithm,
    pub checked_at: DateTime<Utc>,
    pub verdicts: Vec<VerificationVerdict>,
}

impl ValidityReport {
    pub fn new(root: Hash, algorithm: HashAlgorithm) -> Self {
        Self {
            root,
            algorithm,
            checked_at: Utc::now(),
            verdicts: Vec::new(),
        }
    }

    pub fn record(&mut self, verdict: VerificationVerdict) {
        self.verdicts.push(verdict);
    }

    /// Valid transactions, in query order
    pub fn valid(&self) -> impl Iterator<Item = &Hash> {
        self.verdicts.iter().filter(|v| v.valid).map(|v| &v.transaction)
    }

    /// Invalid transactions, in query order
    pub fn invalid(&self) -> impl Iterator<Item = &Hash> {
        self.verdicts.iter().filter(|v| !v.valid).map(|v| &v.transaction)
    }

    pub fn valid_count(&self) -> usize {
        self.valid().count()
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid().count()
    }

    pub fn all_valid(&self) -> bool {
        self.verdicts.iter().all(|v| v.valid)
    }
}

/// Invalid transactions first, then valid ones
impl fmt::Display for ValidityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "non-valid transactions:")?;
        for tx in self.invalid() {
            writeln!(f, "{tx}")?;
        }
        writeln!(f, "valid transactions:")?;
        for tx in self.valid() {
            writeln!(f, "{tx}")?;
        }
        Ok(())
    }
}
