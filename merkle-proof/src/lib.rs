//! Merkle proof-path verification primitives
//!
//! Shared by the authority (which serves sibling paths) and the validity
//! client (which folds them back into a root).
//!
//! # Quick Start
//!
//! ```rust
//! use merkle_proof::{hash_text, HashAlgorithm, ProofIndex, ProofSource, ProofVerifier, SiblingPath};
//!
//! let alg = HashAlgorithm::Sha256;
//! let leaf = hash_text(&alg, "0000000001");
//! let siblings: SiblingPath = vec![hash_text(&alg, "a"), hash_text(&alg, "b")].into();
//!
//! // Authority side
//! let verifier = ProofVerifier::new(alg);
//! let root = verifier.fold(&leaf, &siblings);
//! let mut index = ProofIndex::with_root(root.clone());
//! index.insert(leaf.clone(), siblings);
//!
//! // Client side
//! let path = index.siblings_for(&leaf).unwrap();
//! assert!(verifier.verify(&root, &leaf, &path));
//! ```

pub mod error;
pub mod hash;
pub mod index;
pub mod traits;
pub mod verify;

// Re-export commonly used types
pub use error::{ProofError, Result};
pub use hash::{hash_text, Hash, HashAlgorithm, SiblingPath};
pub use index::ProofIndex;
pub use traits::{ContentHasher, ProofSource};
pub use verify::{fold, verify, ProofVerifier};
