/// Seams shared by the verifier and the authority
use crate::error::Result;
use crate::hash::{Hash, SiblingPath};

/// Content hash function both ends of a session agree on
pub trait ContentHasher {
    /// Hash raw bytes into a hex digest
    fn hash(&self, data: &[u8]) -> Hash;

    /// Algorithm name
    fn algorithm_name(&self) -> &str;
}

/// Where the authority looks up sibling paths
///
/// Implementations must be immutable once queries start; the authority shares
/// one instance across every session without locking.
pub trait ProofSource: Send + Sync {
    /// Sibling path for `transaction`, in fold order
    ///
    /// A transaction with no proof yields `ProofError::UnknownTransaction`.
    fn siblings_for(&self, transaction: &Hash) -> Result<SiblingPath>;
}

impl<H: ContentHasher + ?Sized> ContentHasher for &H {
    fn hash(&self, data: &[u8]) -> Hash {
        (**self).hash(data)
    }

    fn algorithm_name(&self) -> &str {
        (**self).algorithm_name()
    }
}
