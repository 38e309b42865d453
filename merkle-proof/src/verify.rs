//! 默克爾證明路徑驗證
//!
//! # 驗證算法
//!
//! 客戶端事先知道默克爾根,權威節點為每筆交易返回一條兄弟節點路徑:
//! 1. 初始化累加器: `acc = leaf`
//! 2. 依序遍歷兄弟節點: `acc = H(acc || sibling)`
//!    - `||` 是兩個十六進制字串的串接,不是原始摘要字節
//!    - 順序固定為「累加器在前、兄弟節點在後」,必須與權威節點生成路徑的順序一致
//! 3. 比較最終的累加器與已知的根
//!
//! 空路徑代表單交易樹:只有 `leaf == root` 時驗證通過。

use crate::hash::{Hash, SiblingPath};
use crate::traits::ContentHasher;

/// 默克爾證明驗證器
///
/// # 示例
///
/// ```
/// use merkle_proof::{hash_text, HashAlgorithm, ProofVerifier, SiblingPath};
///
/// let verifier = ProofVerifier::new(HashAlgorithm::Sha256);
/// let leaf = hash_text(&HashAlgorithm::Sha256, "0000000001");
/// let siblings: SiblingPath = vec![
///     hash_text(&HashAlgorithm::Sha256, "a"),
///     hash_text(&HashAlgorithm::Sha256, "b"),
/// ]
/// .into();
///
/// let root = verifier.fold(&leaf, &siblings);
/// assert!(verifier.verify(&root, &leaf, &siblings));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofVerifier<H> {
    hasher: H,
}

impl<H: ContentHasher> ProofVerifier<H> {
    pub fn new(hasher: H) -> Self {
        Self { hasher }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// 將葉子與兄弟節點路徑折疊成候選根
    pub fn fold(&self, leaf: &Hash, siblings: &SiblingPath) -> Hash {
        fold(&self.hasher, leaf, siblings)
    }

    /// 驗證 `leaf` 經 `siblings` 折疊後是否等於 `root`
    ///
    /// # 返回
    /// - `true`: 交易屬於該默克爾樹
    /// - `false`: 路徑無效或交易不屬於該樹
    pub fn verify(&self, root: &Hash, leaf: &Hash, siblings: &SiblingPath) -> bool {
        verify(&self.hasher, root, leaf, siblings)
    }
}

/// 折疊: 對路徑中每個兄弟節點重複 `acc = H(acc || sibling)`
pub fn fold<H: ContentHasher + ?Sized>(hasher: &H, leaf: &Hash, siblings: &SiblingPath) -> Hash {
    let mut acc = leaf.clone();
    let mut buffer = Vec::new();

    for sibling in siblings {
        buffer.clear();
        buffer.extend_from_slice(acc.as_bytes());
        buffer.extend_from_slice(sibling.as_bytes());
        acc = hasher.hash(&buffer);
    }

    acc
}

/// 驗證交易的證明路徑
pub fn verify<H: ContentHasher + ?Sized>(
    hasher: &H,
    root: &Hash,
    leaf: &Hash,
    siblings: &SiblingPath,
) -> bool {
    &fold(hasher, leaf, siblings) == root
}
