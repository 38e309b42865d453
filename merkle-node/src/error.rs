//! 權威節點與驗證客戶端統一錯誤類型定義
//!
//! 使用 thiserror crate 提供良好的錯誤鏈和上下文信息。

use thiserror::Error;

use crate::report::ValidityReport;

/// 節點錯誤類型
///
/// 涵蓋所有子系統的錯誤情況：
/// - 連接建立與讀寫
/// - 線路協議
/// - 證明索引查詢
/// - 配置管理
#[derive(Error, Debug)]
pub enum NodeError {
    /// 連接錯誤
    ///
    /// 連接、接受、讀取或寫入失敗時返回此錯誤
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// 協議違規
    ///
    /// 對端發送了不符合協議的幀，例如缺少終止符或出現非哈希內容
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// 未知交易
    ///
    /// 權威節點沒有該交易的證明路徑
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(String),

    /// 單次查詢超時
    #[error("Query for {transaction} timed out after {timeout_ms}ms")]
    Timeout { transaction: String, timeout_ms: u64 },

    /// 會話被取消
    #[error("Session cancelled")]
    Cancelled,

    /// 配置錯誤
    ///
    /// 當配置文件格式錯誤或缺少必要參數時返回此錯誤
    #[error("Configuration error: {0}")]
    Config(String),

    /// 證明庫錯誤
    #[error("Proof error: {0}")]
    Proof(merkle_proof::ProofError),

    /// 通用錯誤
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 類型別名
pub type Result<T> = std::result::Result<T, NodeError>;

/// 從證明庫錯誤轉換
///
/// 未知交易保留為獨立的錯誤種類
impl From<merkle_proof::ProofError> for NodeError {
    fn from(err: merkle_proof::ProofError) -> Self {
        match err {
            merkle_proof::ProofError::UnknownTransaction(tx) => NodeError::UnknownTransaction(tx),
            other => NodeError::Proof(other),
        }
    }
}

/// 中途失敗的驗證會話
///
/// 保留失敗前已經得到的判定結果，而不是整體丟棄
#[derive(Error, Debug)]
#[error("Validity check aborted after {} of {} queries: {source}", .partial.verdicts.len(), .requested)]
pub struct PartialCheck {
    /// 失敗前已完成的判定
    pub partial: ValidityReport,

    /// 請求的查詢總數
    pub requested: usize,

    /// 導致中止的錯誤
    #[source]
    pub source: NodeError,
}

impl PartialCheck {
    pub fn into_parts(self) -> (ValidityReport, NodeError) {
        (self.partial, self.source)
    }
}
