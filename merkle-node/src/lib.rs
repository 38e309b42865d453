//! Merkle proof authority and validity client
//!
//! 本 crate 實現了默克爾證明驗證協議的兩端:
//! 1. 權威節點: 為每筆被查詢的交易返回兄弟節點路徑
//! 2. 驗證客戶端: 依序查詢交易，重新計算默克爾根並分類為有效/無效
//!
//! # 架構
//!
//! ```text
//! ┌────────────────┐  query / close   ┌──────────────────┐
//! │ ValidityClient │ ───────────────▶ │ AuthorityService │
//! │                │ ◀─────────────── │   (Session × N)  │
//! └───────┬────────┘  siblings + end  └────────┬─────────┘
//!         │                                    │
//!         ▼                                    ▼
//!   ProofVerifier                          ProofSource
//! ```
//!
//! # 示例用法
//!
//! ```no_run
//! use std::sync::Arc;
//! use merkle_node::{AuthorityService, ClientConfig, ValidityClient};
//! use merkle_proof::{hash_text, HashAlgorithm, ProofIndex};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let authority = AuthorityService::new(Arc::new(ProofIndex::new()))
//!         .bind("127.0.0.1:0")
//!         .await?;
//!     let port = authority.local_addr()?.port();
//!     tokio::spawn(authority.run(std::future::pending()));
//!
//!     let root = hash_text(&HashAlgorithm::Sha256, "0000000000");
//!     let tx = hash_text(&HashAlgorithm::Sha256, "0000000001");
//!     let report = ValidityClient::new(ClientConfig::new("127.0.0.1", port, root, vec![tx]))
//!         .check_all()
//!         .await?;
//!     print!("{report}");
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod report;
pub mod retry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod wire;

// Re-export 常用類型
pub use client::{AuthorityConnection, ClientConfig, ValidityClient};
pub use config::NodeConfig;
pub use error::{NodeError, PartialCheck, Result};
pub use report::{ValidityReport, VerificationVerdict};
pub use server::{AuthorityService, BoundAuthority};
pub use session::{Session, SessionState};
