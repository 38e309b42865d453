//! 配置管理模塊
//!
//! 負責加載和驗證權威節點與驗證客戶端的配置

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use merkle_proof::HashAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, Result};
use crate::retry::RetryConfig;

/// 環境變量前綴，例如 `MERKLE_NODE_PORT`
pub const ENV_PREFIX: &str = "MERKLE_NODE";

/// 默認權威節點端口
pub const DEFAULT_PORT: u16 = 1111;

/// 節點配置
///
/// 權威節點與客戶端共用同一份配置：主機、端口與哈希算法必須雙方一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// 權威節點地址
    pub host: String,

    /// 權威節點端口
    pub port: u16,

    /// 內容哈希算法（`sha256` 或 `sha3-256`）
    pub hash_algorithm: HashAlgorithm,

    /// 證明索引文件路徑（JSON）
    pub proof_index_path: Option<PathBuf>,

    /// 同時存活的最大會話數，未設置時不限制
    pub max_sessions: Option<usize>,

    /// 客戶端單次查詢超時（秒），未設置時不限制
    pub query_timeout_secs: Option<u64>,

    /// 客戶端連接重試次數
    pub connect_retries: u32,

    /// 客戶端首次重試延遲（毫秒）
    pub connect_retry_delay_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            hash_algorithm: HashAlgorithm::default(),
            proof_index_path: None,
            max_sessions: None,
            query_timeout_secs: Some(30),
            connect_retries: 3,
            connect_retry_delay_ms: 200,
        }
    }
}

impl NodeConfig {
    /// `host:port` 形式的地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.connect_retries,
            initial_delay_ms: self.connect_retry_delay_ms,
            ..RetryConfig::default()
        }
    }
}

/// 加載配置
///
/// # 參數
/// - `config_path`: 配置文件路徑（支持 TOML、JSON、YAML），文件不存在時忽略
///
/// 環境變量 `MERKLE_NODE_*` 覆蓋文件中的值
///
/// # 示例
/// ```no_run
/// use merkle_node::config::load_config;
///
/// let config = load_config("merkle-node.toml").expect("Failed to load config");
/// println!("Authority: {}", config.address());
/// ```
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<NodeConfig> {
    let config = Config::builder()
        .add_source(File::from(config_path.as_ref()).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .map_err(|e| NodeError::Config(format!("Failed to load config file: {}", e)))?;

    let node_config: NodeConfig = config
        .try_deserialize()
        .map_err(|e| NodeError::Config(format!("Failed to parse config: {}", e)))?;

    validate_config(&node_config)?;

    Ok(node_config)
}

/// 驗證配置的有效性
///
/// 檢查:
/// - 主機名非空
/// - 會話上限與超時大於 0
pub fn validate_config(config: &NodeConfig) -> Result<()> {
    if config.host.trim().is_empty() {
        return Err(NodeError::Config("host must not be empty".to_string()));
    }

    if config.max_sessions == Some(0) {
        return Err(NodeError::Config(
            "max_sessions must be greater than 0".to_string(),
        ));
    }

    if config.query_timeout_secs == Some(0) {
        return Err(NodeError::Config(
            "query_timeout_secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// 驗證客戶端使用的配置
///
/// 除 [`validate_config`] 的檢查外，端口不能為 0
pub fn validate_client_config(config: &NodeConfig) -> Result<()> {
    validate_config(config)?;

    if config.port == 0 {
        return Err(NodeError::Config(
            "port must be non-zero to connect to an authority".to_string(),
        ));
    }

    Ok(())
}
