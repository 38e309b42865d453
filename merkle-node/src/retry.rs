//! 連接重試機制模組
//!
//! 實現指數退避（Exponential Backoff）策略，用於處理權威節點暫時不可達的情況。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::Result;

/// 重試配置
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// 最大重試次數
    pub max_retries: u32,
    /// 初始延遲時間（毫秒）
    pub initial_delay_ms: u64,
    /// 延遲增長倍數
    pub multiplier: f64,
    /// 最大延遲時間（毫秒）
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 200,
            multiplier: 2.0,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// 不重試，首次失敗即返回
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次失敗後的等待時間（從 1 開始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = ((self.initial_delay_ms as f64) * factor) as u64;
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// 使用指數退避策略重試操作
///
/// # 參數
///
/// * `operation_name` - 操作名稱（用於日誌）
/// * `config` - 重試配置
/// * `operation` - 要重試的異步操作
///
/// # 重試策略
///
/// 1. 初始延遲：`initial_delay_ms`
/// 2. 每次失敗後延遲乘以 `multiplier`
/// 3. 延遲上限：`max_delay_ms`
/// 4. 最大重試次數：`max_retries`
pub async fn retry_with_exponential_backoff<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = config.max_retries + 1,
            "Executing operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt > config.max_retries {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after all retries"
                    );
                    return Err(e);
                }

                let delay = config.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, retrying..."
                );

                sleep(delay).await;
            }
        }
    }
}
