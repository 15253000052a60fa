use std::time::Duration;

use crate::error::RemoteError;
use crate::models::{User, UserId};
use crate::remote::UserSource;

/// 远程读取的超时与重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub attempts: u32,
    pub backoff_base: Duration,
    /// 单次请求超时，超时按可重试错误处理
    pub fetch_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_base: Duration::from_millis(100),
            fetch_timeout: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的等待时间：base * 2^(attempt-1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

/// 带超时与指数退避地读取远程用户
///
/// 只有可重试错误会重试，不可重试错误立即返回。
pub async fn fetch_with_retry<R: UserSource>(
    remote: &R,
    id: UserId,
    policy: &RetryPolicy,
) -> Result<Option<User>, RemoteError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(policy.fetch_timeout, remote.fetch(id)).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(policy.fetch_timeout)),
        };

        match result {
            Err(e) if e.is_transient() && attempt < attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "Fetching user {} failed (attempt {}/{}): {}, retrying in {:?}",
                    id,
                    attempt,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
