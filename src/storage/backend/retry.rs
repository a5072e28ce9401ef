//! 数据库操作重试
//!
//! 连接类错误、死锁、锁超时按指数退避重试；约束冲突等业务错误立即返回。

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 判断数据库错误是否可重试
pub fn is_retryable_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => {
            is_transient(&runtime_err.to_string().to_lowercase())
        }
        _ => false,
    }
}

fn is_transient(message: &str) -> bool {
    const MARKERS: [&str; 5] = [
        "deadlock",
        "lock wait timeout",
        "database is locked",
        "serialization failure",
        "could not serialize access",
    ];
    MARKERS.iter().any(|marker| message.contains(marker))
}

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// 指数退避延迟，附加 0-25% 抖动
fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exp = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp.min(config.max_delay_ms);
    let jitter = rand::random_range(0..=capped / 4);
    Duration::from_millis(capped.saturating_add(jitter))
}

/// 带重试的执行器
///
/// `timeout` 为单次尝试的超时；超时按可重试错误处理。
pub async fn with_retry<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    timeout: Option<Duration>,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut attempt = 0;
    loop {
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(_) => Err(DbErr::Conn(sea_orm::error::RuntimeErr::Internal(format!(
                    "timed out after {} ms",
                    limit.as_millis()
                )))),
            },
            None => operation().await,
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!("'{}' succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) if is_retryable_error(&e) && attempt < config.max_retries => {
                attempt += 1;
                let delay = backoff_delay(attempt, &config);
                warn!(
                    "'{}' failed (attempt {}/{}): {}; retrying in {:?}",
                    operation_name,
                    attempt,
                    config.max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable_error(&DbErr::ConnectionAcquire(
            sea_orm::error::ConnAcquireErr::Timeout
        )));
        assert!(is_retryable_error(&DbErr::Exec(
            sea_orm::error::RuntimeErr::Internal("database is locked".to_string())
        )));
        assert!(!is_retryable_error(&DbErr::RecordNotFound(
            "abcde".to_string()
        )));
        assert!(!is_retryable_error(&DbErr::Exec(
            sea_orm::error::RuntimeErr::Internal("UNIQUE constraint failed".to_string())
        )));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default();
        let first = backoff_delay(1, &config).as_millis() as u64;
        assert!((100..=125).contains(&first));

        let late = backoff_delay(12, &config).as_millis() as u64;
        assert!((2000..=2500).contains(&late));
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry("flaky", fast(), None, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DbErr::ConnectionAcquire(
                        sea_orm::error::ConnAcquireErr::Timeout,
                    ))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbErr> = with_retry("down", fast(), None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::Conn(sea_orm::error::RuntimeErr::Internal("gone".into()))) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbErr> = with_retry("missing", fast(), None, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::RecordNotFound("x".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbErr> =
            with_retry("slow", fast(), Some(Duration::from_millis(10)), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
