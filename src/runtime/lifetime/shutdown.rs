use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info};

use crate::services::ShortenService;

/// 关闭超时时间（秒）
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// HTTP 服务停止后调用：刷出待删除请求并等待在途删除完成
pub async fn perform_shutdown_tasks(service: &ShortenService) {
    info!("Flushing pending deletions...");

    match timeout(
        Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        service.shutdown(),
    )
    .await
    {
        Ok(()) => {
            let stats = service.deletion_stats();
            info!(
                "Deletion debouncer stopped: {} requests received, {} flushed in {} batches, {} failed",
                stats.requests_received,
                stats.requests_flushed,
                stats.flushes_dispatched,
                stats.failed_deletes
            );
        }
        Err(_) => {
            error!(
                "Deletion flush timed out after {} seconds, pending deletions may be lost",
                SHUTDOWN_TIMEOUT_SECS
            );
        }
    }
}
