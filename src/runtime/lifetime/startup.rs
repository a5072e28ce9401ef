use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::middleware::IdentitySigner;
use crate::config::StaticConfig;
use crate::services::{DebounceSettings, DeletionDebouncer, ShortenService};
use crate::storage::{Repository, StorageFactory};
use crate::utils::RandomCodeGenerator;

pub struct StartupContext {
    pub service: Arc<ShortenService>,
    pub signer: Arc<IdentitySigner>,
}

/// 组装服务：生成器 + 存储 + 删除防抖器
///
/// 必须在 tokio runtime 内调用（防抖器会 spawn 控制任务）。
pub fn build_service(repository: Arc<dyn Repository>, config: &StaticConfig) -> ShortenService {
    let settings = DebounceSettings::from(&config.deletion);
    let debouncer = DeletionDebouncer::spawn(repository.clone(), settings);
    let generator = RandomCodeGenerator::new(config.shortener.code_length);

    debug!(
        "ShortenService ready (code_length={}, debounce={:?}, threshold={})",
        config.shortener.code_length, settings.window, settings.threshold
    );
    ShortenService::new(repository, generator, debouncer)
}

/// 准备服务器启动的上下文
pub async fn prepare_server_startup(config: &StaticConfig) -> Result<StartupContext> {
    let start_time = std::time::Instant::now();
    debug!("Starting pre-startup processing...");

    let storage = StorageFactory::create(&config.storage)
        .await
        .context("Failed to create storage backend")?;

    let signer =
        IdentitySigner::from_config(&config.identity).context("Failed to init identity signer")?;

    let service = build_service(storage, config);

    info!(
        "Pre-startup processing completed in {} ms",
        start_time.elapsed().as_millis()
    );
    Ok(StartupContext {
        service: Arc::new(service),
        signer: Arc::new(signer),
    })
}
