//! 缩短服务
//!
//! 组合短码生成器、存储与删除防抖器，对外提供缩短、批量缩短、
//! 还原、列出和批量删除。

use std::sync::Arc;

use tracing::{debug, info, trace};

use super::deletion::{DebouncerStats, DeletionDebouncer};
use super::models::{BatchOutputItem, CorrelationItem, DeletionRequest, ShortenOutcome};
use crate::errors::{Result, ShortenerError};
use crate::storage::{Lookup, Repository, StoreOutcome, UrlRecord};
use crate::utils::{CodeGenerator, RandomCodeGenerator};

pub struct ShortenService<G: CodeGenerator = RandomCodeGenerator> {
    repository: Arc<dyn Repository>,
    generator: G,
    debouncer: DeletionDebouncer,
}

impl<G: CodeGenerator> ShortenService<G> {
    pub fn new(repository: Arc<dyn Repository>, generator: G, debouncer: DeletionDebouncer) -> Self {
        Self {
            repository,
            generator,
            debouncer,
        }
    }

    /// 缩短单个链接
    ///
    /// 同一 owner 重复缩短同一链接时返回 [`ShortenOutcome::AlreadyExists`]，
    /// 携带先前生成的短码。
    pub async fn shorten(&self, original: &str, owner: &str) -> Result<ShortenOutcome> {
        let record = UrlRecord::new(original, self.generator.generate(), owner);
        let alias = record.alias.clone();

        match self.repository.store(record).await? {
            StoreOutcome::Stored => {
                trace!("Shortened {} -> {}", original, alias);
                Ok(ShortenOutcome::Created(alias))
            }
            StoreOutcome::AlreadyExists { alias } => {
                debug!("{} already shortened as {}", original, alias);
                Ok(ShortenOutcome::AlreadyExists {
                    alias,
                    original: original.to_string(),
                })
            }
        }
    }

    /// 批量缩短：一次 `batch_store`，失败时没有任何部分结果
    pub async fn shorten_batch(
        &self,
        items: Vec<CorrelationItem>,
        owner: &str,
    ) -> Result<Vec<BatchOutputItem>> {
        let mut records = Vec::with_capacity(items.len());
        let mut outputs = Vec::with_capacity(items.len());
        for item in items {
            let alias = self.generator.generate();
            records.push(UrlRecord::new(item.original_url, alias.clone(), owner));
            outputs.push(BatchOutputItem {
                correlation_id: item.correlation_id,
                short_alias: alias,
            });
        }

        self.repository.batch_store(records).await?;
        info!("Batch shortened {} urls", outputs.len());
        Ok(outputs)
    }

    /// 还原原始链接
    pub async fn restore_origin(&self, alias: &str) -> Result<String> {
        match self.repository.find_by_alias(alias).await? {
            Lookup::Found(record) => Ok(record.original),
            Lookup::Deleted(record) => Err(ShortenerError::url_deleted(
                record.alias,
                record.original,
            )),
            Lookup::NotFound => Err(ShortenerError::not_found(format!(
                "short url '{}' not found",
                alias
            ))),
        }
    }

    /// 列出 owner 名下的所有记录
    pub async fn show_all(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let records = self.repository.find_all(owner).await?;
        if records.is_empty() {
            return Err(ShortenerError::no_records_for_owner(format!(
                "no urls for owner '{}'",
                owner
            )));
        }
        Ok(records)
    }

    /// 交给防抖器后立即返回
    pub fn delete_batch(&self, aliases: Vec<String>, owner: &str) {
        self.debouncer
            .submit(DeletionRequest::new(owner, aliases));
    }

    pub async fn ping(&self) -> Result<()> {
        self.repository.ping().await
    }

    pub fn deletion_stats(&self) -> DebouncerStats {
        self.debouncer.stats()
    }

    /// 刷出待删除请求并等待完成
    pub async fn shutdown(&self) {
        self.debouncer.shutdown().await;
    }

    pub fn code_length(&self) -> usize {
        self.generator.length()
    }
}
