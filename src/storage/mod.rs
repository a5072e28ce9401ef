//! 持久化契约与存储后端
//!
//! 业务层只依赖 [`Repository`]，具体后端在启动时由 [`StorageFactory`] 选择：
//! - `backend`: SeaORM（SQLite / MySQL / PostgreSQL）
//! - `file`: 追加写日志文件，启动时回放到内存
//! - `memory`: 纯内存

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::StorageConfig;
use crate::errors::{Result, ShortenerError};

pub mod backend;
pub mod file;
pub mod memory;
pub mod models;

pub use backend::SeaOrmStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use models::UrlRecord;

/// `store` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// 同一 (owner, original) 已存在，携带已存在的短码
    AlreadyExists { alias: String },
}

/// `find_by_alias` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(UrlRecord),
    /// 记录存在但已被软删除
    Deleted(UrlRecord),
    NotFound,
}

/// 持久化契约
///
/// 实现方负责自身的并发安全；以下语义对所有后端一致：
/// - `store` 检测重复的 (owner, original) 并返回已存在的短码，
///   与其他记录短码冲突时返回 `AliasConflict`
/// - 软删除后的记录通过 `find_by_alias` 以 [`Lookup::Deleted`] 返回
/// - `find_all` 只返回未删除的记录；匿名 owner（空字符串）没有列表
/// - `batch_delete` 只影响属于 `owner` 的短码，匿名 owner 不删除任何记录
#[async_trait]
pub trait Repository: Send + Sync {
    async fn store(&self, record: UrlRecord) -> Result<StoreOutcome>;

    async fn find_by_alias(&self, alias: &str) -> Result<Lookup>;

    async fn find_all(&self, owner: &str) -> Result<Vec<UrlRecord>>;

    /// 批量写入，任一记录失败则整批失败
    async fn batch_store(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// 标记删除，返回实际被标记的记录数
    async fn batch_delete(&self, aliases: Vec<String>, owner: &str) -> Result<usize>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}

/// 批内互相冲突的检查，所有后端在访问已有数据之前调用
///
/// - 同一 (owner, original) 出现两次：`Validation`
/// - 同一短码出现两次：`AliasConflict`
pub(crate) fn check_within_batch(records: &[UrlRecord]) -> Result<()> {
    let mut aliases = HashSet::with_capacity(records.len());
    let mut originals = HashSet::with_capacity(records.len());

    for record in records {
        if !originals.insert((record.owner.as_str(), record.original.as_str())) {
            return Err(ShortenerError::validation(format!(
                "url '{}' appears twice in batch",
                record.original
            )));
        }
        if !aliases.insert(record.alias.as_str()) {
            return Err(ShortenerError::alias_conflict(format!(
                "alias '{}' appears twice in batch",
                record.alias
            )));
        }
    }
    Ok(())
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn Repository>> {
        let database_url = config.database_url.as_deref().filter(|u| !u.is_empty());
        let file_path = config.file_path.as_deref().filter(|p| !p.is_empty());

        let storage: Arc<dyn Repository> = match (database_url, file_path) {
            (Some(url), _) => {
                // 从 URL 自动推断数据库类型
                let kind = backend::infer_backend_from_url(url)?;
                Arc::new(SeaOrmStorage::new(url, kind, config).await?)
            }
            (None, Some(path)) => Arc::new(FileStorage::open(path)?),
            (None, None) => Arc::new(MemoryStorage::new()),
        };

        info!("Using storage backend: {}", storage.backend_name());
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_defaults_to_memory() {
        let storage = StorageFactory::create(&StorageConfig::default())
            .await
            .unwrap();
        assert_eq!(storage.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_factory_uses_file_when_path_set() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("urls.log");
        let config = StorageConfig {
            file_path: Some(path.display().to_string()),
            ..Default::default()
        };

        let storage = StorageFactory::create(&config).await.unwrap();
        assert_eq!(storage.backend_name(), "file");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_factory_rejects_unknown_database_scheme() {
        let config = StorageConfig {
            database_url: Some("oracle://somewhere".to_string()),
            ..Default::default()
        };

        assert!(StorageFactory::create(&config).await.is_err());
    }
}
