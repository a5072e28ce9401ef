//! SeaORM storage backend
//!
//! This module provides database storage using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

mod connection;
mod converters;
mod mutations;
mod query;
pub mod retry;

use std::fmt;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use tracing::warn;

use super::{Lookup, Repository, StoreOutcome, UrlRecord};
use crate::config::StorageConfig;
use crate::errors::{Result, ShortenerError};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::{model_to_record, record_to_active_model};

/// 数据库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Sqlite,
    MySql,
    Postgres,
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::MySql => "mysql",
            DatabaseKind::Postgres => "postgres",
        };
        f.write_str(name)
    }
}

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<DatabaseKind> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
    {
        Ok(DatabaseKind::Sqlite)
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok(DatabaseKind::MySql)
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok(DatabaseKind::Postgres)
    } else {
        Err(ShortenerError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    kind: DatabaseKind,
    retry_config: retry::RetryConfig,
    /// 单次数据库操作超时（毫秒）
    timeout_ms: u64,
}

impl SeaOrmStorage {
    pub async fn new(database_url: &str, kind: DatabaseKind, config: &StorageConfig) -> Result<Self> {
        if database_url.is_empty() {
            return Err(ShortenerError::database_config("database url is empty"));
        }

        let retry_config = retry::RetryConfig {
            max_retries: config.retry_count,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
        };

        let db = match kind {
            DatabaseKind::Sqlite => connect_sqlite(database_url).await?,
            _ => connect_generic(database_url, kind, config).await?,
        };

        let storage = SeaOrmStorage {
            db,
            kind,
            retry_config,
            timeout_ms: config.timeout.saturating_mul(1000),
        };

        run_migrations(&storage.db).await?;

        warn!("{} Storage initialized.", storage.kind.to_string().to_uppercase());
        Ok(storage)
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    /// 获取数据库连接
    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Repository for SeaOrmStorage {
    async fn store(&self, record: UrlRecord) -> Result<StoreOutcome> {
        self.insert_record(record).await
    }

    async fn find_by_alias(&self, alias: &str) -> Result<Lookup> {
        self.get(alias).await
    }

    async fn find_all(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        self.load_by_owner(owner).await
    }

    async fn batch_store(&self, records: Vec<UrlRecord>) -> Result<()> {
        self.insert_many(records).await
    }

    async fn batch_delete(&self, aliases: Vec<String>, owner: &str) -> Result<usize> {
        self.mark_deleted(aliases, owner).await
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| ShortenerError::database_connection(format!("ping failed: {}", e)))
    }

    fn backend_name(&self) -> &'static str {
        match self.kind {
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::MySql => "mysql",
            DatabaseKind::Postgres => "postgres",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(
            infer_backend_from_url("sqlite://data/urls.db?mode=rwc").unwrap(),
            DatabaseKind::Sqlite
        );
        assert_eq!(
            infer_backend_from_url("sqlite::memory:").unwrap(),
            DatabaseKind::Sqlite
        );
        assert_eq!(
            infer_backend_from_url("mariadb://u:p@localhost/db").unwrap(),
            DatabaseKind::MySql
        );
        assert_eq!(
            infer_backend_from_url("postgresql://localhost/db").unwrap(),
            DatabaseKind::Postgres
        );
        assert!(matches!(
            infer_backend_from_url("redis://localhost"),
            Err(ShortenerError::DatabaseConfig(_))
        ));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(DatabaseKind::MySql.to_string(), "mysql");
        assert_eq!(DatabaseKind::Sqlite.to_string(), "sqlite");
    }
}
