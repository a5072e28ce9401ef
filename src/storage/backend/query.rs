//! Query operations for SeaOrmStorage

use std::time::Duration;

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, error};

use super::converters::model_to_record;
use super::{SeaOrmStorage, retry};
use crate::errors::{Result, ShortenerError};
use crate::storage::{Lookup, UrlRecord};
use crate::utils::original_fingerprint;

use migration::entities::short_url;

impl SeaOrmStorage {
    pub(super) fn op_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub async fn get(&self, alias: &str) -> Result<Lookup> {
        let db = &self.db;
        let alias_owned = alias.to_string();

        let model = retry::with_retry(
            &format!("get({})", alias),
            self.retry_config,
            self.op_timeout(),
            || async { short_url::Entity::find_by_id(alias_owned.clone()).one(db).await },
        )
        .await
        .map_err(|e| {
            error!("Lookup of '{}' failed after retries: {}", alias, e);
            ShortenerError::database_operation(format!("lookup failed: {}", e))
        })?;

        Ok(match model.map(model_to_record) {
            Some(record) if record.deleted => Lookup::Deleted(record),
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound,
        })
    }

    /// 按创建顺序列出 owner 的未删除记录
    pub async fn load_by_owner(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        if owner.is_empty() {
            return Ok(Vec::new());
        }
        let db = &self.db;

        let models = retry::with_retry(
            &format!("load_by_owner({})", owner),
            self.retry_config,
            self.op_timeout(),
            || async {
                short_url::Entity::find()
                    .filter(short_url::Column::Owner.eq(owner))
                    .filter(short_url::Column::Deleted.eq(false))
                    .order_by_asc(short_url::Column::CreatedAt)
                    .all(db)
                    .await
            },
        )
        .await
        .map_err(|e| ShortenerError::database_operation(format!("list failed: {}", e)))?;

        debug!("Loaded {} records for owner '{}'", models.len(), owner);
        Ok(models.into_iter().map(model_to_record).collect())
    }

    /// 查找 (owner, original) 已有的短码
    pub(super) async fn find_existing_alias(
        &self,
        owner: &str,
        original: &str,
    ) -> Result<Option<String>> {
        let model = short_url::Entity::find()
            .filter(short_url::Column::Owner.eq(owner))
            .filter(short_url::Column::OriginalHash.eq(original_fingerprint(original)))
            .one(&self.db)
            .await?;

        Ok(model.map(|m| m.alias))
    }
}
