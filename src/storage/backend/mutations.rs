//! Mutation operations for SeaOrmStorage

use sea_orm::{
    ColumnTrait, DbErr, EntityTrait, QueryFilter, SqlErr, TransactionTrait, sea_query::Expr,
};
use tracing::{debug, info, warn};

use super::converters::record_to_active_model;
use super::{SeaOrmStorage, retry};
use crate::errors::{Result, ShortenerError};
use crate::storage::{StoreOutcome, UrlRecord, check_within_batch};

use migration::entities::short_url;

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

impl SeaOrmStorage {
    pub async fn insert_record(&self, record: UrlRecord) -> Result<StoreOutcome> {
        let db = &self.db;

        let result = retry::with_retry(
            &format!("insert({})", record.alias),
            self.retry_config,
            self.op_timeout(),
            || {
                let model = record_to_active_model(&record);
                async move {
                    short_url::Entity::insert(model)
                        .exec_without_returning(db)
                        .await
                }
            },
        )
        .await;

        match result {
            Ok(_) => {
                debug!("Stored '{}' -> {}", record.alias, record.original);
                Ok(StoreOutcome::Stored)
            }
            Err(e) if is_unique_violation(&e) => {
                // 区分 (owner, original) 重复与短码冲突
                match self
                    .find_existing_alias(&record.owner, &record.original)
                    .await?
                {
                    Some(alias) => Ok(StoreOutcome::AlreadyExists { alias }),
                    None => Err(ShortenerError::alias_conflict(format!(
                        "alias '{}' is already taken",
                        record.alias
                    ))),
                }
            }
            Err(e) => Err(ShortenerError::database_operation(format!(
                "insert failed: {}",
                e
            ))),
        }
    }

    /// 单事务批量插入
    pub async fn insert_many(&self, records: Vec<UrlRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        check_within_batch(&records)?;

        let txn = self.db.begin().await.map_err(|e| {
            ShortenerError::database_operation(format!("failed to begin transaction: {}", e))
        })?;

        let models: Vec<short_url::ActiveModel> =
            records.iter().map(record_to_active_model).collect();

        if let Err(e) = short_url::Entity::insert_many(models)
            .exec_without_returning(&txn)
            .await
        {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Failed to roll back batch insert: {}", rollback_err);
            }
            if !is_unique_violation(&e) {
                return Err(ShortenerError::database_operation(format!(
                    "batch insert failed: {}",
                    e
                )));
            }
            for record in &records {
                if let Some(alias) = self
                    .find_existing_alias(&record.owner, &record.original)
                    .await?
                {
                    return Err(ShortenerError::already_exists(alias, record.original.clone()));
                }
            }
            return Err(ShortenerError::alias_conflict(
                "batch conflicts with existing aliases",
            ));
        }

        txn.commit().await.map_err(|e| {
            ShortenerError::database_operation(format!("failed to commit transaction: {}", e))
        })?;

        info!("Batch inserted {} records", records.len());
        Ok(())
    }

    /// 软删除属于 owner 的短码
    pub async fn mark_deleted(&self, aliases: Vec<String>, owner: &str) -> Result<usize> {
        if owner.is_empty() || aliases.is_empty() {
            return Ok(0);
        }
        let db = &self.db;

        let result = retry::with_retry(
            &format!("mark_deleted({})", owner),
            self.retry_config,
            self.op_timeout(),
            || async {
                short_url::Entity::update_many()
                    .col_expr(short_url::Column::Deleted, Expr::value(true))
                    .filter(short_url::Column::Alias.is_in(aliases.iter().cloned()))
                    .filter(short_url::Column::Owner.eq(owner))
                    .filter(short_url::Column::Deleted.eq(false))
                    .exec(db)
                    .await
            },
        )
        .await
        .map_err(|e| ShortenerError::database_operation(format!("batch delete failed: {}", e)))?;

        info!(
            "Marked {}/{} aliases deleted for owner '{}'",
            result.rows_affected,
            aliases.len(),
            owner
        );
        Ok(result.rows_affected as usize)
    }
}
