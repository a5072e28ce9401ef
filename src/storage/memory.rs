//! 内存存储
//!
//! 三张索引共用一把读写锁，保证重复检测与写入是原子的：
//! - alias → record
//! - (owner, original) → alias
//! - owner → aliases（按写入顺序）

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{Lookup, Repository, StoreOutcome, UrlRecord, check_within_batch};
use crate::errors::{Result, ShortenerError};

/// 写入前检测到的冲突
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Conflict {
    /// 同一 (owner, original) 已有短码
    Duplicate(String),
    /// 短码已被其他记录占用
    AliasTaken(String),
}

#[derive(Default)]
struct Index {
    records: HashMap<String, UrlRecord>,
    by_original: HashMap<(String, String), String>,
    by_owner: HashMap<String, Vec<String>>,
}

impl Index {
    fn conflict(&self, record: &UrlRecord) -> Option<Conflict> {
        let key = (record.owner.clone(), record.original.clone());
        if let Some(alias) = self.by_original.get(&key) {
            return Some(Conflict::Duplicate(alias.clone()));
        }
        if self.records.contains_key(&record.alias) {
            return Some(Conflict::AliasTaken(record.alias.clone()));
        }
        None
    }

    /// 先检查批内互相冲突，再检查与已有记录的冲突；
    /// 已有记录中同时存在重复链接与短码冲突时，优先报告重复链接
    fn check_batch(&self, records: &[UrlRecord]) -> Result<()> {
        check_within_batch(records)?;

        let conflicts: Vec<(Conflict, &UrlRecord)> = records
            .iter()
            .filter_map(|record| self.conflict(record).map(|c| (c, record)))
            .collect();

        if let Some((Conflict::Duplicate(alias), record)) = conflicts
            .iter()
            .find(|(c, _)| matches!(c, Conflict::Duplicate(_)))
        {
            return Err(ShortenerError::already_exists(
                alias.clone(),
                record.original.clone(),
            ));
        }
        if let Some((Conflict::AliasTaken(alias), _)) = conflicts.first() {
            return Err(ShortenerError::alias_conflict(format!(
                "alias '{}' is already taken",
                alias
            )));
        }
        Ok(())
    }

    fn insert(&mut self, record: UrlRecord) {
        self.by_original.insert(
            (record.owner.clone(), record.original.clone()),
            record.alias.clone(),
        );
        if !record.is_anonymous() {
            self.by_owner
                .entry(record.owner.clone())
                .or_default()
                .push(record.alias.clone());
        }
        self.records.insert(record.alias.clone(), record);
    }

    fn mark_deleted(&mut self, aliases: &[String], owner: &str) -> usize {
        if owner.is_empty() {
            return 0;
        }
        let mut marked = 0;
        for alias in aliases {
            if let Some(record) = self.records.get_mut(alias)
                && record.owner == owner
                && !record.deleted
            {
                record.deleted = true;
                marked += 1;
            }
        }
        marked
    }
}

pub struct MemoryStorage {
    index: RwLock<Index>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Index::default()),
        }
    }

    /// 当前记录总数（含已删除）
    pub fn len(&self) -> usize {
        self.index.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 检查单条记录能否写入
    pub(crate) fn check(&self, record: &UrlRecord) -> Option<Conflict> {
        self.index.read().conflict(record)
    }

    /// 检查整批记录能否写入（包括批内互相冲突）
    pub(crate) fn check_batch(&self, records: &[UrlRecord]) -> Result<()> {
        self.index.read().check_batch(records)
    }

    /// 不做检查直接写入（调用方已持有外部锁并完成检查，或回放日志）
    pub(crate) fn insert_unchecked(&self, record: UrlRecord) {
        self.index.write().insert(record);
    }

    pub(crate) fn mark_deleted(&self, aliases: &[String], owner: &str) -> usize {
        self.index.write().mark_deleted(aliases, owner)
    }

    fn store_sync(&self, record: UrlRecord) -> Result<StoreOutcome> {
        let mut index = self.index.write();
        match index.conflict(&record) {
            Some(Conflict::Duplicate(alias)) => {
                debug!(
                    "MemoryStorage: '{}' already shortened as '{}'",
                    record.original, alias
                );
                Ok(StoreOutcome::AlreadyExists { alias })
            }
            Some(Conflict::AliasTaken(alias)) => Err(ShortenerError::alias_conflict(format!(
                "alias '{}' is already taken",
                alias
            ))),
            None => {
                trace!("MemoryStorage: stored '{}'", record.alias);
                index.insert(record);
                Ok(StoreOutcome::Stored)
            }
        }
    }

    fn batch_store_sync(&self, records: Vec<UrlRecord>) -> Result<()> {
        // 检查与写入之间不能有其他写者插入
        let mut index = self.index.write();
        index.check_batch(&records)?;

        let count = records.len();
        for record in records {
            index.insert(record);
        }
        debug!("MemoryStorage: batch stored {} records", count);
        Ok(())
    }

    fn find_by_alias_sync(&self, alias: &str) -> Lookup {
        match self.index.read().records.get(alias) {
            Some(record) if record.deleted => Lookup::Deleted(record.clone()),
            Some(record) => Lookup::Found(record.clone()),
            None => Lookup::NotFound,
        }
    }

    fn find_all_sync(&self, owner: &str) -> Vec<UrlRecord> {
        let index = self.index.read();
        index
            .by_owner
            .get(owner)
            .map(|aliases| {
                aliases
                    .iter()
                    .filter_map(|alias| index.records.get(alias))
                    .filter(|record| !record.deleted)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Repository for MemoryStorage {
    async fn store(&self, record: UrlRecord) -> Result<StoreOutcome> {
        self.store_sync(record)
    }

    async fn find_by_alias(&self, alias: &str) -> Result<Lookup> {
        Ok(self.find_by_alias_sync(alias))
    }

    async fn find_all(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.find_all_sync(owner))
    }

    async fn batch_store(&self, records: Vec<UrlRecord>) -> Result<()> {
        self.batch_store_sync(records)
    }

    async fn batch_delete(&self, aliases: Vec<String>, owner: &str) -> Result<usize> {
        let marked = self.mark_deleted(&aliases, owner);
        debug!(
            "MemoryStorage: marked {}/{} aliases deleted for owner '{}'",
            marked,
            aliases.len(),
            owner
        );
        Ok(marked)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
