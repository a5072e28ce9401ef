use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一条短链接记录
///
/// 创建后 `original` / `alias` / `owner` 不再变化，只有 `deleted`
/// 会被存储层在批量删除时置位。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub original: String,
    pub alias: String,
    /// 为空表示匿名记录（不可列出、不可删除）
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl UrlRecord {
    pub fn new(original: impl Into<String>, alias: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            alias: alias.into(),
            owner: owner.into(),
            deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.owner.is_empty()
    }
}
