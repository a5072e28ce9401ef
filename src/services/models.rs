use serde::{Deserialize, Serialize};

use crate::errors::ShortenerError;

/// 批量缩短的输入项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// 批量缩短的输出项（与输入顺序一致）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutputItem {
    pub correlation_id: String,
    pub short_alias: String,
}

/// 一次删除请求，只作用于 owner 名下的短码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub owner: String,
    pub aliases: Vec<String>,
}

impl DeletionRequest {
    pub fn new(owner: impl Into<String>, aliases: Vec<String>) -> Self {
        Self {
            owner: owner.into(),
            aliases,
        }
    }
}

/// 单条缩短的结果；存储失败走 `Err`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenOutcome {
    Created(String),
    /// 同一 owner 已缩短过该链接
    AlreadyExists { alias: String, original: String },
}

impl ShortenOutcome {
    pub fn alias(&self) -> &str {
        match self {
            ShortenOutcome::Created(alias) => alias,
            ShortenOutcome::AlreadyExists { alias, .. } => alias,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, ShortenOutcome::Created(_))
    }

    /// 已存在时转换为 `AlreadyExists` 错误，供只关心新建的调用方使用
    pub fn into_result(self) -> Result<String, ShortenerError> {
        match self {
            ShortenOutcome::Created(alias) => Ok(alias),
            ShortenOutcome::AlreadyExists { alias, original } => {
                Err(ShortenerError::already_exists(alias, original))
            }
        }
    }
}
