use crate::storage::UrlRecord;
use crate::utils::original_fingerprint;
use migration::entities::short_url;

pub fn model_to_record(model: short_url::Model) -> UrlRecord {
    UrlRecord {
        original: model.original_url,
        alias: model.alias,
        owner: model.owner,
        deleted: model.deleted,
        created_at: model.created_at,
    }
}

/// 新记录的 ActiveModel，`original_hash` 在此计算
pub fn record_to_active_model(record: &UrlRecord) -> short_url::ActiveModel {
    use sea_orm::ActiveValue::Set;

    short_url::ActiveModel {
        alias: Set(record.alias.clone()),
        original_url: Set(record.original.clone()),
        original_hash: Set(original_fingerprint(&record.original)),
        owner: Set(record.owner.clone()),
        deleted: Set(record.deleted),
        created_at: Set(record.created_at),
    }
}
