// ==========================================
// 安保业务后台 - 唯一键对账引擎
// ==========================================
// 职责: 判定一行是 NEW / UPDATE / DUPLICATE
// 规则:
// - 候选键集按声明顺序尝试，首个成员全部非空者生效
// - 生效候选查无记录即 NEW，不再尝试后续候选
// - 差异比较按字段语义类型进行，忽略 created_at / updated_at
// ==========================================

use crate::domain::import_report::Verdict;
use crate::domain::schema::{schema_for, EntitySchema};
use crate::domain::types::{CanonicalPayload, EntityType, FieldValue, ID_FIELD};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::storage::{Filter, StorageRow, TableStorage};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct Reconciler {
    storage: Arc<dyn TableStorage>,
}

impl Reconciler {
    pub fn new(storage: Arc<dyn TableStorage>) -> Self {
        Self { storage }
    }

    pub async fn reconcile(
        &self,
        entity: EntityType,
        payload: &CanonicalPayload,
    ) -> RepositoryResult<Verdict> {
        let schema = schema_for(entity);

        let Some(key_set) = first_usable_candidate(schema, payload) else {
            debug!(entity = %entity, "无可用唯一键候选，判定为 NEW");
            return Ok(Verdict::New);
        };

        let filter = key_set
            .iter()
            .fold(Filter::all(), |filter, field| {
                let value = payload
                    .get(*field)
                    .map(FieldValue::to_storage_value)
                    .unwrap_or(Value::Null);
                filter.eq(*field, value)
            })
            .limit(1);

        let rows = self.storage.select(schema.table(), &filter).await?;
        let Some(existing) = rows.into_iter().next() else {
            return Ok(Verdict::New);
        };

        let id = existing
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RepositoryError::InternalError(format!("{} 记录缺少 id", schema.table()))
            })?;

        let updated_fields = diff_fields(schema, payload, &existing);
        debug!(entity = %entity, key = ?key_set, id = %id, changed = updated_fields.len(), "对账命中");
        if updated_fields.is_empty() {
            Ok(Verdict::Duplicate { id })
        } else {
            Ok(Verdict::Update { id, updated_fields })
        }
    }
}

/// 首个成员全部非空的候选键集
fn first_usable_candidate(
    schema: &EntitySchema,
    payload: &CanonicalPayload,
) -> Option<&'static [&'static str]> {
    schema.unique_keys.iter().copied().find(|set| {
        set.iter()
            .all(|field| payload.get(*field).map(|v| !v.is_null()).unwrap_or(false))
    })
}

/// 差异字段（按模式字段顺序；记账字段不在模式内，天然被排除）
fn diff_fields(schema: &EntitySchema, payload: &CanonicalPayload, existing: &StorageRow) -> Vec<String> {
    schema
        .fields
        .iter()
        .filter_map(|spec| {
            let incoming = payload.get(spec.name)?;
            let stored = existing
                .get(spec.name)
                .map(|v| FieldValue::from_stored(spec.field_type, v))
                .unwrap_or(FieldValue::Null);
            if *incoming != stored {
                Some(spec.name.to_string())
            } else {
                None
            }
        })
        .collect()
}
