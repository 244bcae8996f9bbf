// ==========================================
// 安保业务后台 - 外键校验器
// ==========================================
// 职责: 写入前校验载荷中的外键引用是否存在
// 规则: 按规则声明顺序逐个检查，首个缺失即返回；空外键视为合法
// ==========================================

use crate::domain::schema::schema_for;
use crate::domain::types::{CanonicalPayload, EntityType, FieldValue, ID_FIELD};
use crate::importer::error::FkCheckError;
use crate::repository::storage::{Filter, TableStorage};
use std::sync::Arc;

pub struct ForeignKeyValidator {
    storage: Arc<dyn TableStorage>,
}

impl ForeignKeyValidator {
    pub fn new(storage: Arc<dyn TableStorage>) -> Self {
        Self { storage }
    }

    pub async fn validate(
        &self,
        entity: EntityType,
        payload: &CanonicalPayload,
    ) -> Result<(), FkCheckError> {
        for rule in schema_for(entity).foreign_keys {
            let value = match payload.get(rule.field) {
                None | Some(FieldValue::Null) => continue,
                Some(value) => value,
            };

            let ref_table = rule.references.storage_name();
            let filter = Filter::all()
                .eq(ID_FIELD, value.to_storage_value())
                .limit(1);
            let rows = self.storage.select(ref_table, &filter).await?;
            if rows.is_empty() {
                return Err(FkCheckError::Violation {
                    field: rule.field.to_string(),
                    value: value.to_string(),
                    ref_table: ref_table.to_string(),
                });
            }
        }
        Ok(())
    }
}
