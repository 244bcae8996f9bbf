// ==========================================
// 安保业务后台 - 字段映射器实现
// ==========================================
// 职责: 原始行 → 规范化载荷（别名解析 + 类型转换 + 编码快捷解析）
// 红线: 只读，不写存储；越过映射器的数据必须是类型化的
// ==========================================

use crate::domain::schema::{schema_for, FieldSpec, ShortcutRule};
use crate::domain::types::{CanonicalPayload, EntityType, FieldValue, ID_FIELD};
use crate::importer::coercion::{coerce, to_text, CellValue, RawRow};
use crate::importer::error::MapError;
use crate::repository::storage::{Filter, TableStorage};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub struct FieldMapper {
    storage: Arc<dyn TableStorage>,
}

impl FieldMapper {
    pub fn new(storage: Arc<dyn TableStorage>) -> Self {
        Self { storage }
    }

    /// 映射一行
    ///
    /// # 规则
    /// 1. 每个字段按 规范名 → 别名 顺序取第一个出现的列（即使为空）
    /// 2. 按字段语义类型转换
    /// 3. 外键列: 合法 UUID 优先；否则按编码列查找目标记录
    /// 4. 必填字段为空 → MapError::Mapping
    ///
    /// # 返回
    /// - Ok(CanonicalPayload): 覆盖全部模式字段
    /// - Err(MapError::Storage): 编码查找时存储失败
    pub async fn map(&self, entity: EntityType, row: &RawRow) -> Result<CanonicalPayload, MapError> {
        let schema = schema_for(entity);
        let mut payload = CanonicalPayload::new();

        for spec in schema.fields {
            let mut value = lookup_cell(row, spec)
                .map(|cell| coerce(spec.field_type, cell))
                .unwrap_or(FieldValue::Null);

            if let Some(rule) = schema.shortcut_for(spec.name) {
                value = self.resolve_shortcut(rule, value, row).await?;
            }

            if spec.is_required() && value.is_null() {
                return Err(MapError::mapping(spec.name, "必填字段缺失"));
            }
            payload.insert(spec.name.to_string(), value);
        }

        Ok(payload)
    }

    /// 编码快捷解析
    ///
    /// - UUID 列已是合法 UUID: 原样保留，不查询
    /// - 存在编码: 在目标表按编码字段查找（limit 1），找不到即映射失败
    /// - 均不存在: 保留原值（空值或格式错误的 UUID 交给后续校验）
    async fn resolve_shortcut(
        &self,
        rule: &ShortcutRule,
        value: FieldValue,
        row: &RawRow,
    ) -> Result<FieldValue, MapError> {
        if let FieldValue::Text(raw) = &value {
            if Uuid::parse_str(raw).is_ok() {
                return Ok(value);
            }
        }

        let code = rule
            .code_headers
            .iter()
            .find_map(|header| row.get(*header))
            .and_then(to_text);
        let Some(code) = code else {
            return Ok(value);
        };

        let table = rule.lookup.storage_name();
        let filter = Filter::all()
            .eq(rule.lookup_field, Value::String(code.clone()))
            .limit(1);
        let rows = self.storage.select(table, &filter).await?;

        match rows
            .first()
            .and_then(|r| r.get(ID_FIELD))
            .and_then(Value::as_str)
        {
            Some(id) => {
                debug!(field = rule.field, code = %code, id = %id, "编码解析成功");
                Ok(FieldValue::Text(id.to_string()))
            }
            None => Err(MapError::mapping(
                rule.field,
                format!("编码 {} 在 {} 中不存在", code, table),
            )),
        }
    }
}

/// 取字段对应单元格: 第一个出现的候选列名胜出（即使为空）
fn lookup_cell<'a>(row: &'a RawRow, spec: &FieldSpec) -> Option<&'a CellValue> {
    spec.header_candidates().find_map(|header| row.get(header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory_storage::MemoryStorage;
    use chrono::NaiveDate;
    use serde_json::json;

    fn raw(pairs: &[(&str, CellValue)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn mapper() -> (Arc<MemoryStorage>, FieldMapper) {
        let storage = Arc::new(MemoryStorage::new());
        let mapper = FieldMapper::new(storage.clone());
        (storage, mapper)
    }

    #[tokio::test]
    async fn test_map_client_with_aliases() {
        let (_storage, mapper) = mapper();
        let row = raw(&[
            ("Ragione Sociale", text("  Acme Srl ")),
            ("Città", text("Roma")),
            ("Attivo", text("Sì")),
            ("Data Inizio Contratto", text("15/01/2024")),
            ("colonna_extra", text("ignorata")),
        ]);
        let payload = mapper.map(EntityType::Client, &row).await.unwrap();

        assert_eq!(payload["ragione_sociale"], FieldValue::Text("Acme Srl".to_string()));
        assert_eq!(payload["citta"], FieldValue::Text("Roma".to_string()));
        assert_eq!(payload["attivo"], FieldValue::Bool(true));
        assert_eq!(
            payload["data_inizio_contratto"],
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(payload["partita_iva"], FieldValue::Null);
        assert_eq!(payload.len(), schema_for(EntityType::Client).fields.len());
    }

    #[tokio::test]
    async fn test_first_present_alias_wins_even_if_blank() {
        let (_storage, mapper) = mapper();
        let row = raw(&[
            ("ragione_sociale", text("Acme")),
            ("citta", text("   ")),
            ("Città", text("Roma")),
        ]);
        let payload = mapper.map(EntityType::Client, &row).await.unwrap();
        assert_eq!(payload["citta"], FieldValue::Null);
    }

    #[tokio::test]
    async fn test_required_field_missing() {
        let (_storage, mapper) = mapper();
        let row = raw(&[("citta", text("Roma"))]);
        let err = mapper.map(EntityType::Client, &row).await.unwrap_err();
        assert_eq!(
            err,
            MapError::Mapping {
                field: "ragione_sociale".to_string(),
                reason: "必填字段缺失".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_code_shortcut_resolves_uuid() {
        let (storage, mapper) = mapper();
        let client_id = storage.seed(
            "clienti",
            json!({"codice_cliente": "C001", "ragione_sociale": "Acme"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let row = raw(&[
            ("Codice Cliente", text("C001")),
            ("nome_punto_servizio", text("Magazzino Nord")),
        ]);
        let payload = mapper.map(EntityType::ServicePoint, &row).await.unwrap();
        assert_eq!(payload["id_cliente"], FieldValue::Text(client_id));
    }

    #[tokio::test]
    async fn test_valid_uuid_skips_lookup() {
        let (storage, mapper) = mapper();
        let id = Uuid::new_v4().to_string();
        let row = raw(&[
            ("id_cliente", text(&id)),
            ("codice_cliente", text("C999")),
            ("nome_punto_servizio", text("Sede")),
        ]);
        let payload = mapper.map(EntityType::ServicePoint, &row).await.unwrap();
        assert_eq!(payload["id_cliente"], FieldValue::Text(id));
        assert!(storage.select_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_code_is_mapping_error() {
        let (_storage, mapper) = mapper();
        let row = raw(&[
            ("codice_cliente", text("NOPE")),
            ("nome_punto_servizio", text("Sede")),
        ]);
        let err = mapper.map(EntityType::ServicePoint, &row).await.unwrap_err();
        assert!(matches!(err, MapError::Mapping { ref field, .. } if field == "id_cliente"));
    }

    #[tokio::test]
    async fn test_malformed_uuid_without_code_passes_through() {
        let (_storage, mapper) = mapper();
        let row = raw(&[
            ("id_cliente", text("non-un-uuid")),
            ("nome_punto_servizio", text("Sede")),
        ]);
        let payload = mapper.map(EntityType::ServicePoint, &row).await.unwrap();
        assert_eq!(payload["id_cliente"], FieldValue::Text("non-un-uuid".to_string()));
    }

    #[tokio::test]
    async fn test_lookup_storage_failure_is_storage_error() {
        let (storage, mapper) = mapper();
        storage.set_fail_reads(true);
        let row = raw(&[
            ("codice_cliente", text("C001")),
            ("nome_punto_servizio", text("Sede")),
        ]);
        let err = mapper.map(EntityType::ServicePoint, &row).await.unwrap_err();
        assert!(matches!(err, MapError::Storage(_)));
    }
}
