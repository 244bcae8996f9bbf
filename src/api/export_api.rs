// ==========================================
// 安保业务后台 - 导出API
// ==========================================
// 职责: 校验实体白名单 → 导出整张表为 .xlsx
// ==========================================

use crate::api::error::ApiResult;
use crate::api::import_api::resolve_entity_type;
use crate::exporter::export_codec::{export_table, ExportOutcome};
use crate::i18n::t_with_args;
use crate::repository::storage::TableStorage;
use std::sync::Arc;

/// 导出API
pub struct ExportApi {
    storage: Arc<dyn TableStorage>,
}

impl ExportApi {
    /// 创建新的ExportApi实例
    pub fn new(storage: Arc<dyn TableStorage>) -> Self {
        Self { storage }
    }

    /// 导出实体表
    ///
    /// # 返回
    /// - Ok(ExportOutcome::Workbook): 文件名与 .xlsx 字节
    /// - Ok(ExportOutcome::Empty): 表中无数据
    /// - Err(ApiError): 实体不在白名单 / 存储失败 / 写出失败
    pub async fn export_data(&self, entity_type: &str) -> ApiResult<ExportOutcome> {
        let entity = resolve_entity_type(entity_type)?;
        Ok(export_table(entity, self.storage.as_ref()).await?)
    }
}

/// 空表提示（本地化）
pub fn nothing_to_export_message(entity_type: &str) -> String {
    t_with_args("export.nothing_to_export", &[("entity", entity_type.trim())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ApiError;
    use crate::repository::memory_storage::MemoryStorage;
    use serde_json::json;

    #[tokio::test]
    async fn test_export_empty_and_populated() {
        let storage = Arc::new(MemoryStorage::new());
        let api = ExportApi::new(storage.clone());

        assert_eq!(api.export_data("fornitori").await.unwrap(), ExportOutcome::Empty);

        storage.seed(
            "fornitori",
            json!({"ragione_sociale": "Vigilanza Srl"}).as_object().cloned().unwrap(),
        );
        match api.export_data("fornitori").await.unwrap() {
            ExportOutcome::Workbook { filename, bytes } => {
                assert_eq!(filename, "fornitori_export.xlsx");
                assert!(!bytes.is_empty());
            }
            ExportOutcome::Empty => panic!("expected workbook"),
        }
    }

    #[tokio::test]
    async fn test_export_rejects_unknown_entity() {
        let api = ExportApi::new(Arc::new(MemoryStorage::new()));
        let err = api.export_data("utenti").await.unwrap_err();
        assert!(matches!(err, ApiError::EntityNotAllowed(_)));
    }

    #[tokio::test]
    async fn test_export_storage_failure() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_fail_reads(true);
        let api = ExportApi::new(storage);
        let err = api.export_data("clienti").await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
