// ==========================================
// 安保业务后台 - 导入API
// ==========================================
// 职责: 校验实体白名单 → 行数据转换 → 编排器执行 → 批次日志
// 红线:
// - 实体类型不在白名单 → 400；行不是 JSON 对象 → 400
// - 批次日志写入失败是批次级错误（500），不降级为行错误
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import_report::{ImportBatch, ImportMode, ImportReport};
use crate::domain::types::EntityType;
use crate::i18n::t_with_args;
use crate::importer::coercion::{CellValue, RawRow, SourceRow};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::orchestrator::{CancelFlag, ImportOrchestrator};
use crate::repository::import_batch_repo::ImportBatchRepository;
use crate::repository::storage::TableStorage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 批次日志列表上限
pub const MAX_BATCH_LIST_LIMIT: usize = 200;

/// 导入请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub entity_type: String,
    pub data: Vec<Value>,
}

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 用户可读摘要（本地化）
    pub message: String,
    /// 行级报告
    pub report: ImportReport,
}

/// 解析实体类型（白名单 = 注册表中的全部存储名）
pub fn resolve_entity_type(entity_type: &str) -> ApiResult<EntityType> {
    EntityType::from_storage_name(entity_type.trim()).ok_or_else(|| {
        ApiError::EntityNotAllowed(t_with_args(
            "import.entity_not_allowed",
            &[("entity", entity_type)],
        ))
    })
}

/// JSON 行 → 原始行
pub fn rows_from_json(data: &[Value]) -> ApiResult<Vec<RawRow>> {
    data.iter()
        .enumerate()
        .map(|(idx, item)| match item {
            Value::Object(map) => Ok(map
                .iter()
                .map(|(k, v)| (k.trim().to_string(), CellValue::from_json(v)))
                .collect()),
            _ => Err(ApiError::InvalidInput(format!(
                "第 {} 行不是 JSON 对象",
                idx + 1
            ))),
        })
        .collect()
}

/// 导入API
pub struct ImportApi {
    orchestrator: ImportOrchestrator,
    batch_repo: Arc<dyn ImportBatchRepository>,
    batch_timeout: Option<Duration>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    ///
    /// # 参数
    /// - storage: 表存储
    /// - batch_repo: 批次日志仓储
    /// - batch_timeout: 批次超时（None 表示不限时）
    pub fn new(
        storage: Arc<dyn TableStorage>,
        batch_repo: Arc<dyn ImportBatchRepository>,
        batch_timeout: Option<Duration>,
    ) -> Self {
        Self {
            orchestrator: ImportOrchestrator::new(storage),
            batch_repo,
            batch_timeout,
        }
    }

    /// 导入 JSON 行数据
    ///
    /// # 参数
    /// - entity_type: 实体存储名（白名单校验）
    /// - data: 行对象数组
    /// - mode: Apply 写入 / Preview 仅判定
    pub async fn import_data(
        &self,
        entity_type: &str,
        data: &[Value],
        mode: ImportMode,
    ) -> ApiResult<ImportApiResponse> {
        let entity = resolve_entity_type(entity_type)?;
        let rows = SourceRow::numbered(rows_from_json(data)?);
        self.run_batch(entity, rows, mode, Some("http")).await
    }

    /// 导入表格文件字节
    ///
    /// # 参数
    /// - entity_type: 实体存储名
    /// - format: 文件格式（xlsx / xls / csv）
    /// - bytes: 文件内容
    pub async fn import_file(
        &self,
        entity_type: &str,
        format: &str,
        bytes: &[u8],
    ) -> ApiResult<ImportApiResponse> {
        let entity = resolve_entity_type(entity_type)?;
        let rows = UniversalFileParser.parse_bytes(format, bytes)?;
        info!(entity = %entity, format, rows = rows.len(), "文件解析完成");
        let source = format!("upload.{}", format.trim().trim_start_matches('.'));
        self.run_batch(entity, rows, ImportMode::Apply, Some(&source))
            .await
    }

    /// 最近的导入批次
    pub async fn list_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        let limit = limit.clamp(1, MAX_BATCH_LIST_LIMIT);
        Ok(self.batch_repo.list_recent(limit).await?)
    }

    /// 执行批次并记录日志
    pub async fn run_batch(
        &self,
        entity: EntityType,
        rows: Vec<SourceRow>,
        mode: ImportMode,
        source: Option<&str>,
    ) -> ApiResult<ImportApiResponse> {
        let cancel = CancelFlag::new();
        let watchdog = self.batch_timeout.map(|timeout| {
            let flag = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "导入批次超时，取消剩余行");
                flag.cancel();
            })
        });

        let report = self.orchestrator.run(entity, &rows, mode, &cancel).await;
        if let Some(handle) = watchdog {
            handle.abort();
        }

        self.batch_repo.insert_batch(&report, source).await?;

        Ok(ImportApiResponse {
            message: summary_message(&report),
            report,
        })
    }
}

/// 批次摘要（本地化）
pub fn summary_message(report: &ImportReport) -> String {
    let summary = report.summary();
    let entity = report.entity_type.storage_name();

    if report.aborted {
        return t_with_args(
            "import.aborted",
            &[("entity", entity), ("cancelled", &summary.cancelled.to_string())],
        );
    }

    let key = match report.mode {
        ImportMode::Apply => "import.completed",
        ImportMode::Preview => "import.preview_completed",
    };
    t_with_args(
        key,
        &[
            ("entity", entity),
            ("inserted", &summary.inserted.to_string()),
            ("updated", &summary.updated.to_string()),
            ("duplicates", &summary.duplicates.to_string()),
            ("failed", &summary.failed.to_string()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import_report::RowStatus;
    use crate::repository::import_batch_repo::MemoryImportBatchRepository;
    use crate::repository::memory_storage::MemoryStorage;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStorage>, Arc<MemoryImportBatchRepository>, ImportApi) {
        let storage = Arc::new(MemoryStorage::new());
        let batches = Arc::new(MemoryImportBatchRepository::new());
        let api = ImportApi::new(storage.clone(), batches.clone(), None);
        (storage, batches, api)
    }

    #[test]
    fn test_resolve_entity_type() {
        assert_eq!(resolve_entity_type("clienti").unwrap(), EntityType::Client);
        assert_eq!(resolve_entity_type(" tariffe ").unwrap(), EntityType::Tariff);
        assert!(matches!(
            resolve_entity_type("utenti"),
            Err(ApiError::EntityNotAllowed(_))
        ));
    }

    #[test]
    fn test_rows_from_json_rejects_non_objects() {
        let rows = rows_from_json(&[json!({"ragione_sociale": "Acme", "cap": 100})]).unwrap();
        assert_eq!(rows[0]["cap"], CellValue::Number(100.0));

        let err = rows_from_json(&[json!({"a": 1}), json!("riga")]).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_import_data_logs_batch() {
        let (storage, batches, api) = setup();
        let data = vec![json!({"codice_cliente": "C1", "ragione_sociale": "Acme"})];
        let response = api
            .import_data("clienti", &data, ImportMode::Apply)
            .await
            .unwrap();

        assert_eq!(response.report.rows[0].status(), RowStatus::Imported);
        assert_eq!(storage.rows("clienti").len(), 1);

        let logged = batches.list_recent(10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].batch_id, response.report.batch_id);
        assert_eq!(logged[0].source.as_deref(), Some("http"));
    }

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let (storage, _batches, api) = setup();
        let data = vec![json!({"codice_cliente": "C1", "ragione_sociale": "Acme"})];
        let response = api
            .import_data("clienti", &data, ImportMode::Preview)
            .await
            .unwrap();
        assert_eq!(response.report.mode, ImportMode::Preview);
        assert!(storage.rows("clienti").is_empty());
    }

    #[tokio::test]
    async fn test_import_file_csv() {
        let (storage, _batches, api) = setup();
        let csv = "codice_cliente,ragione_sociale\nC1,Acme\nC2,Beta\n";
        let response = api
            .import_file("clienti", "csv", csv.as_bytes())
            .await
            .unwrap();
        assert_eq!(response.report.summary().inserted, 2);
        assert_eq!(storage.rows("clienti").len(), 2);
    }

    #[tokio::test]
    async fn test_import_file_reports_sheet_row_numbers() {
        let (_storage, _batches, api) = setup();
        let csv = "ragione_sociale,citta\nAcme,Roma\n,\n,Milano\n";
        let response = api
            .import_file("clienti", "csv", csv.as_bytes())
            .await
            .unwrap();
        let rows = &response.report.rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_index, 1);
        assert_eq!(rows[0].status(), RowStatus::Imported);
        assert_eq!(rows[1].row_index, 3);
        assert_eq!(rows[1].status(), RowStatus::Failed);
    }

    #[tokio::test]
    async fn test_import_file_unsupported_format() {
        let (_storage, _batches, api) = setup();
        let err = api.import_file("clienti", "pdf", b"x").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }
}
