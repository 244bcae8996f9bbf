// ==========================================
// 安保业务后台 - 导入编排器
// ==========================================
// 职责: 整合导入流程，从原始行到存储
// 流程: 映射 → 外键校验 → 对账 → 写入（NEW 插入 / UPDATE 更新 / DUPLICATE 跳过）
// 红线:
// - 行严格按输入顺序串行处理（同批次两行指向同一实体时不能都判为 NEW）
// - 单行失败不中断批次；每个输入行恰好产生一条结果
// - 取消只在行与行之间生效，已写入的行保持提交
// ==========================================

use crate::domain::import_report::{
    ImportMode, ImportReport, ImportRowResult, RowFailure, RowOutcome, Verdict,
};
use crate::domain::schema::schema_for;
use crate::domain::types::{
    CanonicalPayload, EntityType, CREATED_AT, STORAGE_DATETIME_FORMAT, UPDATED_AT,
};
use crate::importer::coercion::{RawRow, SourceRow};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::fk_validator::ForeignKeyValidator;
use crate::importer::reconciler::Reconciler;
use crate::repository::storage::{StorageRow, TableStorage};
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// CancelFlag - 批次取消标志
// ==========================================
// 调用方（超时任务 / 客户端断开）置位，编排器在行间检查
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ==========================================
// ImportOrchestrator - 导入编排器
// ==========================================
pub struct ImportOrchestrator {
    // 数据访问层
    storage: Arc<dyn TableStorage>,

    // 导入组件
    mapper: FieldMapper,
    validator: ForeignKeyValidator,
    reconciler: Reconciler,
}

impl ImportOrchestrator {
    /// 创建编排器（各组件共享同一存储）
    pub fn new(storage: Arc<dyn TableStorage>) -> Self {
        Self {
            mapper: FieldMapper::new(storage.clone()),
            validator: ForeignKeyValidator::new(storage.clone()),
            reconciler: Reconciler::new(storage.clone()),
            storage,
        }
    }

    /// 导入一批行（写入模式，不可取消，按输入顺序编号）
    pub async fn import_rows(&self, entity: EntityType, rows: &[RawRow]) -> ImportReport {
        let rows = SourceRow::numbered(rows.to_vec());
        self.run(entity, &rows, ImportMode::Apply, &CancelFlag::new())
            .await
    }

    /// 执行一个批次
    ///
    /// # 参数
    /// - entity: 目标实体
    /// - rows: 带原始行号的行（顺序即处理顺序）
    /// - mode: Apply 写入 / Preview 仅判定
    /// - cancel: 取消标志
    ///
    /// # 返回
    /// - ImportReport: rows.len() 条行级结果；取消时 aborted = true
    #[instrument(skip_all, fields(entity = %entity, mode = %mode, total = rows.len(), batch_id))]
    pub async fn run(
        &self,
        entity: EntityType,
        rows: &[SourceRow],
        mode: ImportMode,
        cancel: &CancelFlag,
    ) -> ImportReport {
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        let started_at = Utc::now();
        info!(batch_id = %batch_id, "开始导入批次");

        let mut results = Vec::with_capacity(rows.len());
        let mut aborted = false;

        for row in rows {
            let row_index = row.row_index;
            // 行间让出，超时任务得以在单线程运行时上置位
            tokio::task::yield_now().await;
            if aborted || cancel.is_cancelled() {
                if !aborted {
                    warn!(row_index, "批次已取消，剩余行不再处理");
                    aborted = true;
                }
                results.push(ImportRowResult {
                    row_index,
                    entity_type: entity,
                    verdict: None,
                    outcome: RowOutcome::Cancelled,
                });
                continue;
            }

            let result = self.process_row(entity, row_index, &row.cells, mode).await;
            if let Some(failure) = result.failure() {
                warn!(row_index, error = %failure, "行导入失败");
            }
            results.push(result);
        }

        let report = ImportReport {
            batch_id,
            entity_type: entity,
            mode,
            aborted,
            started_at,
            finished_at: Utc::now(),
            rows: results,
        };

        let summary = report.summary();
        info!(
            batch_id = %report.batch_id,
            inserted = summary.inserted,
            updated = summary.updated,
            duplicates = summary.duplicates,
            failed = summary.failed,
            cancelled = summary.cancelled,
            elapsed_ms = report.elapsed_ms(),
            "导入批次完成"
        );
        report
    }

    /// 处理单行: 映射 → 外键校验 → 对账 → 写入
    async fn process_row(
        &self,
        entity: EntityType,
        row_index: usize,
        row: &RawRow,
        mode: ImportMode,
    ) -> ImportRowResult {
        let failed = |verdict: Option<Verdict>, failure: RowFailure| ImportRowResult {
            row_index,
            entity_type: entity,
            verdict,
            outcome: RowOutcome::Failed { failure },
        };

        debug!(row_index, "步骤 1: 字段映射");
        let payload = match self.mapper.map(entity, row).await {
            Ok(payload) => payload,
            Err(e) => return failed(None, e.into()),
        };

        debug!(row_index, "步骤 2: 外键校验");
        if let Err(e) = self.validator.validate(entity, &payload).await {
            return failed(None, e.into());
        }

        debug!(row_index, "步骤 3: 唯一键对账");
        let verdict = match self.reconciler.reconcile(entity, &payload).await {
            Ok(verdict) => verdict,
            Err(e) => return failed(None, e.into()),
        };

        if mode == ImportMode::Preview {
            let record_id = verdict.matched_id().map(str::to_string);
            return ImportRowResult {
                row_index,
                entity_type: entity,
                verdict: Some(verdict),
                outcome: RowOutcome::Success { record_id },
            };
        }

        debug!(row_index, verdict = ?verdict, "步骤 4: 写入");
        match self.apply(entity, &verdict, &payload).await {
            Ok(record_id) => ImportRowResult {
                row_index,
                entity_type: entity,
                verdict: Some(verdict),
                outcome: RowOutcome::Success {
                    record_id: Some(record_id),
                },
            },
            Err(failure) => failed(Some(verdict), failure),
        }
    }

    /// 按对账结论写入存储，返回受影响记录 id
    async fn apply(
        &self,
        entity: EntityType,
        verdict: &Verdict,
        payload: &CanonicalPayload,
    ) -> Result<String, RowFailure> {
        let table = schema_for(entity).table();
        let now = Value::String(Utc::now().naive_utc().format(STORAGE_DATETIME_FORMAT).to_string());

        match verdict {
            Verdict::New => {
                let mut record = to_storage_row(payload);
                record.insert(CREATED_AT.to_string(), now.clone());
                record.insert(UPDATED_AT.to_string(), now);
                Ok(self.storage.insert(table, record).await?)
            }
            Verdict::Update { id, .. } => {
                // 全量载荷更新，只刷新 updated_at
                let mut record = to_storage_row(payload);
                record.insert(UPDATED_AT.to_string(), now);
                self.storage.update(table, id, record).await?;
                Ok(id.clone())
            }
            Verdict::Duplicate { id } => Ok(id.clone()),
        }
    }
}

fn to_storage_row(payload: &CanonicalPayload) -> StorageRow {
    payload
        .iter()
        .map(|(field, value)| (field.clone(), value.to_storage_value()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import_report::RowStatus;
    use crate::importer::coercion::CellValue;
    use crate::repository::error::RepositoryResult;
    use crate::repository::memory_storage::MemoryStorage;
    use crate::repository::storage::Filter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// 第 k 次插入成功后置位取消标志的存储
    struct CancelAfterInserts {
        inner: MemoryStorage,
        cancel: CancelFlag,
        after: usize,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl TableStorage for CancelAfterInserts {
        async fn select(&self, table: &str, filter: &Filter) -> RepositoryResult<Vec<StorageRow>> {
            self.inner.select(table, filter).await
        }

        async fn insert(&self, table: &str, payload: StorageRow) -> RepositoryResult<String> {
            let id = self.inner.insert(table, payload).await?;
            if self.inserts.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
                self.cancel.cancel();
            }
            Ok(id)
        }

        async fn update(&self, table: &str, id: &str, payload: StorageRow) -> RepositoryResult<()> {
            self.inner.update(table, id, payload).await
        }

        async fn delete(&self, table: &str, id: &str) -> RepositoryResult<()> {
            self.inner.delete(table, id).await
        }
    }

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::Text(v.to_string())))
            .collect()
    }

    fn setup() -> (Arc<MemoryStorage>, ImportOrchestrator) {
        let storage = Arc::new(MemoryStorage::new());
        let orchestrator = ImportOrchestrator::new(storage.clone());
        (storage, orchestrator)
    }

    #[tokio::test]
    async fn test_new_row_inserted_with_timestamps() {
        let (storage, orchestrator) = setup();
        let rows = vec![raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme")])];
        let report = orchestrator.import_rows(EntityType::Client, &rows).await;

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].status(), RowStatus::Imported);
        let stored = storage.rows("clienti");
        assert_eq!(stored.len(), 1);
        assert!(stored[0]["created_at"].is_string());
        assert_eq!(stored[0]["created_at"], stored[0]["updated_at"]);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let (storage, orchestrator) = setup();
        storage.seed(
            "clienti",
            json!({
                "codice_cliente": "C1",
                "ragione_sociale": "Acme",
                "citta": "Roma",
                "created_at": "2020-01-01T00:00:00",
                "updated_at": "2020-01-01T00:00:00"
            })
            .as_object()
            .cloned()
            .unwrap(),
        );
        let rows = vec![raw(&[
            ("codice_cliente", "C1"),
            ("ragione_sociale", "Acme"),
            ("citta", "Milano"),
        ])];
        let report = orchestrator.import_rows(EntityType::Client, &rows).await;

        assert_eq!(report.rows[0].status(), RowStatus::Updated);
        let stored = &storage.rows("clienti")[0];
        assert_eq!(stored["citta"], json!("Milano"));
        assert_eq!(stored["created_at"], json!("2020-01-01T00:00:00"));
        assert_ne!(stored["updated_at"], json!("2020-01-01T00:00:00"));
    }

    #[tokio::test]
    async fn test_same_entity_twice_in_batch_is_new_then_duplicate() {
        let (storage, orchestrator) = setup();
        let row = raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme")]);
        let report = orchestrator
            .import_rows(EntityType::Client, &[row.clone(), row])
            .await;
        assert_eq!(report.rows[0].status(), RowStatus::Imported);
        assert_eq!(report.rows[1].status(), RowStatus::Duplicate);
        assert_eq!(storage.rows("clienti").len(), 1);
    }

    #[tokio::test]
    async fn test_row_failure_does_not_stop_batch() {
        let (storage, orchestrator) = setup();
        let rows = vec![
            raw(&[("citta", "Roma")]),
            raw(&[("codice_cliente", "C2"), ("ragione_sociale", "Beta")]),
        ];
        let report = orchestrator.import_rows(EntityType::Client, &rows).await;
        assert_eq!(report.rows[0].status(), RowStatus::Failed);
        assert!(matches!(
            report.rows[0].failure(),
            Some(RowFailure::MappingError { field, .. }) if field == "ragione_sociale"
        ));
        assert_eq!(report.rows[1].status(), RowStatus::Imported);
        assert_eq!(storage.rows("clienti").len(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_storage_error_row() {
        let (storage, orchestrator) = setup();
        storage.set_fail_writes(true);
        let rows = vec![raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme")])];
        let report = orchestrator.import_rows(EntityType::Client, &rows).await;
        assert!(matches!(
            report.rows[0].failure(),
            Some(RowFailure::StorageError { .. })
        ));
        assert_eq!(report.rows[0].verdict, Some(Verdict::New));
    }

    #[tokio::test]
    async fn test_preview_never_writes() {
        let (storage, orchestrator) = setup();
        let rows = vec![raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme")])];
        let report = orchestrator
            .run(
                EntityType::Client,
                &SourceRow::numbered(rows),
                ImportMode::Preview,
                &CancelFlag::new(),
            )
            .await;
        assert_eq!(report.rows[0].status(), RowStatus::Imported);
        assert_eq!(report.mode, ImportMode::Preview);
        assert!(storage.rows("clienti").is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_batch_marks_remaining_rows() {
        let (storage, orchestrator) = setup();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let rows = vec![
            raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme")]),
            raw(&[("codice_cliente", "C2"), ("ragione_sociale", "Beta")]),
        ];
        let report = orchestrator
            .run(EntityType::Client, &SourceRow::numbered(rows), ImportMode::Apply, &cancel)
            .await;
        assert!(report.aborted);
        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().all(|r| r.status() == RowStatus::Cancelled));
        assert!(storage.rows("clienti").is_empty());
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let (_storage, orchestrator) = setup();
        let rows = vec![
            raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme"), ("attivo", "sì")]),
            raw(&[("partita_iva", "IT999"), ("ragione_sociale", "Beta"), ("cap", "00100")]),
        ];
        let first = orchestrator.import_rows(EntityType::Client, &rows).await;
        assert_eq!(first.summary().inserted, 2);
        let second = orchestrator.import_rows(EntityType::Client, &rows).await;
        assert!(second.rows.iter().all(|r| r.status() == RowStatus::Duplicate));
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_keeps_completed_rows() {
        let cancel = CancelFlag::new();
        let storage = Arc::new(CancelAfterInserts {
            inner: MemoryStorage::new(),
            cancel: cancel.clone(),
            after: 2,
            inserts: AtomicUsize::new(0),
        });
        let orchestrator = ImportOrchestrator::new(storage.clone());
        let rows = vec![
            raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme")]),
            raw(&[("codice_cliente", "C2"), ("ragione_sociale", "Beta")]),
            raw(&[("codice_cliente", "C3"), ("ragione_sociale", "Gamma")]),
            raw(&[("codice_cliente", "C4"), ("ragione_sociale", "Delta")]),
        ];
        let report = orchestrator
            .run(EntityType::Client, &SourceRow::numbered(rows), ImportMode::Apply, &cancel)
            .await;

        assert!(report.aborted);
        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.rows[0].status(), RowStatus::Imported);
        assert_eq!(report.rows[1].status(), RowStatus::Imported);
        assert_eq!(report.rows[2].status(), RowStatus::Cancelled);
        assert_eq!(report.rows[3].status(), RowStatus::Cancelled);
        assert_eq!(report.rows[2].verdict, None);

        // 已完成的行保持提交
        let stored = storage.inner.rows("clienti");
        assert_eq!(stored.len(), 2);
        let summary = report.summary();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.cancelled, 2);
    }

    #[tokio::test]
    async fn test_row_index_follows_source_rows() {
        let (_storage, orchestrator) = setup();
        let rows = vec![
            SourceRow {
                row_index: 1,
                cells: raw(&[("ragione_sociale", "Acme"), ("citta", "Roma")]),
            },
            SourceRow {
                row_index: 3,
                cells: raw(&[("citta", "Milano")]),
            },
        ];
        let report = orchestrator
            .run(EntityType::Client, &rows, ImportMode::Apply, &CancelFlag::new())
            .await;
        assert_eq!(report.rows[0].row_index, 1);
        assert_eq!(report.rows[1].row_index, 3);
        assert_eq!(report.rows[1].status(), RowStatus::Failed);
    }

    #[tokio::test]
    async fn test_preview_summary_counts_would_be_writes() {
        let (storage, orchestrator) = setup();
        let seeded = storage.seed(
            "clienti",
            json!({"codice_cliente": "C1", "ragione_sociale": "Acme"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let rows = vec![
            raw(&[("codice_cliente", "C1"), ("ragione_sociale", "Acme")]),
            raw(&[("codice_cliente", "C2"), ("ragione_sociale", "Beta")]),
        ];
        let report = orchestrator
            .run(
                EntityType::Client,
                &SourceRow::numbered(rows),
                ImportMode::Preview,
                &CancelFlag::new(),
            )
            .await;
        let summary = report.summary();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(storage.rows("clienti").len(), 1);
        assert_eq!(
            report.rows[0].outcome,
            RowOutcome::Success {
                record_id: Some(seeded)
            }
        );
        assert_eq!(report.rows[1].outcome, RowOutcome::Success { record_id: None });
    }
}
