// ==========================================
// 安保业务后台 - 导入批次日志 Repository
// ==========================================
// 职责: 记录每次导入/预览的批次摘要与完整报告
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import_report::{ImportBatch, ImportReport, ImportSummary};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// ImportBatchRepository Trait
// ==========================================
// 实现者: ImportBatchRepositoryImpl（rusqlite）、MemoryImportBatchRepository（测试）
#[async_trait]
pub trait ImportBatchRepository: Send + Sync {
    /// 记录一个批次
    ///
    /// # 参数
    /// - report: 批次报告
    /// - source: 来源描述（文件名 / http）
    async fn insert_batch(&self, report: &ImportReport, source: Option<&str>) -> RepositoryResult<()>;

    /// 最近的批次（按开始时间倒序）
    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>>;

    /// 读取批次完整报告
    async fn find_report(&self, batch_id: &str) -> RepositoryResult<Option<ImportReport>>;
}

fn to_batch(report: &ImportReport, source: Option<&str>) -> ImportBatch {
    ImportBatch {
        batch_id: report.batch_id.clone(),
        entity_type: report.entity_type.storage_name().to_string(),
        mode: report.mode.to_string(),
        source: source.map(str::to_string),
        summary: report.summary(),
        aborted: report.aborted,
        started_at: report.started_at.to_rfc3339(),
        elapsed_ms: report.elapsed_ms(),
    }
}

// ==========================================
// ImportBatchRepositoryImpl
// ==========================================
pub struct ImportBatchRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportBatchRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 在阻塞线程池上执行连接操作
    async fn with_conn<T, F>(&self, op: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> RepositoryResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            op(&guard)
        })
        .await
        .map_err(|e| RepositoryError::InternalError(format!("任务执行失败: {}", e)))?
    }
}

#[async_trait]
impl ImportBatchRepository for ImportBatchRepositoryImpl {
    async fn insert_batch(&self, report: &ImportReport, source: Option<&str>) -> RepositoryResult<()> {
        let batch = to_batch(report, source);
        let report_json = serde_json::to_string(report)?;
        let finished_at = report.finished_at.to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO import_batch (
                    batch_id, entity_type, mode, source,
                    total_rows, inserted, updated, duplicates, failed, cancelled,
                    aborted, started_at, finished_at, elapsed_ms, report_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                "#,
                params![
                    batch.batch_id,
                    batch.entity_type,
                    batch.mode,
                    batch.source,
                    batch.summary.total_rows as i64,
                    batch.summary.inserted as i64,
                    batch.summary.updated as i64,
                    batch.summary.duplicates as i64,
                    batch.summary.failed as i64,
                    batch.summary.cancelled as i64,
                    batch.aborted as i32,
                    batch.started_at,
                    finished_at,
                    batch.elapsed_ms,
                    report_json,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT
                    batch_id, entity_type, mode, source,
                    total_rows, inserted, updated, duplicates, failed, cancelled,
                    aborted, started_at, elapsed_ms
                FROM import_batch
                ORDER BY started_at DESC
                LIMIT ?1
                "#,
            )?;

            let batches = stmt
                .query_map(params![limit as i64], |row| {
                    Ok(ImportBatch {
                        batch_id: row.get(0)?,
                        entity_type: row.get(1)?,
                        mode: row.get(2)?,
                        source: row.get(3)?,
                        summary: ImportSummary {
                            total_rows: row.get::<_, i64>(4)? as usize,
                            inserted: row.get::<_, i64>(5)? as usize,
                            updated: row.get::<_, i64>(6)? as usize,
                            duplicates: row.get::<_, i64>(7)? as usize,
                            failed: row.get::<_, i64>(8)? as usize,
                            cancelled: row.get::<_, i64>(9)? as usize,
                        },
                        aborted: row.get::<_, i32>(10)? != 0,
                        started_at: row.get(11)?,
                        elapsed_ms: row.get(12)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(batches)
        })
        .await
    }

    async fn find_report(&self, batch_id: &str) -> RepositoryResult<Option<ImportReport>> {
        let batch_id = batch_id.to_string();
        let json: Option<String> = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT report_json FROM import_batch WHERE batch_id = ?1",
                        params![batch_id],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

// ==========================================
// MemoryImportBatchRepository
// ==========================================
#[derive(Default)]
pub struct MemoryImportBatchRepository {
    batches: Mutex<Vec<(ImportBatch, ImportReport)>>,
}

impl MemoryImportBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImportBatchRepository for MemoryImportBatchRepository {
    async fn insert_batch(&self, report: &ImportReport, source: Option<&str>) -> RepositoryResult<()> {
        let mut batches = self
            .batches
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        batches.push((to_batch(report, source), report.clone()));
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let batches = self
            .batches
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(batches.iter().rev().take(limit).map(|(b, _)| b.clone()).collect())
    }

    async fn find_report(&self, batch_id: &str) -> RepositoryResult<Option<ImportReport>> {
        let batches = self
            .batches
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(batches
            .iter()
            .find(|(b, _)| b.batch_id == batch_id)
            .map(|(_, r)| r.clone()))
    }
}
