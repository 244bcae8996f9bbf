// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use backoffice_sync::db::{init_schema, open_sqlite_connection};
use backoffice_sync::domain::import_report::{ImportReport, RowStatus};
use backoffice_sync::importer::{CellValue, RawRow};
use backoffice_sync::logging;
use backoffice_sync::repository::{ImportBatchRepositoryImpl, SqliteStorage};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    logging::init_test();
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_string_lossy().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 测试用存储组件（共享同一连接）
pub struct TestStores {
    pub conn: Arc<Mutex<Connection>>,
    pub storage: Arc<SqliteStorage>,
    pub batches: Arc<ImportBatchRepositoryImpl>,
}

/// 打开测试数据库上的存储组件
pub fn open_stores(db_path: &str) -> Result<TestStores, Box<dyn Error>> {
    let conn = Arc::new(Mutex::new(open_sqlite_connection(db_path)?));
    Ok(TestStores {
        storage: Arc::new(SqliteStorage::from_connection(conn.clone())),
        batches: Arc::new(ImportBatchRepositoryImpl::from_connection(conn.clone())),
        conn,
    })
}

/// 构造文本原始行
pub fn raw_row(pairs: &[(&str, &str)]) -> RawRow {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), CellValue::Text(v.to_string())))
        .collect()
}

/// 统计表行数
pub fn count_rows(conn: &Arc<Mutex<Connection>>, table: &str) -> i64 {
    let conn = conn.lock().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// 报告中是否全部为重复行（幂等重导入检查）
pub fn is_idempotent(report: &ImportReport) -> bool {
    report
        .rows
        .iter()
        .all(|row| row.status() == RowStatus::Duplicate)
}
