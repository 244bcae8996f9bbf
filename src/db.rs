// ==========================================
// 安保业务后台 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 按字段模式注册表生成业务表 DDL，与导入规则保持同一来源
// ==========================================

use crate::domain::schema::{schema_for, EntitySchema, SCHEMA_VERSION};
use crate::domain::types::{EntityType, CREATED_AT, ID_FIELD, UPDATED_AT};
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;
use tracing::info;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化全部表结构（幂等）
///
/// 包含:
/// - 每个注册实体一张业务表（id / 模式字段 / created_at / updated_at）
/// - 首个唯一键候选集上的 UNIQUE 索引
/// - import_batch 导入批次日志表
/// - schema_version 版本表
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    for entity in EntityType::ALL {
        let schema = schema_for(entity);
        conn.execute_batch(&create_table_sql(schema))?;
        if let Some(sql) = unique_index_sql(schema) {
            conn.execute_batch(&sql)?;
        }
    }

    conn.execute_batch(IMPORT_BATCH_DDL)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        params![SCHEMA_VERSION],
    )?;

    info!(
        tables = EntityType::ALL.len(),
        schema_version = SCHEMA_VERSION,
        "数据库表结构初始化完成"
    );
    Ok(())
}

/// 业务表 DDL
pub fn create_table_sql(schema: &EntitySchema) -> String {
    let mut columns = vec![format!("{} TEXT PRIMARY KEY", ID_FIELD)];
    for field in schema.fields {
        let mut column = format!("{} {}", field.name, field.field_type.sql_type());
        if field.is_required() {
            column.push_str(" NOT NULL");
        }
        if let Some(fk) = schema.foreign_key_for(field.name) {
            column.push_str(&format!(
                " REFERENCES \"{}\"({})",
                fk.references.storage_name(),
                ID_FIELD
            ));
        }
        columns.push(column);
    }
    columns.push(format!("{} TEXT", CREATED_AT));
    columns.push(format!("{} TEXT", UPDATED_AT));

    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n);",
        schema.table(),
        columns.join(",\n    ")
    )
}

/// 首个候选键集上的 UNIQUE 索引（存储侧兜底）
pub fn unique_index_sql(schema: &EntitySchema) -> Option<String> {
    let first = schema.unique_keys.first()?;
    Some(format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"ux_{}_key\" ON \"{}\" ({});",
        schema.table(),
        schema.table(),
        first.join(", ")
    ))
}

const IMPORT_BATCH_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS import_batch (
    batch_id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    mode TEXT NOT NULL,
    source TEXT,
    total_rows INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    duplicates INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    cancelled INTEGER NOT NULL DEFAULT 0,
    aborted INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    elapsed_ms INTEGER NOT NULL DEFAULT 0,
    report_json TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_import_batch_started_at ON import_batch (started_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        conn
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = memory_conn();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(SCHEMA_VERSION as i64));
    }

    #[test]
    fn test_every_entity_table_created() {
        let conn = memory_conn();
        init_schema(&conn).unwrap();
        for entity in EntityType::ALL {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
                    params![entity.storage_name()],
                    |row| row.get(0),
                )
                .optional()
                .unwrap();
            assert_eq!(exists, Some(1), "缺少表 {}", entity);
        }
    }

    #[test]
    fn test_table_sql_carries_references() {
        let sql = create_table_sql(schema_for(EntityType::ServicePoint));
        assert!(sql.contains("id_cliente TEXT NOT NULL REFERENCES \"clienti\"(id)"));
        assert!(sql.contains("latitudine REAL"));
        assert!(sql.contains("created_at TEXT"));
    }

    #[test]
    fn test_unique_index_on_first_candidate() {
        let conn = memory_conn();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO clienti (id, codice_cliente, ragione_sociale) VALUES ('a', 'C1', 'Acme')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO clienti (id, codice_cliente, ragione_sociale) VALUES ('b', 'C1', 'Altro')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_read_schema_version_without_table() {
        let conn = memory_conn();
        assert_eq!(read_schema_version(&conn).unwrap(), None);
    }
}
