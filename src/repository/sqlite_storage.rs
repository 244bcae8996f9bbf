// ==========================================
// 安保业务后台 - SQLite 表存储实现
// ==========================================
// 职责: 实现 TableStorage（使用 rusqlite）
// 约束: 表名/列名只接受注册表中的标识符，值一律参数化绑定
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::schema::schema_for;
use crate::domain::types::{EntityType, CREATED_AT, ID_FIELD, UPDATED_AT};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::storage::{Filter, StorageRow, TableStorage};
use async_trait::async_trait;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

// ==========================================
// SqliteStorage
// ==========================================
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// 创建新的存储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建存储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 在阻塞线程池上执行连接操作（rusqlite 为同步调用）
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

// ===== 标识符白名单 =====

/// 表的全部列（id + 模式字段 + 记账字段）
fn table_columns(table: &str) -> RepositoryResult<Vec<&'static str>> {
    let entity = EntityType::from_storage_name(table)
        .ok_or_else(|| RepositoryError::UnknownTable(table.to_string()))?;
    let mut columns = vec![ID_FIELD];
    columns.extend(schema_for(entity).fields.iter().map(|f| f.name));
    columns.push(CREATED_AT);
    columns.push(UPDATED_AT);
    Ok(columns)
}

fn check_column(table: &str, columns: &[&'static str], column: &str) -> RepositoryResult<()> {
    if columns.contains(&column) {
        Ok(())
    } else {
        Err(RepositoryError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

// ===== 值转换 =====

/// JSON → SQLite 绑定值（布尔存为 0/1，整数存为 INTEGER）
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// SQLite 读取值 → JSON
fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

#[async_trait]
impl TableStorage for SqliteStorage {
    async fn select(&self, table: &str, filter: &Filter) -> RepositoryResult<Vec<StorageRow>> {
        let columns = table_columns(table)?;

        let mut sql = format!("SELECT {} FROM \"{}\"", columns.join(", "), table);
        let mut bindings = Vec::with_capacity(filter.conditions.len());
        if !filter.conditions.is_empty() {
            let mut clauses = Vec::with_capacity(filter.conditions.len());
            for (i, (field, value)) in filter.conditions.iter().enumerate() {
                check_column(table, &columns, field)?;
                clauses.push(format!("{} = ?{}", field, i + 1));
                bindings.push(to_sql_value(value));
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if let Some(order) = &filter.order_by {
            check_column(table, &columns, order)?;
            sql.push_str(&format!(" ORDER BY {}", order));
        }
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        debug!(sql = %sql, "select");

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bindings.iter()))?;
            let mut result = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = StorageRow::new();
                for (i, column) in columns.iter().enumerate() {
                    record.insert(column.to_string(), from_value_ref(row.get_ref(i)?));
                }
                result.push(record);
            }
            Ok(result)
        })
        .await
    }

    async fn insert(&self, table: &str, mut payload: StorageRow) -> RepositoryResult<String> {
        let columns = table_columns(table)?;

        let id = match payload.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        payload.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        let mut names = Vec::with_capacity(payload.len());
        let mut bindings = Vec::with_capacity(payload.len());
        for (column, value) in &payload {
            check_column(table, &columns, column)?;
            names.push(column.as_str());
            bindings.push(to_sql_value(value));
        }
        let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            names.join(", "),
            placeholders.join(", ")
        );

        self.with_conn(move |conn| {
            conn.execute(&sql, params_from_iter(bindings.iter()))?;
            Ok(id)
        })
        .await
    }

    async fn update(&self, table: &str, id: &str, payload: StorageRow) -> RepositoryResult<()> {
        let columns = table_columns(table)?;

        let mut assignments = Vec::with_capacity(payload.len());
        let mut bindings = Vec::with_capacity(payload.len() + 1);
        for (column, value) in payload.iter().filter(|(k, _)| k.as_str() != ID_FIELD) {
            check_column(table, &columns, column)?;
            bindings.push(to_sql_value(value));
            assignments.push(format!("{} = ?{}", column, bindings.len()));
        }

        let affected = if assignments.is_empty() {
            let sql = format!("SELECT COUNT(*) FROM \"{}\" WHERE {} = ?1", table, ID_FIELD);
            let id = id.to_string();
            self.with_conn(move |conn| {
                Ok(conn.query_row(&sql, [id], |row| row.get::<_, i64>(0))? as usize)
            })
            .await?
        } else {
            bindings.push(SqlValue::Text(id.to_string()));
            let sql = format!(
                "UPDATE \"{}\" SET {} WHERE {} = ?{}",
                table,
                assignments.join(", "),
                ID_FIELD,
                bindings.len()
            );
            self.with_conn(move |conn| Ok(conn.execute(&sql, params_from_iter(bindings.iter()))?))
                .await?
        };

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> RepositoryResult<()> {
        table_columns(table)?;
        let sql = format!("DELETE FROM \"{}\" WHERE {} = ?1", table, ID_FIELD);
        let owned_id = id.to_string();
        let affected = self
            .with_conn(move |conn| Ok(conn.execute(&sql, [owned_id])?))
            .await?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use serde_json::json;

    fn storage() -> SqliteStorage {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        SqliteStorage::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn row(value: Value) -> StorageRow {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_select_typed_values() {
        let storage = storage();
        let id = storage
            .insert(
                "clienti",
                row(json!({
                    "codice_cliente": "C001",
                    "ragione_sociale": "Acme Srl",
                    "attivo": true,
                    "data_inizio_contratto": "2024-01-15"
                })),
            )
            .await
            .unwrap();

        let rows = storage
            .select("clienti", &Filter::all().eq("codice_cliente", json!("C001")).limit(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(id));
        assert_eq!(rows[0]["attivo"], json!(1));
        assert_eq!(rows[0]["data_inizio_contratto"], json!("2024-01-15"));
        assert_eq!(rows[0]["citta"], Value::Null);
    }

    #[tokio::test]
    async fn test_integer_binding_matches_real_column() {
        let storage = storage();
        let client = storage
            .insert("clienti", row(json!({"ragione_sociale": "Acme"})))
            .await
            .unwrap();
        storage
            .insert(
                "tariffe",
                row(json!({
                    "id_cliente": client,
                    "tipo_servizio": "piantonamento",
                    "importo": 10.0
                })),
            )
            .await
            .unwrap();
        let rows = storage
            .select("tariffe", &Filter::all().eq("importo", json!(10)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["importo"], json!(10.0));
    }

    #[tokio::test]
    async fn test_unknown_identifiers_rejected() {
        let storage = storage();
        let err = storage.select("utenti", &Filter::all()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownTable(_)));

        let err = storage
            .select("clienti", &Filter::all().eq("1=1; DROP TABLE clienti", json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownColumn { .. }));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_id() {
        let storage = storage();
        let err = storage
            .update("clienti", "missing", row(json!({"citta": "Roma"})))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        let err = storage.delete("clienti", "missing").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_order_by_created_at() {
        let storage = storage();
        storage
            .insert("clienti", row(json!({"ragione_sociale": "B", "created_at": "2024-02-01T00:00:00"})))
            .await
            .unwrap();
        storage
            .insert("clienti", row(json!({"ragione_sociale": "A", "created_at": "2024-01-01T00:00:00"})))
            .await
            .unwrap();
        let rows = storage
            .select("clienti", &Filter::all().order_by("created_at"))
            .await
            .unwrap();
        assert_eq!(rows[0]["ragione_sociale"], json!("A"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_inserts_share_connection() {
        let storage = Arc::new(storage());
        let mut handles = Vec::new();
        for i in 0..8 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .insert(
                        "clienti",
                        row(json!({"codice_cliente": format!("C{}", i), "ragione_sociale": "Acme"})),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let rows = storage.select("clienti", &Filter::all()).await.unwrap();
        assert_eq!(rows.len(), 8);
    }

    #[tokio::test]
    async fn test_foreign_key_enforced_by_store() {
        let storage = storage();
        let err = storage
            .insert(
                "rubrica_clienti",
                row(json!({"id_cliente": "ghost", "nome_contatto": "Mario"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }
}
