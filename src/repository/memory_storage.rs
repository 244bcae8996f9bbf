// ==========================================
// 安保业务后台 - 内存表存储
// ==========================================
// 职责: TableStorage 的内存实现（单元测试 / 预览演练）
// 说明: 记录 select 调用，支持注入读写故障
// ==========================================

use crate::domain::types::ID_FIELD;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::storage::{Filter, StorageRow, TableStorage};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

// ==========================================
// MemoryStorage
// ==========================================
#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<HashMap<String, Vec<StorageRow>>>,
    select_log: Mutex<Vec<(String, Filter)>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一行数据（测试夹具），返回 id
    pub fn seed(&self, table: &str, mut row: StorageRow) -> String {
        let id = match row.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                row.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };
        if let Ok(mut tables) = self.tables.lock() {
            tables.entry(table.to_string()).or_default().push(row);
        }
        id
    }

    /// 读取整表（测试断言用）
    pub fn rows(&self, table: &str) -> Vec<StorageRow> {
        self.tables
            .lock()
            .map(|tables| tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// 已发生的 select 调用
    pub fn select_calls(&self) -> Vec<(String, Filter)> {
        self.select_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    pub fn clear_select_calls(&self) {
        if let Ok(mut log) = self.select_log.lock() {
            log.clear();
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn get_tables(&self) -> RepositoryResult<MutexGuard<'_, HashMap<String, Vec<StorageRow>>>> {
        self.tables
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn check_write(&self) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseQueryError("模拟写入失败".to_string()));
        }
        Ok(())
    }
}

/// 存储等值比较（数值按浮点比较，布尔与 0/1 互认）
fn values_match(stored: Option<&Value>, wanted: &Value) -> bool {
    let stored = stored.unwrap_or(&Value::Null);
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Bool(a), Value::Number(b)) | (Value::Number(b), Value::Bool(a)) => {
            b.as_f64() == Some(if *a { 1.0 } else { 0.0 })
        }
        (a, b) => a == b,
    }
}

fn sort_key(row: &StorageRow, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl TableStorage for MemoryStorage {
    async fn select(&self, table: &str, filter: &Filter) -> RepositoryResult<Vec<StorageRow>> {
        if let Ok(mut log) = self.select_log.lock() {
            log.push((table.to_string(), filter.clone()));
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::DatabaseQueryError("模拟读取失败".to_string()));
        }

        let tables = self.get_tables()?;
        let mut rows: Vec<StorageRow> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        filter
                            .conditions
                            .iter()
                            .all(|(field, value)| values_match(row.get(field), value))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(column) = &filter.order_by {
            rows.sort_by_key(|row| sort_key(row, column));
        }
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut payload: StorageRow) -> RepositoryResult<String> {
        self.check_write()?;
        let id = match payload.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        payload.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        let mut tables = self.get_tables()?;
        tables.entry(table.to_string()).or_default().push(payload);
        Ok(id)
    }

    async fn update(&self, table: &str, id: &str, payload: StorageRow) -> RepositoryResult<()> {
        self.check_write()?;
        let mut tables = self.get_tables()?;
        let row = tables
            .get_mut(table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.get(ID_FIELD).and_then(Value::as_str) == Some(id))
            })
            .ok_or_else(|| RepositoryError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in payload {
            if key != ID_FIELD {
                row.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> RepositoryResult<()> {
        self.check_write()?;
        let mut tables = self.get_tables()?;
        let rows = tables.get_mut(table).ok_or_else(|| RepositoryError::NotFound {
            entity: table.to_string(),
            id: id.to_string(),
        })?;
        let before = rows.len();
        rows.retain(|row| row.get(ID_FIELD).and_then(Value::as_str) != Some(id));
        if rows.len() == before {
            return Err(RepositoryError::NotFound {
                entity: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
