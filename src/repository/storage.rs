// ==========================================
// 安保业务后台 - 表存储协作接口 Trait
// ==========================================
// 职责: 定义按表名访问的通用 CRUD 接口（导入/导出共用）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// 存储行: 列名 → JSON 值
pub type StorageRow = Map<String, Value>;

// ==========================================
// Filter - 查询条件
// ==========================================
// 语义: 字段等值条件的 AND 组合 + 可选排序列 + 可选条数上限
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(String, Value)>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
}

impl Filter {
    /// 空条件（全表）
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push((field.into(), value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ==========================================
// TableStorage Trait
// ==========================================
// 用途: 导入编排 / 对账 / 外键校验 / 导出的唯一数据通道
// 实现者: SqliteStorage（rusqlite）、MemoryStorage（测试）
#[async_trait]
pub trait TableStorage: Send + Sync {
    /// 按条件查询
    ///
    /// # 返回
    /// - Ok(Vec<StorageRow>): 命中行（可能为空）
    /// - Err: 未知表/字段或数据库错误
    async fn select(&self, table: &str, filter: &Filter) -> RepositoryResult<Vec<StorageRow>>;

    /// 插入一行，返回记录 id（载荷未带 id 时由存储生成）
    async fn insert(&self, table: &str, payload: StorageRow) -> RepositoryResult<String>;

    /// 按 id 更新（载荷中的 id 被忽略）
    ///
    /// # 返回
    /// - Err(NotFound): id 不存在
    async fn update(&self, table: &str, id: &str, payload: StorageRow) -> RepositoryResult<()>;

    /// 按 id 删除
    async fn delete(&self, table: &str, id: &str) -> RepositoryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_builder() {
        let filter = Filter::all()
            .eq("codice_cliente", json!("C001"))
            .order_by("created_at")
            .limit(1);
        assert_eq!(filter.conditions.len(), 1);
        assert_eq!(filter.conditions[0].0, "codice_cliente");
        assert_eq!(filter.order_by.as_deref(), Some("created_at"));
        assert_eq!(filter.limit, Some(1));
    }
}
