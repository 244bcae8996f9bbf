// ==========================================
// 安保业务后台 - 核心库
// ==========================================
// 技术栈: axum + Rust + SQLite
// 系统定位: 批量数据导入/导出对账引擎
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "it");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体注册表与报告类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 映射 / 外键校验 / 对账 / 编排
pub mod importer;

// 导出层 - 表 → .xlsx
pub mod exporter;

// 配置层 - 服务配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - HTTP 集成
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CanonicalPayload, EntityType, FieldType, FieldValue};

// 报告
pub use domain::import_report::{
    ImportMode, ImportReport, ImportRowResult, ImportSummary, RowFailure, RowStatus, Verdict,
};

// 导入导出
pub use exporter::{export_table, ExportOutcome};
pub use importer::{CancelFlag, ImportOrchestrator};

// 存储
pub use repository::{MemoryStorage, SqliteStorage, TableStorage};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "安保业务后台数据同步";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
