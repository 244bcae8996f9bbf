// ==========================================
// 安保业务后台 - 领域模型层
// ==========================================
// 职责: 实体类型、字段模式注册表、导入报告
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import_report;
pub mod schema;
pub mod types;

// 重导出核心类型
pub use import_report::{
    ImportBatch, ImportMode, ImportReport, ImportRowResult, ImportSummary, RowFailure,
    RowOutcome, RowStatus, Verdict,
};
pub use schema::{schema_for, EntitySchema, FieldSpec, ForeignKeyRule, ShortcutRule};
pub use types::{CanonicalPayload, EntityType, FieldRole, FieldType, FieldValue};
