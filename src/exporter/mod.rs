// ==========================================
// 安保业务后台 - 导出层
// ==========================================
// 职责: 存储表 → 单工作表 .xlsx
// ==========================================

pub mod error;
pub mod export_codec;

pub use error::{ExportError, ExportResult};
pub use export_codec::{export_table, ExportOutcome};
