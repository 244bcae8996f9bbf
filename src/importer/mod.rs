// ==========================================
// 安保业务后台 - 导入层
// ==========================================
// 职责: 外部表格行 → 映射 → 外键校验 → 对账 → 写入
// 支持: Excel, CSV, JSON 行
// ==========================================

// 模块声明
pub mod coercion;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod fk_validator;
pub mod orchestrator;
pub mod reconciler;

// 重导出核心类型
pub use coercion::{CellValue, RawRow, SourceRow};
pub use error::{FkCheckError, ImportError, ImportResult, MapError};
pub use field_mapper::FieldMapper;
pub use file_parser::{CsvParser, SheetCell, SheetData, UniversalFileParser, XlsxParser, XlsxWriter};
pub use fk_validator::ForeignKeyValidator;
pub use orchestrator::{CancelFlag, ImportOrchestrator};
pub use reconciler::Reconciler;
