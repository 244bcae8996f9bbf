// ==========================================
// 安保业务后台 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分层: ImportError 为批次级错误；MapError / FkCheckError 为行级错误
// ==========================================

use crate::domain::import_report::RowFailure;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型（批次级）
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 写出失败: {0}")]
    ExcelWriteError(String),

    // ===== 请求错误 =====
    #[error("未知实体类型: {0}")]
    UnknownEntityType(String),

    #[error("行数据格式错误 (行 {row}): {message}")]
    MalformedRow { row: usize, message: String },

    // ===== 数据库错误 =====
    #[error("存储错误: {0}")]
    Storage(#[from] RepositoryError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::ExcelWriteError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

// ==========================================
// 行级错误
// ==========================================

/// 字段映射错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("字段映射失败 (字段 {field}): {reason}")]
    Mapping { field: String, reason: String },

    #[error("存储错误: {0}")]
    Storage(String),
}

impl MapError {
    pub fn mapping(field: &str, reason: impl Into<String>) -> Self {
        MapError::Mapping {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<RepositoryError> for MapError {
    fn from(err: RepositoryError) -> Self {
        MapError::Storage(err.to_string())
    }
}

/// 外键校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FkCheckError {
    #[error("外键约束违反 (字段 {field}): {value} 在 {ref_table} 中不存在")]
    Violation {
        field: String,
        value: String,
        ref_table: String,
    },

    #[error("存储错误: {0}")]
    Storage(String),
}

impl From<RepositoryError> for FkCheckError {
    fn from(err: RepositoryError) -> Self {
        FkCheckError::Storage(err.to_string())
    }
}

// ===== 行级错误 → 报告失败原因 =====

impl From<MapError> for RowFailure {
    fn from(err: MapError) -> Self {
        match err {
            MapError::Mapping { field, reason } => RowFailure::MappingError { field, reason },
            MapError::Storage(message) => RowFailure::StorageError { message },
        }
    }
}

impl From<FkCheckError> for RowFailure {
    fn from(err: FkCheckError) -> Self {
        match err {
            FkCheckError::Violation { field, value, ref_table } => {
                RowFailure::FkError { field, value, ref_table }
            }
            FkCheckError::Storage(message) => RowFailure::StorageError { message },
        }
    }
}

impl From<RepositoryError> for RowFailure {
    fn from(err: RepositoryError) -> Self {
        RowFailure::StorageError {
            message: err.to_string(),
        }
    }
}
