// ==========================================
// 安保业务后台 - 导出模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导出模块错误类型
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("存储错误: {0}")]
    Storage(#[from] RepositoryError),

    #[error("工作簿生成失败: {0}")]
    WorkbookError(String),
}

// 表格写出失败（rust_xlsxwriter 错误经 ImportError 转换而来）
impl From<ImportError> for ExportError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Storage(e) => ExportError::Storage(e),
            other => ExportError::WorkbookError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ExportResult<T> = Result<T, ExportError>;
