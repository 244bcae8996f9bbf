// ==========================================
// 安保业务后台 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 HTTP 路由调用
// ==========================================

pub mod error;
pub mod export_api;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use export_api::ExportApi;
pub use import_api::{ImportApi, ImportApiResponse, ImportRequest};
