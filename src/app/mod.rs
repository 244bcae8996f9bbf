// ==========================================
// 安保业务后台 - 应用层
// ==========================================
// 职责: HTTP 集成,连接请求与业务 API
// ==========================================

pub mod routes;
pub mod state;

// 重导出
pub use routes::create_app;
pub use state::AppState;
