// ==========================================
// 安保业务后台 - 配置层
// ==========================================
// 职责: 服务配置解析（环境变量覆写 → 默认值）
// ==========================================

pub mod server_config;

// 重导出核心配置
pub use server_config::{get_default_db_path, ConfigError, ServerConfig};
