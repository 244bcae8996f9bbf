// ==========================================
// 安保业务后台 - 日志系统初始化
// ==========================================
// 过滤: RUST_LOG 优先，否则使用 DEFAULT_FILTER
// 格式: BACKOFFICE_SYNC_LOG_FORMAT=json 输出 JSON 行（便于采集），否则为文本
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const ENV_LOG_FORMAT: &str = "BACKOFFICE_SYNC_LOG_FORMAT";

/// 默认过滤器
///
/// - 本服务与依赖: info
/// - tower_http: debug（TraceLayer 的请求/响应事件在 debug 级别）
/// - axum::rejection: trace（请求体/查询参数提取失败的原因）
pub const DEFAULT_FILTER: &str = "info,tower_http=debug,axum::rejection=trace";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 解析格式名（未知值回落为文本）
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// 初始化服务日志
///
/// # 示例
/// ```no_run
/// use backoffice_sync::logging;
/// logging::init();
/// ```
pub fn init() {
    let format = LogFormat::parse(std::env::var(ENV_LOG_FORMAT).ok().as_deref());
    let builder = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_line_number(true);

    match format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Text => builder.init(),
    }
}

/// 初始化测试日志（debug，写入测试捕获输出；重复调用无副作用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Text);
        assert_eq!(LogFormat::parse(None), LogFormat::Text);
    }

    #[test]
    fn test_default_filter_is_valid() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
