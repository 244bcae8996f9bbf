// ==========================================
// 安保业务后台 - HTTP 服务主入口
// ==========================================

use std::sync::Arc;

use backoffice_sync::app::{create_app, AppState};
use backoffice_sync::config::ServerConfig;
use backoffice_sync::{i18n, logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    info!("==================================================");
    info!("{}", backoffice_sync::APP_NAME);
    info!("系统版本: {}", backoffice_sync::VERSION);
    info!("==================================================");

    let config = ServerConfig::from_env()?;
    i18n::set_locale(&config.locale);
    let addr = config.bind_addr()?;
    info!(db_path = %config.db_path, locale = %config.locale, "配置加载完成");

    let state = Arc::new(AppState::new(config)?);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP 服务已启动");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "无法监听退出信号");
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭");
}
