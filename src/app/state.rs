// ==========================================
// 安保业务后台 - 应用状态
// ==========================================
// 职责: 管理进程级共享状态和API实例
// 约束: 存储通过 Arc<dyn TableStorage> 注入，请求处理只借用
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ExportApi, ImportApi};
use crate::config::ServerConfig;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::RepositoryResult;
use crate::repository::import_batch_repo::{ImportBatchRepository, ImportBatchRepositoryImpl};
use crate::repository::sqlite_storage::SqliteStorage;
use crate::repository::storage::TableStorage;

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 服务配置
    pub config: ServerConfig,

    /// 表存储
    pub storage: Arc<dyn TableStorage>,

    /// 导入批次日志
    pub batch_repo: Arc<dyn ImportBatchRepository>,

    /// 导入API
    pub import_api: Arc<ImportApi>,

    /// 导出API
    pub export_api: Arc<ExportApi>,
}

impl AppState {
    /// 打开 SQLite 数据库并创建AppState
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库连接（PRAGMA 统一配置）
    /// 2. 建表（幂等）
    /// 3. 创建所有API实例（共享同一连接）
    pub fn new(config: ServerConfig) -> RepositoryResult<Self> {
        tracing::info!(db_path = %config.db_path, "初始化AppState");

        let conn = open_sqlite_connection(&config.db_path)?;
        init_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        let storage: Arc<dyn TableStorage> = Arc::new(SqliteStorage::from_connection(conn.clone()));
        let batch_repo: Arc<dyn ImportBatchRepository> =
            Arc::new(ImportBatchRepositoryImpl::from_connection(conn));

        Ok(Self::with_components(config, storage, batch_repo))
    }

    /// 以给定组件创建AppState（测试可注入内存存储）
    pub fn with_components(
        config: ServerConfig,
        storage: Arc<dyn TableStorage>,
        batch_repo: Arc<dyn ImportBatchRepository>,
    ) -> Self {
        let import_api = Arc::new(ImportApi::new(
            storage.clone(),
            batch_repo.clone(),
            config.import_timeout,
        ));
        let export_api = Arc::new(ExportApi::new(storage.clone()));

        Self {
            config,
            storage,
            batch_repo,
            import_api,
            export_api,
        }
    }
}
