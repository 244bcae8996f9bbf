// ==========================================
// 安保业务后台 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod import_batch_repo;
pub mod memory_storage;
pub mod sqlite_storage;
pub mod storage;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_batch_repo::{
    ImportBatchRepository, ImportBatchRepositoryImpl, MemoryImportBatchRepository,
};
pub use memory_storage::MemoryStorage;
pub use sqlite_storage::SqliteStorage;
pub use storage::{Filter, StorageRow, TableStorage};
