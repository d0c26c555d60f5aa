// File Station Rust Library
// 局域网文件中转站核心库

// 配置管理模块
pub mod config;

// 日志系统模块
pub mod logging;

// 根目录受限存储引擎模块
pub mod storage;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use config::{AppConfig, LogConfig, ServerConfig, StorageConfig};
pub use server::AppState;
pub use storage::{
    DirectoryEntry, ListData, PathGuard, ProtectGuard, SortField, SortOrder, StorageError,
    StorageErrorCode, StorageService, Trash,
};
