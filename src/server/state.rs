// 应用状态

use crate::config::AppConfig;
use crate::storage::StorageService;
use std::sync::Arc;

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 受限存储服务
    pub storage: Arc<StorageService>,
    /// 应用配置
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// 创建新的应用状态
    ///
    /// 存储服务在此一次性构造，根目录结构随之就绪
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let storage = StorageService::new(&config.storage)?;

        Ok(Self {
            storage: Arc::new(storage),
            config: Arc::new(config),
        })
    }
}
