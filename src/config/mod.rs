// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 前端静态资源目录（不配置则不提供页面）
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

/// 存储配置
///
/// 所有文件操作都被限制在 `root` 内；`upload_dir` 与 `trash_dir`
/// 是 root 下的两个保留目录名。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 共享根目录
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// 上传暂存目录名（位于根目录下）
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// 回收站目录名（位于根目录下）
    #[serde(default = "default_trash_dir")]
    pub trash_dir: String,
    /// 保护标记文件名（由操作员手工放置，本服务只读不写）
    #[serde(default = "default_protect_marker")]
    pub protect_marker: String,
}

fn default_root() -> PathBuf {
    PathBuf::from("files")
}

fn default_upload_dir() -> String {
    "upload".to_string()
}

fn default_trash_dir() -> String {
    "trash".to_string()
}

fn default_protect_marker() -> String {
    "DO_NOT_DELETE".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            upload_dir: default_upload_dir(),
            trash_dir: default_trash_dir(),
            protect_marker: default_protect_marker(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("配置已保存: {}", path);

        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                let default_config = Self::default();

                // 首次启动：自动创建共享根目录
                if !default_config.storage.root.exists() {
                    if let Err(e) = std::fs::create_dir_all(&default_config.storage.root) {
                        tracing::error!(
                            "无法创建共享根目录 {:?}: {}",
                            default_config.storage.root,
                            e
                        );
                    } else {
                        tracing::info!("已创建共享根目录: {:?}", default_config.storage.root);
                    }
                }

                // 尝试保存默认配置
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }

                default_config
            }
        }
    }
}
