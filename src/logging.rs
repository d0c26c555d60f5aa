//! 日志系统配置
//!
//! 支持控制台输出和按天滚动的文件持久化，自动清理过期日志

use crate::config::LogConfig;
use chrono::Local;
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀（滚动后缀为 .YYYY-MM-DD）
const LOG_FILE_PREFIX: &str = "file-station.log";

/// 日志系统守卫
/// 必须保持存活，否则日志写入线程会终止
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 初始化日志系统
///
/// # Arguments
/// * `config` - 日志配置
///
/// # Returns
/// * `LogGuard` - 日志守卫，需要保持存活直到程序结束
pub fn init_logging(config: &LogConfig) -> LogGuard {
    // 创建环境过滤器
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // 控制台输出层
    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_ansi(true);

    if config.enabled {
        // 确保日志目录存在
        if let Err(e) = fs::create_dir_all(&config.log_dir) {
            eprintln!("创建日志目录失败: {:?}, 错误: {}", config.log_dir, e);
            // 回退到只使用控制台输出
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();

            return LogGuard { _file_guard: None };
        }

        // 按天滚动的文件写入器，文件名格式: file-station.log.YYYY-MM-DD
        let file_appender = rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

        // 文件输出层（不带 ANSI 颜色）
        let file_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
            .with_ansi(false)
            .with_writer(non_blocking);

        // 初始化订阅器
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!(
            "日志系统初始化完成: 目录={:?}, 保留天数={}, 级别={}",
            config.log_dir, config.retention_days, config.level
        );

        // 启动过期日志清理
        cleanup_old_logs(&config.log_dir, config.retention_days);

        LogGuard {
            _file_guard: Some(file_guard),
        }
    } else {
        // 只使用控制台输出
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        info!("日志系统初始化完成（仅控制台输出）");

        LogGuard { _file_guard: None }
    }
}

/// 清理过期日志文件
///
/// 文件名格式：file-station.log.YYYY-MM-DD
fn cleanup_old_logs(log_dir: &Path, retention_days: u32) {
    let now = Local::now().date_naive();
    let retention_duration = chrono::Duration::days(retention_days as i64);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("读取日志目录失败: {:?}, 错误: {}", log_dir, e);
            return;
        }
    };

    let mut deleted_count = 0;

    for entry in entries.flatten() {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let filename = match path.file_name().and_then(|s| s.to_str()) {
            Some(name) => name,
            None => continue,
        };

        // 只处理本服务的日志文件
        if !filename.starts_with(LOG_FILE_PREFIX) {
            continue;
        }

        // 提取滚动后缀中的日期并判断是否过期
        let should_delete = if let Some(date_str) = extract_date_from_filename(filename) {
            if let Ok(file_date) = chrono::NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                let age = now.signed_duration_since(file_date);
                age > retention_duration
            } else {
                // 日期解析失败，使用文件修改时间作为后备方案
                check_by_modified_time(&entry, retention_days)
            }
        } else {
            check_by_modified_time(&entry, retention_days)
        };

        if should_delete {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!("删除过期日志文件失败: {:?}, 错误: {}", path, e);
            } else {
                deleted_count += 1;
                tracing::debug!("已删除过期日志文件: {:?}", path);
            }
        }
    }

    if deleted_count > 0 {
        info!("已清理 {} 个过期日志文件", deleted_count);
    }
}

/// 从文件名中提取滚动日期
///
/// file-station.log.YYYY-MM-DD -> YYYY-MM-DD
fn extract_date_from_filename(filename: &str) -> Option<String> {
    let suffix = filename.strip_prefix(LOG_FILE_PREFIX)?;
    let suffix = suffix.strip_prefix('.')?;

    if suffix.len() == 10 {
        Some(suffix.to_string())
    } else {
        None
    }
}

/// 根据文件修改时间检查是否过期（后备方案）
fn check_by_modified_time(entry: &fs::DirEntry, retention_days: u32) -> bool {
    let now = chrono::Utc::now();
    let retention_duration = chrono::Duration::days(retention_days as i64);

    if let Ok(metadata) = entry.metadata() {
        if let Ok(modified) = metadata.modified() {
            let modified_datetime: chrono::DateTime<chrono::Utc> = modified.into();
            let age = now.signed_duration_since(modified_datetime);
            return age > retention_duration;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_date_from_filename() {
        assert_eq!(
            extract_date_from_filename("file-station.log.2026-08-07"),
            Some("2026-08-07".to_string())
        );
        assert_eq!(extract_date_from_filename("file-station.log"), None);
        assert_eq!(extract_date_from_filename("other.log.2026-08-07"), None);
    }

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert_eq!(config.log_dir, std::path::PathBuf::from("logs"));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.level, "info");
    }
}
