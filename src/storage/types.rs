// 存储引擎数据类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 存储错误码
/// 错误码范围：52001 - 52099
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// 路径越出共享根目录
    PathEscapesRoot = 52001,
    /// 目标位于受保护子树内
    PathProtected = 52002,
    /// 目标不存在
    NotFound = 52003,
    /// 回收站批次内同名冲突
    TrashConflict = 52004,
    /// 上传改名探测次数耗尽
    NamingExhausted = 52005,
    /// 底层文件系统操作失败
    IoFailure = 52006,
    /// 归档流中途终止
    ArchiveAborted = 52007,
    /// 指定路径不是目录
    NotADirectory = 52008,
    /// 路径格式无效
    InvalidPath = 52009,
}

impl StorageErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::PathEscapesRoot => "路径越出共享根目录",
            Self::PathProtected => "目标位于受保护子树内，禁止移动或删除",
            Self::NotFound => "目标不存在",
            Self::TrashConflict => "回收站批次内已存在同名条目",
            Self::NamingExhausted => "无法为上传文件找到可用文件名",
            Self::IoFailure => "文件系统操作失败",
            Self::ArchiveAborted => "归档流中途终止",
            Self::NotADirectory => "指定路径不是目录",
            Self::InvalidPath => "路径格式无效",
        }
    }
}

/// 存储错误
#[derive(Debug)]
pub struct StorageError {
    pub code: StorageErrorCode,
    pub message: String,
    pub path: Option<String>,
}

impl StorageError {
    pub fn new(code: StorageErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 按 IO 错误类别归类：NotFound 单独成类，其余归为 IoFailure
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::new(StorageErrorCode::NotFound),
            _ => Self::new(StorageErrorCode::IoFailure)
                .with_message(format!("文件系统操作失败: {}", err)),
        }
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {}", self.message, path)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for StorageError {}

/// 目录条目
///
/// 每次列目录时重新采集，不做缓存
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    /// 文件名
    pub name: String,
    /// 文件大小（目录为 0）
    pub size: u64,
    /// 是否为目录
    #[serde(rename = "isDirectory")]
    pub is_directory: bool,
    /// 修改时间
    #[serde(rename = "modifiedTime")]
    pub modified_time: DateTime<Utc>,
}

/// 排序字段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    #[default]
    ModifiedTime,
}

/// 排序顺序
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// 列目录响应
#[derive(Debug, Serialize)]
pub struct ListData {
    /// 目录条目列表
    pub items: Vec<DirectoryEntry>,
}

/// 对条目进行稳定排序
///
/// 主序为所选字段（受排序顺序影响），并列时按文件名升序
pub fn sort_entries(entries: &mut [DirectoryEntry], field: &SortField, order: &SortOrder) {
    entries.sort_by(|a, b| {
        let primary = match field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::ModifiedTime => a.modified_time.cmp(&b.modified_time),
        };

        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };

        match primary {
            Ordering::Equal => a.name.cmp(&b.name),
            other => other,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str, mtime_secs: i64) -> DirectoryEntry {
        DirectoryEntry {
            name: name.to_string(),
            size: 0,
            is_directory: false,
            modified_time: Utc.timestamp_opt(mtime_secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_storage_error_code() {
        assert_eq!(StorageErrorCode::PathEscapesRoot.code(), 52001);
        assert_eq!(StorageErrorCode::TrashConflict.code(), 52004);
        assert_eq!(StorageErrorCode::ArchiveAborted.code(), 52007);
    }

    #[test]
    fn test_storage_error_builders() {
        let err = StorageError::new(StorageErrorCode::PathEscapesRoot).with_path("../etc");
        assert_eq!(err.code, StorageErrorCode::PathEscapesRoot);
        assert!(err.path.is_some());
    }

    #[test]
    fn test_from_io_classifies_not_found() {
        let err = StorageError::from_io(std::io::Error::new(std::io::ErrorKind::NotFound, "x"));
        assert_eq!(err.code, StorageErrorCode::NotFound);

        let err =
            StorageError::from_io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "x"));
        assert_eq!(err.code, StorageErrorCode::IoFailure);
    }

    #[test]
    fn test_sort_mtime_asc_name_tiebreak() {
        // {a: mtime=1, b: mtime=2, c: mtime=1} 升序应得 [a, c, b]
        let mut entries = vec![entry("b", 2), entry("c", 1), entry("a", 1)];
        sort_entries(&mut entries, &SortField::ModifiedTime, &SortOrder::Asc);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_sort_mtime_desc() {
        let mut entries = vec![entry("a", 1), entry("b", 2), entry("c", 1)];
        sort_entries(&mut entries, &SortField::ModifiedTime, &SortOrder::Desc);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sort_by_name() {
        let mut entries = vec![entry("c", 1), entry("a", 3), entry("b", 2)];
        sort_entries(&mut entries, &SortField::Name, &SortOrder::Asc);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_empty() {
        let mut entries: Vec<DirectoryEntry> = vec![];
        sort_entries(&mut entries, &SortField::ModifiedTime, &SortOrder::Asc);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_entry_wire_format() {
        let json = serde_json::to_value(entry("a.txt", 0)).unwrap();
        assert!(json.get("name").is_some());
        assert!(json.get("isDirectory").is_some());
        assert!(json.get("modifiedTime").is_some());
        assert!(json.get("size").is_some());
    }
}
