// 回收站（软删除）
//
// 删除不抹除内容，而是把目标整体搬进按秒级时间戳命名的批次目录，
// 操作员可随时从回收站找回

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use super::types::{StorageError, StorageErrorCode};

/// 回收站
#[derive(Debug, Clone)]
pub struct Trash {
    root: PathBuf,
    dir_name: String,
}

impl Trash {
    pub fn new(root: PathBuf, dir_name: impl Into<String>) -> Self {
        Self {
            root,
            dir_name: dir_name.into(),
        }
    }

    /// 回收站根目录（root 下的保留目录）
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.dir_name)
    }

    /// 批次目录名：秒级、字典序可排序
    pub fn batch_name(now: &DateTime<Local>) -> String {
        now.format("%Y-%m-%d-%H-%M-%S").to_string()
    }

    /// 把路径搬进 `now` 对应的批次目录
    ///
    /// 批次目录按需创建（幂等，并发下“已存在”即成功）；搬移是同卷上的
    /// 单次 rename。批次内已有同名条目时报 Conflict，不做进一步消歧。
    pub fn soft_delete(
        &self,
        abs: &Path,
        now: DateTime<Local>,
    ) -> Result<PathBuf, StorageError> {
        let batch = self.dir().join(Self::batch_name(&now));
        fs::create_dir_all(&batch)
            .map_err(|e| StorageError::from_io(e).with_path(batch.to_string_lossy().to_string()))?;

        let file_name = abs.file_name().ok_or_else(|| {
            StorageError::new(StorageErrorCode::InvalidPath)
                .with_path(abs.to_string_lossy().to_string())
        })?;

        let target = batch.join(file_name);
        if target.exists() {
            return Err(StorageError::new(StorageErrorCode::TrashConflict)
                .with_path(target.to_string_lossy().to_string()));
        }

        fs::rename(abs, &target)
            .map_err(|e| StorageError::from_io(e).with_path(abs.to_string_lossy().to_string()))?;

        Ok(target)
    }
}
