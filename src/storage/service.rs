// 受限存储服务
//
// 对外操作的统一入口：一切路径先过守卫，破坏性操作再过保护检查，
// 删除走回收站。配置对象在启动时构造一次后注入，不依赖全局状态。

use chrono::{DateTime, Local, Utc};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::config::StorageConfig;

use super::archive::{self, ArchiveStream};
use super::guard::PathGuard;
use super::naming;
use super::protect::ProtectGuard;
use super::trash::Trash;
use super::types::*;

/// 已预留的上传目标
///
/// `file` 已以独占方式创建，调用方负责写入内容
#[derive(Debug)]
pub struct UploadTarget {
    /// 相对根目录的最终路径
    pub relative: String,
    /// 绝对路径（写入失败时用于清理）
    pub absolute: PathBuf,
    /// 独占创建出的文件句柄
    pub file: std::fs::File,
}

/// 受限存储服务
pub struct StorageService {
    guard: PathGuard,
    protect: ProtectGuard,
    trash: Trash,
    upload_dir: PathBuf,
}

impl StorageService {
    /// 创建服务并准备根目录结构
    ///
    /// 根目录与上传暂存目录不存在时创建；回收站批次目录按需创建
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.root).map_err(|e| {
            StorageError::from_io(e).with_path(config.root.to_string_lossy().to_string())
        })?;

        let guard = PathGuard::new(&config.root)?;
        let root = guard.root().to_path_buf();

        let upload_dir = root.join(&config.upload_dir);
        fs::create_dir_all(&upload_dir).map_err(|e| {
            StorageError::from_io(e).with_path(upload_dir.to_string_lossy().to_string())
        })?;

        let protect = ProtectGuard::new(root.clone(), config.protect_marker.clone());
        let trash = Trash::new(root, config.trash_dir.clone());

        Ok(Self {
            guard,
            protect,
            trash,
            upload_dir,
        })
    }

    /// 规范化后的共享根目录
    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// 解析用户路径并返回目标元数据
    pub fn stat(&self, relative: &str) -> Result<(PathBuf, Metadata), StorageError> {
        let abs = self.guard.resolve(relative)?;
        let metadata = fs::metadata(&abs)
            .map_err(|e| StorageError::from_io(e).with_path(relative.to_string()))?;
        Ok((abs, metadata))
    }

    /// 列出目录的直接子项
    ///
    /// 单个子项元数据读取失败只记日志并跳过，不拖垮整个列表
    pub fn list(
        &self,
        relative: &str,
        field: &SortField,
        order: &SortOrder,
    ) -> Result<ListData, StorageError> {
        let (dir, metadata) = self.stat(relative)?;
        if !metadata.is_dir() {
            return Err(StorageError::new(StorageErrorCode::NotADirectory)
                .with_path(relative.to_string()));
        }

        let read_dir = fs::read_dir(&dir)
            .map_err(|e| StorageError::from_io(e).with_path(relative.to_string()))?;

        let mut items = Vec::new();
        for entry in read_dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("跳过无法读取的目录项: {:?}, 错误: {}", dir, e);
                    continue;
                }
            };

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!("跳过无法读取元数据的条目: {:?}, 错误: {}", entry.path(), e);
                    continue;
                }
            };

            items.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                size: if metadata.is_file() { metadata.len() } else { 0 },
                is_directory: metadata.is_dir(),
                modified_time: modified_time_of(&metadata),
            });
        }

        sort_entries(&mut items, field, order);

        Ok(ListData { items })
    }

    /// 归档目录，返回下载文件名与字节流
    pub fn archive(&self, relative: &str) -> Result<(String, ArchiveStream), StorageError> {
        let (dir, metadata) = self.stat(relative)?;
        if !metadata.is_dir() {
            return Err(StorageError::new(StorageErrorCode::NotADirectory)
                .with_path(relative.to_string()));
        }

        let base_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());

        Ok((format!("{}.tar", base_name), archive::stream_directory(dir)))
    }

    /// 为上传预留一个不冲突的目标文件
    ///
    /// 目标目录缺省为上传暂存目录，也可指定根目录内的已有目录。
    /// 客户端提交的名字只取基础名，路径部分一律丢弃；
    /// 最终创建走 `create_new`，探测与创建之间的竞态不会导致覆盖
    pub fn reserve_upload(
        &self,
        dest_dir: Option<&str>,
        desired: &str,
    ) -> Result<UploadTarget, StorageError> {
        let dir = match dest_dir {
            Some(relative) => {
                let (abs, metadata) = self.stat(relative)?;
                if !metadata.is_dir() {
                    return Err(StorageError::new(StorageErrorCode::NotADirectory)
                        .with_path(relative.to_string()));
                }
                abs
            }
            None => self.upload_dir.clone(),
        };

        let base = Path::new(desired)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                StorageError::new(StorageErrorCode::InvalidPath)
                    .with_message("上传文件名无效")
                    .with_path(desired.to_string())
            })?;

        let (absolute, file) = naming::reserve_in_dir(&dir, base)?;
        let relative = self.guard.to_relative(&absolute);

        tracing::info!("上传目标已预留: {}", relative);

        Ok(UploadTarget {
            relative,
            absolute,
            file,
        })
    }

    /// 移动/重命名
    ///
    /// 源路径必须存在且不在受保护子树内；目标只要求落在根目录内
    pub fn move_entry(&self, src_relative: &str, dest_relative: &str) -> Result<(), StorageError> {
        let (src, _) = self.stat(src_relative)?;
        let dest = self.guard.resolve(dest_relative)?;

        if src == self.guard.root() {
            return Err(StorageError::new(StorageErrorCode::InvalidPath)
                .with_message("根目录不可作为操作对象"));
        }

        self.protect.assert_unprotected(&src)?;

        fs::rename(&src, &dest)
            .map_err(|e| StorageError::from_io(e).with_path(src_relative.to_string()))?;

        tracing::info!("移动: {} -> {}", src_relative, dest_relative);

        Ok(())
    }

    /// 软删除：移入回收站的当前时间批次
    pub fn soft_delete(
        &self,
        relative: &str,
        now: DateTime<Local>,
    ) -> Result<String, StorageError> {
        let (abs, _) = self.stat(relative)?;

        if abs == self.guard.root() {
            return Err(StorageError::new(StorageErrorCode::InvalidPath)
                .with_message("根目录不可作为操作对象"));
        }

        self.protect.assert_unprotected(&abs)?;

        let target = self.trash.soft_delete(&abs, now)?;
        let quarantined = self.guard.to_relative(&target);

        tracing::info!("软删除: {} -> {}", relative, quarantined);

        Ok(quarantined)
    }
}

/// 元数据修改时间，读取失败回退纪元起点
fn modified_time_of(metadata: &Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .into()
}
