// 删除/移动保护检查
//
// 自下而上检查保护标记文件，命中即认定整棵子树不可移动、不可删除

use std::path::{Path, PathBuf};

use super::types::{StorageError, StorageErrorCode};

/// 保护检查器
///
/// 标记文件由操作员手工放置，本服务只读取、从不创建或删除
#[derive(Debug, Clone)]
pub struct ProtectGuard {
    root: PathBuf,
    marker: String,
}

impl ProtectGuard {
    pub fn new(root: PathBuf, marker: impl Into<String>) -> Self {
        Self {
            root,
            marker: marker.into(),
        }
    }

    /// 检查路径是否位于受保护子树内
    ///
    /// 从 `abs` 开始逐级向上检查到根目录（含根目录）。循环次数以路径段数
    /// 为上限，且 parent 与自身相同（已到文件系统根）时立即停止。
    /// 某一级的标记读取失败按“该级无标记”处理并继续上溯（可用性优先）。
    pub fn is_protected(&self, abs: &Path) -> bool {
        let mut current = abs.to_path_buf();
        let max_steps = abs.components().count() + 1;

        for _ in 0..max_steps {
            if current.join(&self.marker).exists() {
                return true;
            }

            if current == self.root {
                return false;
            }

            match current.parent() {
                Some(parent) if parent != current => current = parent.to_path_buf(),
                _ => return false,
            }
        }

        false
    }

    /// 受保护路径返回 Forbidden 性质的错误
    pub fn assert_unprotected(&self, abs: &Path) -> Result<(), StorageError> {
        if self.is_protected(abs) {
            return Err(StorageError::new(StorageErrorCode::PathProtected)
                .with_path(abs.to_string_lossy().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MARKER: &str = "DO_NOT_DELETE";

    fn guard_in(root: &Path) -> ProtectGuard {
        ProtectGuard::new(root.to_path_buf(), MARKER)
    }

    #[test]
    fn test_unmarked_tree_is_unprotected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/file.txt"), b"x").unwrap();

        let guard = guard_in(dir.path());
        assert!(!guard.is_protected(&dir.path().join("a/b/file.txt")));
        assert!(guard
            .assert_unprotected(&dir.path().join("a/b/file.txt"))
            .is_ok());
    }

    #[test]
    fn test_marker_protects_descendants() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("keep/deep/nested")).unwrap();
        fs::write(dir.path().join("keep").join(MARKER), b"").unwrap();
        fs::write(dir.path().join("keep/deep/nested/file.txt"), b"x").unwrap();

        let guard = guard_in(dir.path());

        // 标记目录自身及任意深度的后代都受保护
        assert!(guard.is_protected(&dir.path().join("keep")));
        assert!(guard.is_protected(&dir.path().join("keep/deep")));
        assert!(guard.is_protected(&dir.path().join("keep/deep/nested/file.txt")));

        // 标记文件自身也不可删除
        assert!(guard.is_protected(&dir.path().join("keep").join(MARKER)));
    }

    #[test]
    fn test_sibling_outside_subtree_unaffected() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("keep")).unwrap();
        fs::create_dir_all(dir.path().join("free")).unwrap();
        fs::write(dir.path().join("keep").join(MARKER), b"").unwrap();
        fs::write(dir.path().join("free/file.txt"), b"x").unwrap();

        let guard = guard_in(dir.path());
        assert!(!guard.is_protected(&dir.path().join("free/file.txt")));
    }

    #[test]
    fn test_marker_at_root_protects_everything() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join(MARKER), b"").unwrap();

        let guard = guard_in(dir.path());
        assert!(guard.is_protected(&dir.path().join("sub")));
        assert!(guard.is_protected(&dir.path().join("anything.txt")));
    }

    #[test]
    fn test_assert_unprotected_error_code() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("keep")).unwrap();
        fs::write(dir.path().join("keep").join(MARKER), b"").unwrap();

        let guard = guard_in(dir.path());
        let err = guard
            .assert_unprotected(&dir.path().join("keep"))
            .unwrap_err();
        assert_eq!(err.code, StorageErrorCode::PathProtected);
    }
}
