// 路径安全守卫
//
// 把用户提交的相对路径解析为共享根目录内的绝对路径，
// 拒绝一切越出根目录的路径（含 .. 穿越与符号链接逃逸）

use std::path::{Component, Path, PathBuf};

use super::types::{StorageError, StorageErrorCode};

/// 路径安全守卫
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// 创建守卫，根目录在启动时一次性规范化
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        let root = dunce::canonicalize(root).map_err(|e| {
            StorageError::from_io(e).with_path(root.to_string_lossy().to_string())
        })?;
        Ok(Self { root })
    }

    /// 规范化后的根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 将用户相对路径解析为根目录内的绝对路径
    ///
    /// 先做逐段词法归并（`.`/`..`），任何越出根目录的中间状态立即拒绝；
    /// 目标已存在时再做一次 canonicalize，使符号链接指向根外的路径同样被拒。
    /// 前缀比较按路径段进行，根目录的字符串前缀兄弟目录不会误判通过。
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();

        for component in Path::new(relative).components() {
            match component {
                // Windows 盘符前缀意味着客户端传入了绝对路径
                Component::Prefix(_) => {
                    return Err(StorageError::new(StorageErrorCode::PathEscapesRoot)
                        .with_path(relative.to_string()));
                }
                // 开头的 / 视为相对根目录
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                    if !resolved.starts_with(&self.root) {
                        return Err(StorageError::new(StorageErrorCode::PathEscapesRoot)
                            .with_path(relative.to_string()));
                    }
                }
                Component::Normal(segment) => resolved.push(segment),
            }
        }

        // 已存在的目标按文件系统实际解析结果复查一次
        if resolved.exists() {
            let canonical = dunce::canonicalize(&resolved)
                .map_err(|e| StorageError::from_io(e).with_path(relative.to_string()))?;
            if !canonical.starts_with(&self.root) {
                return Err(StorageError::new(StorageErrorCode::PathEscapesRoot)
                    .with_path(relative.to_string()));
            }
            return Ok(canonical);
        }

        Ok(resolved)
    }

    /// 绝对路径相对根目录的展示形式（统一正斜杠）
    pub fn to_relative(&self, abs: &Path) -> String {
        match abs.strip_prefix(&self.root) {
            Ok(rel) => rel
                .iter()
                .map(|s| s.to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => abs.to_string_lossy().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn guard_in(dir: &Path) -> PathGuard {
        PathGuard::new(dir).unwrap()
    }

    #[test]
    fn test_resolve_plain_relative() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path());

        let resolved = guard.resolve("docs/a.txt").unwrap();
        assert!(resolved.starts_with(guard.root()));
        assert!(resolved.ends_with("docs/a.txt"));
    }

    #[test]
    fn test_resolve_empty_is_root() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path());

        assert_eq!(guard.resolve("").unwrap(), guard.root());
    }

    #[test]
    fn test_leading_slash_is_relative_to_root() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path());

        let resolved = guard.resolve("/docs/a.txt").unwrap();
        assert_eq!(resolved, guard.root().join("docs/a.txt"));
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path());

        let err = guard.resolve("../outside.txt").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::PathEscapesRoot);

        let err = guard.resolve("docs/../../outside.txt").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::PathEscapesRoot);
    }

    #[test]
    fn test_inner_parent_traversal_allowed() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path());

        // 未越出根目录的 .. 归并是合法的
        let resolved = guard.resolve("docs/../a.txt").unwrap();
        assert_eq!(resolved, guard.root().join("a.txt"));
    }

    #[test]
    fn test_sibling_string_prefix_rejected() {
        // root=/data/app 时 /data/app-other 不得通过
        let parent = tempdir().unwrap();
        let root = parent.path().join("app");
        let sibling = parent.path().join("app-other");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&sibling).unwrap();
        fs::write(sibling.join("secret.txt"), b"x").unwrap();

        let guard = guard_in(&root);
        let err = guard.resolve("../app-other/secret.txt").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::PathEscapesRoot);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let parent = tempdir().unwrap();
        let root = parent.path().join("root");
        let outside = parent.path().join("outside");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("secret.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let guard = guard_in(&root);
        let err = guard.resolve("link/secret.txt").unwrap_err();
        assert_eq!(err.code, StorageErrorCode::PathEscapesRoot);
    }

    #[test]
    fn test_to_relative_uses_forward_slashes() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path());

        let abs = guard.root().join("a").join("b.txt");
        assert_eq!(guard.to_relative(&abs), "a/b.txt");
    }

    mod confinement_property {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // 任意由普通段与 .. 组成的输入：要么被拒绝，要么落在根目录内
            #[test]
            fn resolve_never_escapes(rel in "[a-z]{1,4}(/(\\.\\.|[a-z]{1,4})){0,8}") {
                let dir = tempdir().unwrap();
                let guard = PathGuard::new(dir.path()).unwrap();

                match guard.resolve(&rel) {
                    Ok(path) => prop_assert!(path.starts_with(guard.root())),
                    Err(err) => prop_assert_eq!(err.code, StorageErrorCode::PathEscapesRoot),
                }
            }
        }
    }
}
