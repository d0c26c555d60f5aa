// 上传文件名冲突解析
//
// 期望名被占用时依次探测 stem(1)ext、stem(2)ext … 直到找到空位

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::types::{StorageError, StorageErrorCode};

/// 改名探测上限，超过视为资源耗尽而不是继续循环
const MAX_NAME_PROBES: u32 = 10_000;

/// 为期望文件名返回目标目录内首个未占用的路径
///
/// 纯存在性探测，不做原子预留；探测与创建之间的竞态由
/// [`reserve_in_dir`] 的独占创建兜底。无中间创建时重复调用结果相同。
pub fn next_available_name(dir: &Path, desired: &str) -> Result<PathBuf, StorageError> {
    for candidate in candidates(dir, desired) {
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(StorageError::new(StorageErrorCode::NamingExhausted)
        .with_path(dir.join(desired).to_string_lossy().to_string()))
}

/// 探测并以独占方式创建最终文件
///
/// 创建用 `create_new`（原子排它），并发上传命中同一候选名时
/// 竞败方自动顺延到下一个候选，不会覆盖已有内容。
pub fn reserve_in_dir(dir: &Path, desired: &str) -> Result<(PathBuf, File), StorageError> {
    for candidate in candidates(dir, desired) {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(StorageError::from_io(e)
                    .with_path(candidate.to_string_lossy().to_string()))
            }
        }
    }

    Err(StorageError::new(StorageErrorCode::NamingExhausted)
        .with_path(dir.join(desired).to_string_lossy().to_string()))
}

/// 候选路径序列：desired、stem(1)ext、stem(2)ext …
fn candidates<'a>(dir: &'a Path, desired: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let (stem, ext) = split_name(desired);
    std::iter::once(dir.join(desired)).chain(
        (1..=MAX_NAME_PROBES).map(move |index| dir.join(format!("{}({}){}", stem, index, ext))),
    )
}

/// 拆分文件名为主干与扩展名（扩展名含点）
///
/// 隐藏文件（如 `.bashrc`）整体视为主干
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("foo.txt"), ("foo", ".txt"));
        assert_eq!(split_name("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_name("noext"), ("noext", ""));
        assert_eq!(split_name(".bashrc"), (".bashrc", ""));
    }

    #[test]
    fn test_unoccupied_name_is_kept() {
        let dir = tempdir().unwrap();
        let path = next_available_name(dir.path(), "foo.txt").unwrap();
        assert_eq!(path, dir.path().join("foo.txt"));
    }

    #[test]
    fn test_idempotent_without_creation() {
        let dir = tempdir().unwrap();
        let first = next_available_name(dir.path(), "foo.txt").unwrap();
        let second = next_available_name(dir.path(), "foo.txt").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_probe_sequence() {
        let dir = tempdir().unwrap();

        fs::write(dir.path().join("foo.txt"), b"0").unwrap();
        let path = next_available_name(dir.path(), "foo.txt").unwrap();
        assert_eq!(path, dir.path().join("foo(1).txt"));

        fs::write(dir.path().join("foo(1).txt"), b"1").unwrap();
        let path = next_available_name(dir.path(), "foo.txt").unwrap();
        assert_eq!(path, dir.path().join("foo(2).txt"));
    }

    #[test]
    fn test_reserve_creates_exclusively() {
        let dir = tempdir().unwrap();

        let (first, _f1) = reserve_in_dir(dir.path(), "foo.txt").unwrap();
        assert_eq!(first, dir.path().join("foo.txt"));
        assert!(first.exists());

        // 第二次预留自动落到下一个候选名
        let (second, _f2) = reserve_in_dir(dir.path(), "foo.txt").unwrap();
        assert_eq!(second, dir.path().join("foo(1).txt"));
    }

    #[test]
    fn test_reserve_dotless_name() {
        let dir = tempdir().unwrap();

        let (first, _f1) = reserve_in_dir(dir.path(), "README").unwrap();
        let (second, _f2) = reserve_in_dir(dir.path(), "README").unwrap();
        assert_eq!(first, dir.path().join("README"));
        assert_eq!(second, dir.path().join("README(1)"));
    }
}
