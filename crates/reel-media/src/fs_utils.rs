//! Filesystem helpers shared by acquisition, scoring and rendering.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::{MediaError, MediaResult};

/// Bytes of file content folded into [`content_hash`].
const HASH_PREFIX_BYTES: u64 = 1024 * 1024;

/// Create a directory and all its parents. Succeeds if it already exists.
pub async fn ensure_dir(path: impl AsRef<Path>) -> MediaResult<()> {
    fs::create_dir_all(path.as_ref()).await?;
    Ok(())
}

/// Short content fingerprint: 16 hex chars of SHA-256 over the file name and
/// the first MiB of content. Unreadable files hash the name only.
pub async fn content_hash(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    let mut hasher = Sha256::new();
    if let Some(name) = path.file_name() {
        hasher.update(name.to_string_lossy().as_bytes());
    }

    if let Ok(file) = fs::File::open(path).await {
        let mut prefix = Vec::new();
        if file.take(HASH_PREFIX_BYTES).read_to_end(&mut prefix).await.is_ok() {
            hasher.update(&prefix);
        }
    }

    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// Write pretty JSON through a sibling temp file so readers never observe a
/// partial document.
pub async fn write_json_atomic<T: Serialize>(path: impl AsRef<Path>, value: &T) -> MediaResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp, &body).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Move a file from `src` to `dst`, falling back to copy-and-delete when the
/// two paths live on different filesystems.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            let staged = dst.with_extension("part");
            fs::copy(src, &staged).await?;
            if let Err(e) = fs::rename(&staged, dst).await {
                let _ = fs::remove_file(&staged).await;
                return Err(MediaError::from(e));
            }
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!("Failed to remove {} after copy: {}", src.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Remove a directory tree, logging instead of failing.
pub async fn remove_dir_quietly(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

// EXDEV is 18 on Linux and macOS
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_dir_idempotent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).await.unwrap();
        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_content_hash_stable_and_content_sensitive() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("clip.mp4");
        fs::write(&a, b"frame data").await.unwrap();

        let h1 = content_hash(&a).await;
        let h2 = content_hash(&a).await;
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));

        fs::write(&a, b"other frame data").await.unwrap();
        assert_ne!(content_hash(&a).await, h1);
    }

    #[tokio::test]
    async fn test_content_hash_missing_file_uses_name() {
        let dir = TempDir::new().unwrap();
        let missing_a = dir.path().join("a.mp4");
        let missing_b = dir.path().join("b.mp4");
        assert_ne!(content_hash(&missing_a).await, content_hash(&missing_b).await);
    }

    #[tokio::test]
    async fn test_write_json_atomic_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reels").join("r_1").join("job.json");
        write_json_atomic(&path, &serde_json::json!({"job": {"id": "r_1"}}))
            .await
            .unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(parsed["job"]["id"], "r_1");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.mp4");
        let dst = dir.path().join("out").join("dest.mp4");

        fs::write(&src, b"new").await.unwrap();
        fs::create_dir_all(dst.parent().unwrap()).await.unwrap();
        fs::write(&dst, b"old").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new");
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }

    #[tokio::test]
    async fn test_remove_dir_quietly_missing() {
        let dir = TempDir::new().unwrap();
        remove_dir_quietly(dir.path().join("nope")).await;
    }
}
