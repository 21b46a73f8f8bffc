//! Filesystem helpers: waiting for mounted objects to materialise, scratch
//! paths and cross-device moves.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Poll until `path` exists, sleeping `delay` between checks.
///
/// Objects written through a FUSE mount can show up after the notification
/// that announced them, so callers retry a bounded number of times.
pub async fn wait_for_file(path: &Path, attempts: u32, delay: Duration) -> MediaResult<()> {
    // The file is always checked at least once.
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        if fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }
        debug!(path = %path.display(), attempt, "File not yet available");
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }

    Err(MediaError::FileNotFound {
        path: path.to_path_buf(),
        attempts,
    })
}

/// Poll until `path` was modified within `threshold` of now.
///
/// Returns `false` when the file never looked fresh; callers decide whether
/// a stale file is fatal.
pub async fn wait_for_recent_update(
    path: &Path,
    attempts: u32,
    delay: Duration,
    threshold: Duration,
) -> bool {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        if let Some(age) = modified_age(path).await {
            if age <= threshold {
                return true;
            }
            debug!(path = %path.display(), attempt, age_secs = age.as_secs(), "File not recently updated");
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    false
}

async fn modified_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).await.ok()?.modified().ok()?;
    // A clock skewed into the future counts as fresh.
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

/// Reserve a unique scratch file path in the system temp directory.
///
/// The file is created empty and left on disk; the caller owns its removal.
pub fn scratch_path(prefix: &str, suffix: &str) -> MediaResult<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()?;
    file.into_temp_path()
        .keep()
        .map_err(|e| MediaError::Io(e.error))
}

/// Move a file, falling back to copy + delete when `src` and `dst` live on
/// different filesystems.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!("Cross-device rename, copying {} -> {}", src.display(), dst.display());
            copy_then_remove(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// EXDEV on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_then_remove(src: &Path, dst: &Path) -> MediaResult<()> {
    // Land next to dst first so the final rename stays on one filesystem.
    let staging = dst.with_extension("partial");

    fs::copy(src, &staging).await?;
    if let Err(e) = fs::rename(&staging, dst).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!("Failed to remove {} after copy: {}", src.display(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_wait_for_file_present() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp4");
        fs::write(&path, b"x").await.unwrap();

        wait_for_file(&path, 1, Duration::from_millis(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_file_zero_attempts_still_checks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp4");
        fs::write(&path, b"x").await.unwrap();
        wait_for_file(&path, 0, Duration::from_millis(1)).await.unwrap();

        let missing = dir.path().join("missing.mp4");
        let err = wait_for_file(&missing, 0, Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_wait_for_file_appears_late() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.mp4");

        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                fs::write(&path, b"x").await.unwrap();
            })
        };

        wait_for_file(&path, 50, Duration::from_millis(5)).await.unwrap();
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_file_gives_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.mp4");

        let err = wait_for_file(&path, 3, Duration::from_millis(1)).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_wait_for_recent_update() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env.toml");
        fs::write(&path, b"[application]").await.unwrap();

        assert!(wait_for_recent_update(&path, 1, Duration::ZERO, Duration::from_secs(30)).await);
        assert!(
            !wait_for_recent_update(&dir.path().join("nope"), 2, Duration::ZERO, Duration::from_secs(30))
                .await
        );
    }

    #[test]
    fn test_scratch_path_is_unique() {
        let a = scratch_path("resize-", ".mp4").unwrap();
        let b = scratch_path("resize-", ".mp4").unwrap();
        assert_ne!(a, b);
        assert!(a.exists());
        assert!(a.to_string_lossy().ends_with(".mp4"));
        std::fs::remove_file(a).unwrap();
        std::fs::remove_file(b).unwrap();
    }

    #[tokio::test]
    async fn test_move_file_into_new_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.mp4");
        let dst = dir.path().join("low-res").join("source.mp4");
        fs::write(&src, b"content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "content");
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
