//! FFprobe duration probing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Default FFprobe binary, resolved through `PATH`.
pub const DEFAULT_FFPROBE: &str = "ffprobe";

/// Measures media duration in whole seconds with `ffprobe`.
#[derive(Debug, Clone)]
pub struct DurationProbe {
    binary: PathBuf,
    timeout: Option<Duration>,
}

impl Default for DurationProbe {
    fn default() -> Self {
        Self::new(DEFAULT_FFPROBE)
    }
}

impl DurationProbe {
    /// Create a probe for the given binary name or path.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Kill the probe if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the probe arguments for a file.
    pub fn build_args(path: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            path.to_string_lossy().to_string(),
        ]
    }

    /// Probe a file and return its length rounded up to the next second.
    pub async fn duration_secs(&self, path: impl AsRef<Path>) -> MediaResult<u32> {
        let path = path.as_ref();
        let binary = which::which(&self.binary)
            .map_err(|_| MediaError::BinaryNotFound(self.binary.clone()))?;

        let args = Self::build_args(path);
        debug!("Running FFprobe: {} {}", binary.display(), args.join(" "));

        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child)
                .await
                .map_err(|_| MediaError::Timeout(timeout.as_secs()))??,
            None => child.await?,
        };

        if !output.status.success() {
            return Err(MediaError::ffprobe_failed(
                format!("ffprobe exited with {}", output.status),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        parse_duration_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the bare duration printed by ffprobe (`"12.48\n"` -> `13`).
pub fn parse_duration_output(output: &str) -> MediaResult<u32> {
    let value = output.trim();
    match value.parse::<f64>() {
        Ok(duration) if duration.is_finite() && (0.0..u32::MAX as f64).contains(&duration) => {
            Ok((duration.trunc() as u32).saturating_add(1))
        }
        _ => Err(MediaError::InvalidDuration(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_output() {
        assert_eq!(parse_duration_output("12.48\n").unwrap(), 13);
        assert_eq!(parse_duration_output("119.999").unwrap(), 120);
        assert_eq!(parse_duration_output("90").unwrap(), 91);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(matches!(parse_duration_output("N/A"), Err(MediaError::InvalidDuration(_))));
        assert!(matches!(parse_duration_output(""), Err(MediaError::InvalidDuration(_))));
        assert!(matches!(parse_duration_output("-3"), Err(MediaError::InvalidDuration(_))));
        assert!(matches!(parse_duration_output("NaN"), Err(MediaError::InvalidDuration(_))));
        assert!(matches!(parse_duration_output("inf"), Err(MediaError::InvalidDuration(_))));
        assert!(matches!(parse_duration_output("1e300"), Err(MediaError::InvalidDuration(_))));
        assert_eq!(parse_duration_output("4294967294.5").unwrap(), u32::MAX);
    }

    #[test]
    fn test_build_args() {
        let args = DurationProbe::build_args(Path::new("/mnt/b/a.mp4"));
        assert_eq!(args[3], "format=duration");
        assert_eq!(args.last().unwrap(), "/mnt/b/a.mp4");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let probe = DurationProbe::new("/nonexistent/ffprobe-binary");
        let err = probe.duration_secs("/tmp/none.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::BinaryNotFound(_)));
    }
}
