//! FFprobe adapter for media file probing
//!
//! Runs `ffprobe` as an external process to read the container duration and
//! the frame rate of the first video stream. Also checks that the external
//! tools can be found at all.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::rules::frame_interval_ms;
use crate::error::{TrimGridError, TrimGridResult};
use crate::ports::ProbePort;

/// Default limit for one ffprobe invocation
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// FFprobe-based probe adapter
#[derive(Debug, Clone)]
pub struct FfprobeAdapter {
    program: PathBuf,
    timeout: Duration,
}

impl FfprobeAdapter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run ffprobe and return its trimmed standard output
    async fn run(&self, args: &[&str], path: &Path) -> TrimGridResult<String> {
        debug!("Running {} {} {}", self.program.display(), args.join(" "), path.display());

        let child = Command::new(&self.program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| TrimGridError::ProbeError {
                message: format!("{} timed out after {:?}", self.program.display(), self.timeout),
            })?
            .map_err(|e| TrimGridError::ProbeError {
                message: format!("Failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            return Err(TrimGridError::ProbeError {
                message: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ProbePort for FfprobeAdapter {
    async fn duration_ms(&self, path: &Path) -> TrimGridResult<u64> {
        let out = self
            .run(
                &["-v", "error", "-show_entries", "format=duration", "-of", "csv=p=0"],
                path,
            )
            .await?;
        parse_duration_ms(&out).ok_or_else(|| TrimGridError::ProbeError {
            message: format!("Unusable duration '{}' for {}", out, path.display()),
        })
    }

    async fn frame_interval_ms(&self, path: &Path) -> TrimGridResult<Option<u64>> {
        let out = self
            .run(
                &[
                    "-v",
                    "0",
                    "-of",
                    "csv=p=0",
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=r_frame_rate",
                ],
                path,
            )
            .await?;
        let interval = parse_frame_rate(&out).and_then(frame_interval_ms);
        if interval.is_none() {
            warn!("Unusable frame rate '{}' for {}", out, path.display());
        }
        Ok(interval)
    }
}

/// Parse `num/den` or a plain number of frames per second
pub fn parse_frame_rate(text: &str) -> Option<f64> {
    let text = text.lines().next()?.trim();
    if text.is_empty() {
        return None;
    }
    let fps = match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den = den.trim();
            let den: f64 = if den.is_empty() { 1.0 } else { den.parse().ok()? };
            if den == 0.0 {
                0.0
            } else {
                num / den
            }
        }
        None => text.parse().ok()?,
    };
    fps.is_finite().then_some(fps)
}

/// Parse a duration in seconds into whole milliseconds
pub fn parse_duration_ms(text: &str) -> Option<u64> {
    let seconds: f64 = text.lines().next()?.trim().parse().ok()?;
    (seconds.is_finite() && seconds > 0.0).then(|| (seconds * 1000.0).round() as u64)
}

/// Resolution of one external tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    pub name: String,
    pub program: PathBuf,
    /// Resolved location, `None` when the tool cannot be found
    pub resolved: Option<PathBuf>,
}

impl DependencyStatus {
    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Check that the transcoder and the probe tool can be started
pub fn check_dependencies(ffmpeg: &Path, ffprobe: &Path) -> Vec<DependencyStatus> {
    [("ffmpeg", ffmpeg), ("ffprobe", ffprobe)]
        .into_iter()
        .map(|(name, program)| DependencyStatus {
            name: name.to_string(),
            program: program.to_path_buf(),
            resolved: resolve_program(program),
        })
        .collect()
}

/// Locate `program`: paths are checked directly, bare names are searched on `PATH`
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        #[cfg(windows)]
        {
            let exe = full.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
    }
    None
}
