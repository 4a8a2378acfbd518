//! Progress parsing and callback system for UI integration
//!
//! The transcoder reports its position in status lines such as
//! `frame=  10 fps=0.0 q=-1.0 size=N/A time=00:01:05.50 bitrate=N/A speed=...`.
//! Those lines are terminated by `\r` rather than `\n`, so output is split on
//! both before matching.

use std::io::Write;
use std::path::Path;

use tokio::sync::mpsc::UnboundedSender;

use crate::domain::model::{JobId, ProgressEvent, TranscodeJobSpec};

/// Smallest total duration used when turning elapsed time into a percentage
const MIN_TOTAL_SECONDS: f64 = 0.001;

/// Extract `time=HH:MM:SS.ff` from a status line, in seconds.
///
/// The fractional field counts hundredths. Lines without a well-formed
/// timestamp (including `time=N/A`) yield `None`.
pub fn parse_progress_time(line: &str) -> Option<f64> {
    line.match_indices("time=")
        .find_map(|(idx, marker)| parse_hms_hundredths(&line[idx + marker.len()..]))
}

fn parse_hms_hundredths(text: &str) -> Option<f64> {
    let mut rest = text;
    let mut fields = [0u64; 4];
    for (i, field) in fields.iter_mut().enumerate() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        *field = rest[..digits].parse().ok()?;
        rest = &rest[digits..];
        if i < 3 {
            let separator = if i < 2 { ':' } else { '.' };
            rest = rest.strip_prefix(separator)?;
        }
    }
    let [hours, minutes, seconds, hundredths] = fields;
    Some((hours * 3600 + minutes * 60 + seconds) as f64 + hundredths as f64 / 100.0)
}

/// `clamp(round(elapsed / total * 100), 0, 100)`
pub fn percent_of(elapsed_seconds: f64, total_seconds: f64) -> u8 {
    let total = total_seconds.max(MIN_TOTAL_SECONDS);
    let percent = (elapsed_seconds / total * 100.0).round();
    if percent.is_nan() {
        return 0;
    }
    percent.clamp(0.0, 100.0) as u8
}

/// Turns transcoder output lines into progress events for one job
#[derive(Debug, Clone)]
pub struct ProgressParser {
    job_id: JobId,
    total_seconds: f64,
    last_percent: u8,
}

impl ProgressParser {
    pub fn new(job_id: JobId, total_seconds: f64) -> Self {
        Self {
            job_id,
            total_seconds,
            last_percent: 0,
        }
    }

    /// Parse one line; unrelated or unparseable lines are ignored
    pub fn feed_line(&mut self, line: &str) -> Option<ProgressEvent> {
        let elapsed_seconds = parse_progress_time(line)?;
        let percent = percent_of(elapsed_seconds, self.total_seconds);
        self.last_percent = percent;
        Some(ProgressEvent {
            job_id: self.job_id,
            elapsed_seconds,
            percent,
        })
    }

    /// Last reported completion
    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }

    /// Event reported when the job finishes successfully
    pub fn completed(&mut self) -> ProgressEvent {
        self.last_percent = 100;
        ProgressEvent {
            job_id: self.job_id,
            elapsed_seconds: self.total_seconds,
            percent: 100,
        }
    }
}

/// Accumulates raw output and yields complete lines split on `\r` or `\n`
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flush an unterminated trailing line
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Progress callback trait for UI integration
pub trait ProgressCallback: Send + Sync {
    /// Called when the transcoder process has been launched
    fn on_start(&self, job_id: JobId, spec: &TranscodeJobSpec);

    /// Called for every parsed progress line
    fn on_progress(&self, event: &ProgressEvent);

    /// Called when a job finished successfully
    fn on_complete(&self, job_id: JobId, output: &Path);

    /// Called when a job failed
    fn on_error(&self, job_id: JobId, error: &str);

    /// Called when a job was cancelled
    fn on_cancel(&self, job_id: JobId);
}

/// Console progress callback for CLI usage
pub struct ConsoleProgressCallback {
    verbose: bool,
}

impl ConsoleProgressCallback {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn bar(percent: u8) -> String {
        let bar_length = 20;
        let filled = percent as usize * bar_length / 100;
        "#".repeat(filled) + &"-".repeat(bar_length - filled)
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_start(&self, job_id: JobId, spec: &TranscodeJobSpec) {
        eprintln!("Exporting {} -> {}", job_id, spec.output_path.display());
        if self.verbose {
            eprintln!("   {} {}", spec.program.display(), spec.argv.join(" "));
        }
    }

    fn on_progress(&self, event: &ProgressEvent) {
        eprint!(
            "\r[{}] {:>3}% ({:.2}s)",
            Self::bar(event.percent),
            event.percent,
            event.elapsed_seconds
        );
        let _ = std::io::stderr().flush();
    }

    fn on_complete(&self, _job_id: JobId, output: &Path) {
        eprintln!("\nSaved: {}", output.display());
    }

    fn on_error(&self, job_id: JobId, error: &str) {
        eprintln!("\n{} failed: {}", job_id, error);
    }

    fn on_cancel(&self, job_id: JobId) {
        eprintln!("\n{} cancelled", job_id);
    }
}

/// JSON progress callback for structured output
pub struct JsonProgressCallback {
    output_progress_events: bool,
}

impl JsonProgressCallback {
    pub fn new(output_progress_events: bool) -> Self {
        Self {
            output_progress_events,
        }
    }
}

impl ProgressCallback for JsonProgressCallback {
    fn on_start(&self, job_id: JobId, spec: &TranscodeJobSpec) {
        let event = serde_json::json!({
            "event": "start",
            "job_id": job_id,
            "output": spec.output_path,
            "duration_seconds": spec.duration_seconds,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_progress(&self, progress: &ProgressEvent) {
        if self.output_progress_events {
            let event = serde_json::json!({
                "event": "progress",
                "job_id": progress.job_id,
                "elapsed_seconds": progress.elapsed_seconds,
                "percent": progress.percent,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });
            println!("{}", event);
        }
    }

    fn on_complete(&self, job_id: JobId, output: &Path) {
        let event = serde_json::json!({
            "event": "complete",
            "job_id": job_id,
            "output": output,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_error(&self, job_id: JobId, error: &str) {
        let event = serde_json::json!({
            "event": "error",
            "job_id": job_id,
            "error": error,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }

    fn on_cancel(&self, job_id: JobId) {
        let event = serde_json::json!({
            "event": "cancel",
            "job_id": job_id,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        println!("{}", event);
    }
}

/// Forwards progress events to an async consumer
pub struct ChannelProgressCallback {
    sender: UnboundedSender<ProgressEvent>,
}

impl ChannelProgressCallback {
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_start(&self, _job_id: JobId, _spec: &TranscodeJobSpec) {}

    fn on_progress(&self, event: &ProgressEvent) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.sender.send(event.clone());
    }

    fn on_complete(&self, _job_id: JobId, _output: &Path) {}
    fn on_error(&self, _job_id: JobId, _error: &str) {}
    fn on_cancel(&self, _job_id: JobId) {}
}

/// No-op progress callback for when progress tracking is disabled
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_start(&self, _job_id: JobId, _spec: &TranscodeJobSpec) {}
    fn on_progress(&self, _event: &ProgressEvent) {}
    fn on_complete(&self, _job_id: JobId, _output: &Path) {}
    fn on_error(&self, _job_id: JobId, _error: &str) {}
    fn on_cancel(&self, _job_id: JobId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_from_status_line() {
        let line = "frame=10 time=00:01:05.50 bitrate=1200kbits/s";
        assert_eq!(parse_progress_time(line), Some(65.5));
    }

    #[test]
    fn test_parse_time_hours() {
        assert_eq!(parse_progress_time("time=01:00:00.25"), Some(3600.25));
    }

    #[test]
    fn test_parse_time_ignores_unrelated_lines() {
        assert_eq!(parse_progress_time("Input #0, matroska,webm, from 'in.mkv':"), None);
        assert_eq!(parse_progress_time("size=N/A time=N/A bitrate=N/A"), None);
        assert_eq!(parse_progress_time("time=00:01"), None);
        assert_eq!(parse_progress_time(""), None);
    }

    #[test]
    fn test_parse_time_skips_malformed_first_marker() {
        assert_eq!(parse_progress_time("time=N/A time=00:00:02.00"), Some(2.0));
    }

    #[test]
    fn test_percent_for_reference_line() {
        let mut parser = ProgressParser::new(JobId(1), 130.0);
        let event = parser
            .feed_line("frame=10 time=00:01:05.50 bitrate=...")
            .unwrap();
        assert_eq!(event.percent, 50);
        assert_eq!(event.job_id, JobId(1));
        assert_eq!(parser.last_percent(), 50);
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(percent_of(200.0, 100.0), 100);
        assert_eq!(percent_of(0.0, 100.0), 0);
        assert_eq!(percent_of(1.0, 0.0), 100);
        assert_eq!(percent_of(f64::NAN, 10.0), 0);
    }

    #[test]
    fn test_parser_keeps_last_percent_on_noise() {
        let mut parser = ProgressParser::new(JobId(1), 10.0);
        parser.feed_line("time=00:00:02.00");
        assert!(parser.feed_line("garbage").is_none());
        assert_eq!(parser.last_percent(), 20);
        assert_eq!(parser.completed().percent, 100);
    }

    #[test]
    fn test_line_splitter_handles_carriage_returns() {
        let mut splitter = LineSplitter::new();
        let mut lines = splitter.push(b"header\nframe=1 time=00:00:01.00\rframe=2 ti");
        assert_eq!(lines, vec!["header", "frame=1 time=00:00:01.00"]);
        lines = splitter.push(b"me=00:00:02.00\r\n");
        assert_eq!(lines, vec!["frame=2 time=00:00:02.00"]);
        splitter.push(b"tail");
        assert_eq!(splitter.finish().as_deref(), Some("tail"));
        assert_eq!(splitter.finish(), None);
    }

    #[tokio::test]
    async fn test_channel_callback_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let callback = ChannelProgressCallback::new(tx);
        let event = ProgressEvent {
            job_id: JobId(7),
            elapsed_seconds: 1.0,
            percent: 10,
        };
        callback.on_progress(&event);
        assert_eq!(rx.recv().await, Some(event));
    }
}
