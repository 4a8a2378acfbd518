//! Transcoder process supervision
//!
//! Each job owns exactly one external process. The process is watched by a
//! tokio task that reacts to output, exit, cancellation and the optional
//! timeout as events; the caller is never blocked while a job runs.
//!
//! State machine per job: `Idle -> Running -> {Completed | Failed | Cancelled}`.

use std::future::pending;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::model::{JobId, TranscodeJobSpec};
use crate::engine::progress::{LineSplitter, NoOpProgressCallback, ProgressCallback, ProgressParser};
use crate::ports::TranscodePort;

/// Time allowed for output readers to flush after the process exited
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Process-level errors, reported per job
#[derive(Error, Debug)]
pub enum ExecError {
    /// The transcoder binary could not be started
    #[error("Failed to launch {program}: {source}")]
    LaunchError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The transcoder exited non-zero or was killed by a signal
    #[error("Transcoder failed with {status}")]
    TranscodeFailure { status: String, code: Option<i32> },

    /// The job was terminated on request
    #[error("Job cancelled")]
    Cancelled,

    /// The job ran longer than the configured timeout and was terminated
    #[error("Job timed out after {0:?}")]
    TimedOut(Duration),

    /// The supervising task itself failed
    #[error("Job supervisor failed: {0}")]
    Supervisor(String),
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }
}

/// Handle on a running job
pub struct JobHandle {
    job_id: JobId,
    cancel: CancellationToken,
    state: watch::Receiver<JobState>,
    task: JoinHandle<Result<PathBuf, ExecError>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.job_id
    }

    /// Current state
    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Request forceful termination; no-op once the job has finished
    pub fn cancel(&self) {
        if !self.state().is_terminal() {
            self.cancel.cancel();
        }
    }

    /// Token that cancels this job when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the job to reach a terminal state
    pub async fn wait(self) -> Result<PathBuf, ExecError> {
        self.task
            .await
            .map_err(|e| ExecError::Supervisor(e.to_string()))?
    }
}

/// Runs transcode jobs as external processes
#[derive(Clone)]
pub struct TranscodeExecutor {
    timeout: Option<Duration>,
    callback: Arc<dyn ProgressCallback>,
}

impl Default for TranscodeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeExecutor {
    /// Create an executor without timeout or progress reporting
    pub fn new() -> Self {
        Self {
            timeout: None,
            callback: Arc::new(NoOpProgressCallback),
        }
    }

    /// Terminate jobs that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Report progress and lifecycle events to `callback`
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Launch the transcoder for `spec`. Must be called from within a tokio runtime.
    pub fn start(&self, job_id: JobId, spec: TranscodeJobSpec) -> Result<JobHandle, ExecError> {
        self.start_with_token(job_id, spec, CancellationToken::new())
    }

    /// Launch the transcoder, terminating it when `cancel` fires
    pub fn start_with_token(
        &self,
        job_id: JobId,
        spec: TranscodeJobSpec,
        cancel: CancellationToken,
    ) -> Result<JobHandle, ExecError> {
        debug!(%job_id, "Launching {} {}", spec.program.display(), spec.argv.join(" "));

        let child = Command::new(&spec.program)
            .args(&spec.argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::LaunchError {
                program: spec.program.display().to_string(),
                source,
            })?;

        info!(%job_id, output = %spec.output_path.display(), "Transcode started");
        self.callback.on_start(job_id, &spec);

        let (state_tx, state_rx) = watch::channel(JobState::Running);
        let supervisor = Supervisor {
            job_id,
            spec,
            timeout: self.timeout,
            callback: Arc::clone(&self.callback),
            cancel: cancel.clone(),
            state: state_tx,
        };
        let task = tokio::spawn(supervisor.run(child));

        Ok(JobHandle {
            job_id,
            cancel,
            state: state_rx,
            task,
        })
    }
}

#[async_trait]
impl TranscodePort for TranscodeExecutor {
    async fn transcode(
        &self,
        job_id: JobId,
        spec: &TranscodeJobSpec,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ExecError> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        self.start_with_token(job_id, spec.clone(), cancel.child_token())?
            .wait()
            .await
    }
}

/// How the process left the `Running` state
enum Exit {
    Status(std::io::Result<std::process::ExitStatus>),
    Cancelled,
    TimedOut(Duration),
}

struct Supervisor {
    job_id: JobId,
    spec: TranscodeJobSpec,
    timeout: Option<Duration>,
    callback: Arc<dyn ProgressCallback>,
    cancel: CancellationToken,
    state: watch::Sender<JobState>,
}

impl Supervisor {
    async fn run(self, mut child: Child) -> Result<PathBuf, ExecError> {
        let started = Instant::now();
        let (line_tx, mut lines) = mpsc::unbounded_channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump_lines(stdout, line_tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump_lines(stderr, line_tx.clone())));
        }
        drop(line_tx);

        let mut parser = ProgressParser::new(self.job_id, self.spec.duration_seconds);
        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let exit = loop {
            tokio::select! {
                Some(line) = lines.recv() => self.report_line(&mut parser, &line),
                status = child.wait() => break Exit::Status(status),
                _ = self.cancel.cancelled() => break Exit::Cancelled,
                _ = &mut deadline => break Exit::TimedOut(timeout.unwrap_or_default()),
            }
        };

        let result = match exit {
            Exit::Status(status) => {
                // Pick up status lines written right before exit
                let _ = tokio::time::timeout(OUTPUT_DRAIN_GRACE, async {
                    while let Some(line) = lines.recv().await {
                        self.report_line(&mut parser, &line);
                    }
                })
                .await;

                match status {
                    Ok(status) if status.success() => Ok(self.spec.output_path.clone()),
                    Ok(status) => Err(ExecError::TranscodeFailure {
                        status: status.to_string(),
                        code: status.code(),
                    }),
                    Err(e) => Err(ExecError::TranscodeFailure {
                        status: e.to_string(),
                        code: None,
                    }),
                }
            }
            Exit::Cancelled => {
                terminate(&mut child).await;
                Err(ExecError::Cancelled)
            }
            Exit::TimedOut(limit) => {
                terminate(&mut child).await;
                Err(ExecError::TimedOut(limit))
            }
        };

        for reader in readers {
            reader.abort();
        }

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(output) => {
                self.callback.on_progress(&parser.completed());
                self.callback.on_complete(self.job_id, output);
                self.state.send_replace(JobState::Completed);
                info!(job_id = %self.job_id, output = %output.display(), "Transcode completed in {:.2}s", elapsed);
            }
            Err(ExecError::Cancelled) => {
                self.callback.on_cancel(self.job_id);
                self.state.send_replace(JobState::Cancelled);
                info!(job_id = %self.job_id, percent = parser.last_percent(), "Transcode cancelled");
            }
            Err(e) => {
                self.callback.on_error(self.job_id, &e.to_string());
                self.state.send_replace(JobState::Failed);
                warn!(job_id = %self.job_id, "Transcode failed after {:.2}s: {}", elapsed, e);
            }
        }

        result
    }

    fn report_line(&self, parser: &mut ProgressParser, line: &str) {
        if let Some(event) = parser.feed_line(line) {
            debug!(job_id = %event.job_id, percent = event.percent, "Progress");
            self.callback.on_progress(&event);
        }
    }
}

/// Kill the process and reap it; it may already have exited
async fn terminate(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("Kill after exit: {}", e);
    }
}

/// Forward the lines of one output stream
async fn pump_lines<R>(mut reader: R, lines: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut splitter = LineSplitter::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    if lines.send(line).is_err() {
                        return;
                    }
                }
            }
        }
    }
    if let Some(line) = splitter.finish() {
        let _ = lines.send(line);
    }
}
