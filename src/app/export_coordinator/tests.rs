use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::domain::model::TranscodeJobSpec;

/// Records every job and fails or blocks on chosen calls (1-based)
#[derive(Default)]
struct MockTranscoder {
    calls: Mutex<Vec<TranscodeJobSpec>>,
    fail_calls: Vec<usize>,
    block_on_call: Option<usize>,
}

impl MockTranscoder {
    fn calls(&self) -> Vec<TranscodeJobSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscodePort for MockTranscoder {
    async fn transcode(
        &self,
        _job_id: JobId,
        spec: &TranscodeJobSpec,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ExecError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(spec.clone());
            calls.len()
        };
        if self.block_on_call == Some(call) {
            cancel.cancelled().await;
            return Err(ExecError::Cancelled);
        }
        if self.fail_calls.contains(&call) {
            return Err(ExecError::TranscodeFailure {
                status: "exit status: 1".to_string(),
                code: Some(1),
            });
        }
        Ok(spec.output_path.clone())
    }
}

fn timeline() -> Timeline {
    let mut timeline = Timeline::with_reference_duration(60_000);
    timeline.add(Segment::new(1_000, 3_000, "kick off")).unwrap();
    timeline.add(Segment::new(10_000, 12_000, "")).unwrap();
    timeline.add(Segment::new(20_000, 25_500, "goal")).unwrap();
    timeline
}

fn coordinator(mock: &Arc<MockTranscoder>) -> ExportCoordinator {
    let port: Arc<dyn TranscodePort> = mock.clone();
    ExportCoordinator::new(TranscodeJobPlanner::default(), port)
}

#[tokio::test]
async fn test_batch_continues_after_failed_job() {
    let mock = Arc::new(MockTranscoder {
        fail_calls: vec![2],
        ..Default::default()
    });
    let dir = TempDir::new().unwrap();
    let result = coordinator(&mock)
        .export_batch(
            &timeline(),
            &[0, 1, 2],
            &ExportPolicy::default(),
            Path::new("/videos/match.mkv"),
            dir.path(),
            None,
        )
        .await;

    assert_eq!(mock.calls().len(), 3);
    assert_eq!(
        result.succeeded,
        vec![
            dir.path().join("match_kick_off_00-00-01-000_00-00-03-000.mp4"),
            dir.path().join("match_goal_00-00-20-000_00-00-25-500.mp4"),
        ]
    );
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].0, JobId(2));
    assert!(result.failed[0].1.contains("exit status: 1"));
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn test_batch_uses_positional_label_for_untitled_segment() {
    let mock = Arc::new(MockTranscoder::default());
    let dir = TempDir::new().unwrap();
    coordinator(&mock)
        .export_batch(
            &timeline(),
            &[1],
            &ExportPolicy::default(),
            Path::new("match.mkv"),
            dir.path(),
            None,
        )
        .await;

    let calls = mock.calls();
    assert_eq!(
        calls[0].output_path,
        dir.path().join("match_seg02_00-00-10-000_00-00-12-000.mp4")
    );
}

#[tokio::test]
async fn test_batch_keeps_clashing_titles_apart() {
    let mock = Arc::new(MockTranscoder::default());
    let dir = TempDir::new().unwrap();
    let mut timeline = Timeline::new();
    timeline.add(Segment::new(0, 1_000, "goal!")).unwrap();
    timeline.add(Segment::new(0, 1_000, "goal?")).unwrap();

    let result = coordinator(&mock)
        .export_batch(
            &timeline,
            &[0, 1],
            &ExportPolicy::default(),
            Path::new("in.mkv"),
            dir.path(),
            None,
        )
        .await;

    assert_eq!(
        result.succeeded,
        vec![
            dir.path().join("in_goal_00-00-00-000_00-00-01-000.mp4"),
            dir.path().join("in_goal_00-00-00-000_00-00-01-000_2.mp4"),
        ]
    );
}

#[tokio::test]
async fn test_batch_runs_in_given_order() {
    let mock = Arc::new(MockTranscoder::default());
    let dir = TempDir::new().unwrap();
    coordinator(&mock)
        .export_batch(
            &timeline(),
            &[2, 0],
            &ExportPolicy::default(),
            Path::new("match.mkv"),
            dir.path(),
            None,
        )
        .await;

    let starts: Vec<f64> = mock.calls().iter().map(|c| c.start_seconds).collect();
    assert_eq!(starts, vec![20.0, 1.0]);
}

#[tokio::test]
async fn test_batch_rebases_when_enabled() {
    let dir = TempDir::new().unwrap();
    let scaling = Some(ScalingContext::new(120_000, 60_000));

    let mock = Arc::new(MockTranscoder::default());
    coordinator(&mock)
        .export_batch(
            &timeline(),
            &[0],
            &ExportPolicy::default(),
            Path::new("match.mkv"),
            dir.path(),
            scaling,
        )
        .await;
    assert_eq!(mock.calls()[0].start_seconds, 2.0);
    assert_eq!(mock.calls()[0].duration_seconds, 4.0);

    let mock = Arc::new(MockTranscoder::default());
    let policy = ExportPolicy {
        scale_to_source: false,
        ..ExportPolicy::default()
    };
    coordinator(&mock)
        .export_batch(&timeline(), &[0], &policy, Path::new("match.mkv"), dir.path(), scaling)
        .await;
    assert_eq!(mock.calls()[0].start_seconds, 1.0);
}

#[tokio::test]
async fn test_batch_records_bad_index_and_continues() {
    let mock = Arc::new(MockTranscoder::default());
    let dir = TempDir::new().unwrap();
    let result = coordinator(&mock)
        .export_batch(
            &timeline(),
            &[0, 9, 1],
            &ExportPolicy::default(),
            Path::new("match.mkv"),
            dir.path(),
            None,
        )
        .await;

    assert_eq!(result.succeeded.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].0, JobId(2));
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_cancel_stops_in_flight_and_skips_rest() {
    let mock = Arc::new(MockTranscoder {
        block_on_call: Some(2),
        ..Default::default()
    });
    let dir = TempDir::new().unwrap();
    let coordinator = coordinator(&mock);
    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let result = coordinator
        .export_batch(
            &timeline(),
            &[0, 1, 2],
            &ExportPolicy::default(),
            Path::new("match.mkv"),
            dir.path(),
            None,
        )
        .await;

    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(result.failed, vec![(JobId(2), "Job cancelled".to_string())]);
    assert_eq!(result.skipped, vec![JobId(3)]);
    assert_eq!(result.total(), 3);
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_export_single_segment() {
    let mock = Arc::new(MockTranscoder::default());
    let output = coordinator(&mock)
        .export_single(
            &timeline(),
            Selection::Segment(2),
            &ExportPolicy::default(),
            Path::new("in.mkv"),
            Path::new("out.mp4"),
        )
        .await
        .unwrap();

    assert_eq!(output, PathBuf::from("out.mp4"));
    let calls = mock.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].start_seconds, 20.0);
    assert_eq!(calls[0].duration_seconds, 5.5);
}

#[tokio::test]
async fn test_export_single_rejects_bad_selection_before_planning() {
    let mock = Arc::new(MockTranscoder::default());
    let coordinator = coordinator(&mock);
    let policy = ExportPolicy::default();

    let err = coordinator
        .export_single(
            &timeline(),
            Selection::Range { start_ms: 5_000, end_ms: 4_000 },
            &policy,
            Path::new("in.mkv"),
            Path::new("out.mp4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExportError::Domain(DomainError::InvalidRange { start_ms: 5_000, end_ms: 4_000 })
    ));

    let err = coordinator
        .export_single(
            &timeline(),
            Selection::Segment(7),
            &policy,
            Path::new("in.mkv"),
            Path::new("out.mp4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExportError::Domain(DomainError::IndexOutOfRange { index: 7, len: 3 })
    ));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_export_single_reports_failure() {
    let mock = Arc::new(MockTranscoder {
        fail_calls: vec![1],
        ..Default::default()
    });
    let err = coordinator(&mock)
        .export_single(
            &Timeline::new(),
            Selection::Range { start_ms: 0, end_ms: 1_000 },
            &ExportPolicy::default(),
            Path::new("in.mkv"),
            Path::new("out.mp4"),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExportError::Exec(ExecError::TranscodeFailure { code: Some(1), .. })
    ));
}

#[test]
fn test_selection_from_marks() {
    let mut marks = Marks::default();
    marks.set_out(2_500);
    assert_eq!(
        Selection::from_marks(&marks),
        Selection::Range { start_ms: 0, end_ms: 2_500 }
    );
}
