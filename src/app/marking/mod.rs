// Marking session - In/out marking and frame stepping over a media player

use tracing::debug;

use crate::domain::errors::DomainError;
use crate::domain::model::{Segment, Timeline};
use crate::domain::rules::{clamp_seek, Marks, DEFAULT_FRAME_INTERVAL_MS};
use crate::ports::PlaybackPort;

/// Marks ranges on a playing source and commits them to a timeline
pub struct MarkingSession<P: PlaybackPort> {
    player: P,
    marks: Marks,
    frame_interval_ms: u64,
}

impl<P: PlaybackPort> MarkingSession<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            marks: Marks::default(),
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }

    /// Use a probed frame interval for frame stepping; `None` keeps the default
    pub fn with_frame_interval(mut self, frame_interval_ms: Option<u64>) -> Self {
        self.frame_interval_ms = frame_interval_ms.unwrap_or(DEFAULT_FRAME_INTERVAL_MS).max(1);
        self
    }

    pub fn marks(&self) -> Marks {
        self.marks
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn frame_interval_ms(&self) -> u64 {
        self.frame_interval_ms
    }

    /// Mark IN at the current position
    pub fn set_in(&mut self) -> u64 {
        let position = self.position();
        self.marks.set_in(position);
        debug!(in_ms = position, out_ms = ?self.marks.out_ms, "IN marked");
        position
    }

    /// Mark OUT at the current position, at least one millisecond past IN
    pub fn set_out(&mut self) -> u64 {
        let position = self.position();
        self.marks.set_out(position);
        let out_ms = self.marks.out_ms.unwrap_or(position);
        debug!(in_ms = ?self.marks.in_ms, out_ms, "OUT marked");
        out_ms
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear();
    }

    /// Pause and seek by `delta_ms`, staying inside the media
    pub fn nudge(&mut self, delta_ms: i64) -> u64 {
        self.player.pause();
        let target = clamp_seek(self.position(), delta_ms, self.player.duration_ms());
        self.player.seek(target);
        target
    }

    /// Move one frame forward or back
    pub fn step_frame(&mut self, forward: bool) -> u64 {
        let step = i64::try_from(self.frame_interval_ms).unwrap_or(i64::MAX);
        self.nudge(if forward { step } else { -step })
    }

    /// Append the marked range to `timeline`; the marks are kept
    pub fn commit(&self, timeline: &mut Timeline, title: &str) -> Result<usize, DomainError> {
        let segment: Segment = self.marks.to_segment(title.trim())?;
        let index = timeline.add(segment)?;
        debug!(index, "Segment committed");
        Ok(index)
    }

    fn position(&self) -> u64 {
        self.player
            .position_ms()
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakePlayer {
        position: Option<i64>,
        duration: Option<u64>,
        playing: bool,
        seeks: Vec<u64>,
    }

    impl FakePlayer {
        fn at(position: i64, duration: u64) -> Self {
            Self {
                position: Some(position),
                duration: Some(duration),
                playing: true,
                seeks: Vec::new(),
            }
        }
    }

    impl PlaybackPort for FakePlayer {
        fn position_ms(&self) -> Option<i64> {
            self.position
        }

        fn duration_ms(&self) -> Option<u64> {
            self.duration
        }

        fn seek(&mut self, position_ms: u64) {
            self.seeks.push(position_ms);
            self.position = Some(position_ms as i64);
        }

        fn play(&mut self) {
            self.playing = true;
        }

        fn pause(&mut self) {
            self.playing = false;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    #[test]
    fn test_mark_and_commit() {
        let mut session = MarkingSession::new(FakePlayer::at(1_000, 60_000));
        session.set_in();
        session.player.seek(4_000);
        assert_eq!(session.set_out(), 4_000);

        let mut timeline = Timeline::new();
        let index = session.commit(&mut timeline, "  intro ").unwrap();
        assert_eq!(index, 0);
        assert_eq!(timeline.segments(), &[Segment::new(1_000, 4_000, "intro")]);
    }

    #[test]
    fn test_unknown_or_negative_position_reads_as_zero() {
        let mut session = MarkingSession::new(FakePlayer::default());
        assert_eq!(session.set_in(), 0);

        let mut session = MarkingSession::new(FakePlayer::at(-250, 10_000));
        assert_eq!(session.set_in(), 0);
    }

    #[test]
    fn test_set_in_past_out_clears_out() {
        let mut session = MarkingSession::new(FakePlayer::at(5_000, 60_000));
        session.set_out();
        session.player.seek(7_000);
        session.set_in();
        assert_eq!(session.marks(), Marks { in_ms: Some(7_000), out_ms: None });
    }

    #[test]
    fn test_set_out_before_in_is_pushed_forward() {
        let mut session = MarkingSession::new(FakePlayer::at(5_000, 60_000));
        session.set_in();
        session.player.seek(2_000);
        assert_eq!(session.set_out(), 5_001);
    }

    #[test]
    fn test_commit_without_marks_is_rejected() {
        let session = MarkingSession::new(FakePlayer::at(0, 60_000));
        let mut timeline = Timeline::new();
        assert!(matches!(
            session.commit(&mut timeline, "x"),
            Err(DomainError::InvalidRange { .. })
        ));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_nudge_pauses_and_clamps() {
        let mut session = MarkingSession::new(FakePlayer::at(9_900, 10_000));
        assert_eq!(session.nudge(500), 9_999);
        assert!(!session.player().is_playing());
        assert_eq!(session.nudge(-20_000), 0);
        assert_eq!(session.player().seeks, vec![9_999, 0]);
    }

    #[test]
    fn test_nudge_without_duration_is_unbounded_above() {
        let mut session = MarkingSession::new(FakePlayer {
            position: Some(1_000),
            ..Default::default()
        });
        assert_eq!(session.nudge(1_000_000), 1_001_000);
    }

    #[test]
    fn test_step_frame_uses_interval() {
        let mut session = MarkingSession::new(FakePlayer::at(1_000, 60_000));
        assert_eq!(session.step_frame(true), 1_040);
        assert_eq!(session.step_frame(false), 1_000);

        let mut session =
            MarkingSession::new(FakePlayer::at(1_000, 60_000)).with_frame_interval(Some(17));
        assert_eq!(session.step_frame(false), 983);
        assert_eq!(session.frame_interval_ms(), 17);
    }
}
