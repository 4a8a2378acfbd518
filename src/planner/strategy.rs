//! Codec strategy selection and argument construction

use std::path::Path;

use tracing::debug;

use crate::domain::errors::DomainError;
use crate::domain::model::{ExportPolicy, Segment, TranscodeJobSpec, VideoCodecMode};
use crate::planner::EncoderSettings;
use crate::utils::time::format_seconds_arg;

/// Builds transcoder invocations from the user's declared policy
#[derive(Debug, Clone, Default)]
pub struct TranscodeJobPlanner {
    settings: EncoderSettings,
}

impl TranscodeJobPlanner {
    /// Create a planner with the given encoder settings
    pub fn new(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }

    /// Plan a job for an arbitrary `[start_ms, end_ms)` range of `input`.
    ///
    /// The argument vector has the shape
    /// `-y -hide_banner -loglevel info [-hwaccel A] -ss S -t D -i IN <codec> OUT`.
    pub fn plan(
        &self,
        input: &Path,
        start_ms: u64,
        end_ms: u64,
        output: &Path,
        policy: &ExportPolicy,
    ) -> Result<TranscodeJobSpec, DomainError> {
        if end_ms <= start_ms {
            return Err(DomainError::InvalidRange { start_ms, end_ms });
        }

        let start_seconds = millis_to_seconds(start_ms);
        let duration_seconds = millis_to_seconds(end_ms - start_ms);
        let video_codec_mode = VideoCodecMode::select(policy);
        let hardware_decode = policy.use_hardware_decode;

        let mut argv: Vec<String> = ["-y", "-hide_banner", "-loglevel", "info"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        if hardware_decode {
            argv.push("-hwaccel".to_string());
            argv.push(self.settings.hw_decode_accel.clone());
        }

        argv.push("-ss".to_string());
        argv.push(format_seconds_arg(start_seconds));
        argv.push("-t".to_string());
        argv.push(format_seconds_arg(duration_seconds));
        argv.push("-i".to_string());
        argv.push(input.to_string_lossy().into_owned());
        argv.extend(self.codec_args(video_codec_mode));
        argv.push(output.to_string_lossy().into_owned());

        debug!("Planned transcode: {} {}", self.settings.program.display(), argv.join(" "));

        Ok(TranscodeJobSpec {
            program: self.settings.program.clone(),
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            start_seconds,
            duration_seconds,
            video_codec_mode,
            hardware_decode,
            argv,
        })
    }

    /// Plan a job for a timeline segment
    pub fn plan_segment(
        &self,
        input: &Path,
        segment: &Segment,
        output: &Path,
        policy: &ExportPolicy,
    ) -> Result<TranscodeJobSpec, DomainError> {
        self.plan(input, segment.start_ms, segment.end_ms, output, policy)
    }

    fn codec_args(&self, mode: VideoCodecMode) -> Vec<String> {
        let s = &self.settings;
        let crf = s.crf.to_string();
        let args: Vec<&str> = match mode {
            VideoCodecMode::Copy => vec!["-c", "copy"],
            VideoCodecMode::ReencodeH265 { hw: true } => {
                vec!["-c:v", &s.hw_encoder, "-preset", &s.preset, "-c:a", "copy"]
            }
            VideoCodecMode::ReencodeH265 { hw: false } => vec![
                "-c:v",
                &s.sw_encoder,
                "-crf",
                &crf,
                "-preset",
                &s.preset,
                "-c:a",
                "copy",
            ],
        };
        args.into_iter().map(String::from).collect()
    }
}

/// Whole milliseconds to seconds; exact to three decimal places
fn millis_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn policy(hw: bool, h265: bool) -> ExportPolicy {
        ExportPolicy {
            use_hardware_decode: hw,
            encode_as_h265: h265,
            scale_to_source: true,
        }
    }

    fn plan(hw: bool, h265: bool) -> TranscodeJobSpec {
        TranscodeJobPlanner::default()
            .plan(
                Path::new("in.mkv"),
                1_500,
                4_000,
                Path::new("out.mp4"),
                &policy(hw, h265),
            )
            .unwrap()
    }

    #[test]
    fn test_rejects_empty_range() {
        let planner = TranscodeJobPlanner::default();
        let err = planner
            .plan(Path::new("a"), 5_000, 5_000, Path::new("b"), &policy(false, false))
            .unwrap_err();
        assert_eq!(err, DomainError::InvalidRange { start_ms: 5_000, end_ms: 5_000 });
    }

    #[test]
    fn test_seconds_are_millisecond_exact() {
        let spec = plan(false, false);
        assert_eq!(spec.start_seconds, 1.5);
        assert_eq!(spec.duration_seconds, 2.5);
        assert_eq!(spec.program, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_stream_copy_args() {
        let spec = plan(false, false);
        assert_eq!(spec.video_codec_mode, VideoCodecMode::Copy);
        assert_eq!(
            spec.argv,
            vec![
                "-y", "-hide_banner", "-loglevel", "info", "-ss", "1.500", "-t", "2.500", "-i",
                "in.mkv", "-c", "copy", "out.mp4"
            ]
        );
    }

    #[test]
    fn test_hw_decode_with_copy() {
        let spec = plan(true, false);
        assert_eq!(spec.video_codec_mode, VideoCodecMode::Copy);
        assert!(spec.hardware_decode);
        assert_eq!(&spec.argv[4..6], &["-hwaccel", "cuda"]);
        assert!(spec.argv.ends_with(&["-c".to_string(), "copy".to_string(), "out.mp4".to_string()]));
    }

    #[test]
    fn test_software_h265() {
        let spec = plan(false, true);
        assert_eq!(spec.video_codec_mode, VideoCodecMode::ReencodeH265 { hw: false });
        assert!(!spec.argv.contains(&"-hwaccel".to_string()));
        let tail: Vec<&str> = spec.argv[10..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec!["-c:v", "libx265", "-crf", "23", "-preset", "medium", "-c:a", "copy", "out.mp4"]
        );
    }

    #[test]
    fn test_hardware_h265() {
        let spec = plan(true, true);
        assert_eq!(spec.video_codec_mode, VideoCodecMode::ReencodeH265 { hw: true });
        let tail: Vec<&str> = spec.argv[12..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec!["-c:v", "hevc_nvenc", "-preset", "medium", "-c:a", "copy", "out.mp4"]
        );
    }

    #[test]
    fn test_configured_encoder_identifiers() {
        let planner = TranscodeJobPlanner::new(EncoderSettings {
            hw_encoder: "hevc_vaapi".to_string(),
            hw_decode_accel: "vaapi".to_string(),
            ..EncoderSettings::default()
        });
        let spec = planner
            .plan(Path::new("in"), 0, 1, Path::new("out"), &policy(true, true))
            .unwrap();
        assert!(spec.argv.contains(&"hevc_vaapi".to_string()));
        assert!(spec.argv.contains(&"vaapi".to_string()));
        assert_eq!(spec.duration_seconds, 0.001);
    }

    #[test]
    fn test_plan_is_deterministic() {
        assert_eq!(plan(true, true).argv, plan(true, true).argv);
        assert_eq!(plan(false, false), plan(false, false));
    }

    #[test]
    fn test_plan_segment() {
        let planner = TranscodeJobPlanner::default();
        let spec = planner
            .plan_segment(
                Path::new("in.mkv"),
                &Segment::new(60_000, 61_250, "x"),
                Path::new("o.mp4"),
                &policy(false, false),
            )
            .unwrap();
        assert_eq!(spec.start_seconds, 60.0);
        assert_eq!(spec.duration_seconds, 1.25);
    }
}
