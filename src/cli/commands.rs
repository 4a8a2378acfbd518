//! Command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::probe_ffprobe::{check_dependencies, FfprobeAdapter};
use crate::adapters::toml_config::AppConfig;
use crate::app::export_coordinator::{ExportCoordinator, Selection};
use crate::cli::args::{BatchArgs, ExportArgs, ProbeArgs, TimelineAction, TimelineArgs};
use crate::cli::Commands;
use crate::codec::{LoadedTimeline, TimelineCodec};
use crate::domain::model::{ExportPolicy, ScalingContext, Segment, Timeline};
use crate::domain::rules::{batch_clip_filename, clip_filename};
use crate::engine::executor::TranscodeExecutor;
use crate::engine::progress::{ConsoleProgressCallback, JsonProgressCallback, ProgressCallback};
use crate::planner::TranscodeJobPlanner;
use crate::ports::ProbePort;
use crate::utils::logging::LogLevel;
use crate::utils::time::{format_timestamp, parse_time_ms};

/// Dispatch a parsed command
pub async fn run(command: Commands, config: &AppConfig, cancel: CancellationToken) -> Result<()> {
    match command {
        Commands::Export(args) => export(args, config, cancel).await,
        Commands::Batch(args) => batch(args, config, cancel).await,
        Commands::Timeline(args) => timeline(args),
        Commands::Probe(args) => probe(args, config).await,
        Commands::Doctor => doctor(config),
    }
}

/// Execute the export command
pub async fn export(args: ExportArgs, config: &AppConfig, cancel: CancellationToken) -> Result<()> {
    ensure_input(&args.input)?;
    let policy = args.policy.policy(config.scale_to_source);

    let (timeline, selection, default_name) = match (&args.timeline, args.segment) {
        (Some(path), Some(number)) => {
            let loaded = load_timeline(path)?;
            let index = to_index(number)?;
            let timeline = rebase(loaded, &args.input, &policy, config).await;
            let segment = timeline.get(index)?;
            let name = batch_clip_filename(&args.input, segment, index);
            (timeline, Selection::Segment(index), name)
        }
        _ => {
            let start = args.start.as_deref().context("--start is required")?;
            let end = args.end.as_deref().context("--end is required")?;
            let start_ms = parse_time_ms(start)?;
            let end_ms = parse_time_ms(end)?;
            let name = clip_filename(&args.input, start_ms, end_ms);
            (Timeline::new(), Selection::Range { start_ms, end_ms }, name)
        }
    };

    let output = args
        .output
        .unwrap_or_else(|| sibling_path(&args.input, &default_name));
    let coordinator = coordinator(config, args.policy.json, cancel);
    let output = coordinator
        .export_single(&timeline, selection, &policy, &args.input, &output)
        .await
        .with_context(|| format!("Export of {} failed", args.input.display()))?;

    info!("Export finished: {}", output.display());
    Ok(())
}

/// Execute the batch command
pub async fn batch(args: BatchArgs, config: &AppConfig, cancel: CancellationToken) -> Result<()> {
    ensure_input(&args.input)?;
    let policy = args.policy.policy(config.scale_to_source);
    let loaded = load_timeline(&args.timeline)?;

    let indices: Vec<usize> = match &args.indices {
        Some(numbers) => numbers.iter().map(|n| to_index(*n)).collect::<Result<_>>()?,
        None => (0..loaded.timeline.len()).collect(),
    };
    if indices.is_empty() {
        info!("Nothing to export, the timeline is empty");
        return Ok(());
    }

    let scaling = scaling_context(&args.input, loaded.source_duration_ms, &policy, config).await;
    let coordinator = coordinator(config, args.policy.json, cancel);
    let result = coordinator
        .export_batch(
            &loaded.timeline,
            &indices,
            &policy,
            &args.input,
            &args.out_dir,
            scaling,
        )
        .await;

    if args.policy.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        eprintln!(
            "Batch finished: {} succeeded, {} failed, {} skipped",
            result.succeeded.len(),
            result.failed.len(),
            result.skipped.len()
        );
        for (job_id, reason) in &result.failed {
            eprintln!("  {} failed: {}", job_id, reason);
        }
    }

    if !result.is_complete_success() {
        bail!(
            "{} of {} exports did not complete",
            result.failed.len() + result.skipped.len(),
            result.total()
        );
    }
    Ok(())
}

/// Execute a timeline document command
pub fn timeline(args: TimelineArgs) -> Result<()> {
    match args.action {
        TimelineAction::New {
            file,
            source,
            duration,
            force,
        } => {
            if file.exists() && !force {
                bail!("{} already exists (use --force to replace it)", file.display());
            }
            let mut timeline = Timeline::new();
            if let Some(duration) = duration {
                timeline.set_reference_duration_ms(Some(parse_time_ms(&duration)?));
            }
            TimelineCodec::save(&timeline, source.as_deref(), &file)?;
            println!("Created {}", file.display());
        }
        TimelineAction::Add {
            file,
            start,
            end,
            title,
        } => {
            let mut loaded = load_timeline(&file)?;
            let segment = Segment::try_new(parse_time_ms(&start)?, parse_time_ms(&end)?, title.trim())?;
            let index = loaded.timeline.add(segment)?;
            save_timeline(&loaded, &file)?;
            println!("Added segment {}", index + 1);
        }
        TimelineAction::Remove { file, number } => {
            let mut loaded = load_timeline(&file)?;
            let removed = loaded.timeline.remove(to_index(number)?)?;
            save_timeline(&loaded, &file)?;
            println!(
                "Removed segment {} ({} - {})",
                number,
                format_timestamp(removed.start_ms),
                format_timestamp(removed.end_ms)
            );
        }
        TimelineAction::Clear { file } => {
            let mut loaded = load_timeline(&file)?;
            loaded.timeline.clear();
            save_timeline(&loaded, &file)?;
            println!("Cleared {}", file.display());
        }
        TimelineAction::List { file, json } => {
            let loaded = load_timeline(&file)?;
            if json {
                println!("{}", TimelineCodec::serialize(&loaded.timeline, source_of(&loaded))?);
            } else {
                print_timeline(&loaded);
            }
        }
        TimelineAction::Scale {
            file,
            duration,
            output,
        } => {
            let mut loaded = load_timeline(&file)?;
            if loaded.source_duration_ms == 0 {
                bail!("{} does not record the duration it was authored against", file.display());
            }
            let new_duration_ms = parse_time_ms(&duration)?;
            loaded.timeline = loaded.timeline.scale_to(new_duration_ms, loaded.source_duration_ms);
            let target = output.unwrap_or(file);
            save_timeline(&loaded, &target)?;
            println!(
                "Rebased {} segments onto {}",
                loaded.timeline.len(),
                format_timestamp(new_duration_ms)
            );
        }
    }
    Ok(())
}

/// Execute the probe command
pub async fn probe(args: ProbeArgs, config: &AppConfig) -> Result<()> {
    ensure_input(&args.input)?;
    let probe = FfprobeAdapter::new(&config.ffprobe_path);
    let duration_ms = probe
        .duration_ms(&args.input)
        .await
        .context("Failed to probe duration")?;
    let frame_interval_ms = probe.frame_interval_ms(&args.input).await.unwrap_or_else(|e| {
        warn!("Frame rate probe failed: {}", e);
        None
    });

    if args.json {
        let report = serde_json::json!({
            "input": args.input,
            "duration_ms": duration_ms,
            "duration": format_timestamp(duration_ms),
            "frame_interval_ms": frame_interval_ms,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Input:          {}", args.input.display());
        println!("Duration:       {} ({} ms)", format_timestamp(duration_ms), duration_ms);
        match frame_interval_ms {
            Some(ms) => println!("Frame interval: {} ms", ms),
            None => println!("Frame interval: unknown"),
        }
    }
    Ok(())
}

/// Execute the doctor command
pub fn doctor(config: &AppConfig) -> Result<()> {
    let statuses = check_dependencies(&config.ffmpeg_path, &config.ffprobe_path);
    for status in &statuses {
        match &status.resolved {
            Some(path) => println!("{:<8} ok       {}", status.name, path.display()),
            None => println!("{:<8} missing  {}", status.name, status.program.display()),
        }
    }

    let missing: Vec<&str> = statuses
        .iter()
        .filter(|s| !s.is_available())
        .map(|s| s.name.as_str())
        .collect();
    if !missing.is_empty() {
        bail!(
            "Missing {}. Install FFmpeg (e.g. `sudo apt install ffmpeg`) or set the paths in trimgrid.toml",
            missing.join(" and ")
        );
    }
    Ok(())
}

fn coordinator(config: &AppConfig, json: bool, cancel: CancellationToken) -> ExportCoordinator {
    let callback: Arc<dyn ProgressCallback> = if json {
        Arc::new(JsonProgressCallback::new(true))
    } else {
        let verbose = matches!(config.log_level(), Ok(LogLevel::Debug | LogLevel::Trace));
        Arc::new(ConsoleProgressCallback::new(verbose))
    };
    let executor = TranscodeExecutor::new()
        .with_timeout(config.job_timeout())
        .with_progress_callback(callback);

    ExportCoordinator::new(
        TranscodeJobPlanner::new(config.encoder_settings()),
        Arc::new(executor),
    )
    .with_cancellation(cancel)
}

/// Scaling context from the probed input duration, if rebasing applies
async fn scaling_context(
    input: &Path,
    reference_duration_ms: u64,
    policy: &ExportPolicy,
    config: &AppConfig,
) -> Option<ScalingContext> {
    if !policy.scale_to_source || reference_duration_ms == 0 {
        return None;
    }
    match FfprobeAdapter::new(&config.ffprobe_path).duration_ms(input).await {
        Ok(current) => Some(ScalingContext::new(current, reference_duration_ms)),
        Err(e) => {
            warn!("Cannot probe {}, using segment times as authored: {}", input.display(), e);
            None
        }
    }
}

async fn rebase(
    loaded: LoadedTimeline,
    input: &Path,
    policy: &ExportPolicy,
    config: &AppConfig,
) -> Timeline {
    match scaling_context(input, loaded.source_duration_ms, policy, config).await {
        Some(ctx) if ctx.is_effective() => loaded
            .timeline
            .scale_to(ctx.current_duration_ms, ctx.reference_duration_ms),
        _ => loaded.timeline,
    }
}

fn load_timeline(path: &Path) -> Result<LoadedTimeline> {
    TimelineCodec::load(path).with_context(|| format!("Failed to load timeline {}", path.display()))
}

fn save_timeline(loaded: &LoadedTimeline, path: &Path) -> Result<()> {
    TimelineCodec::save(&loaded.timeline, source_of(loaded), path)
        .with_context(|| format!("Failed to save timeline {}", path.display()))
}

fn source_of(loaded: &LoadedTimeline) -> Option<&Path> {
    loaded.source_file.as_deref().map(Path::new)
}

fn print_timeline(loaded: &LoadedTimeline) {
    if let Some(source) = &loaded.source_file {
        println!("Source:   {}", source);
    }
    if loaded.source_duration_ms > 0 {
        println!("Duration: {}", format_timestamp(loaded.source_duration_ms));
    }
    if loaded.timeline.is_empty() {
        println!("(no segments)");
        return;
    }
    println!("{:>3}  {:<12}  {:<12}  {:<12}  Title", "#", "Start", "End", "Length");
    for (i, segment) in loaded.timeline.segments().iter().enumerate() {
        println!(
            "{:>3}  {:<12}  {:<12}  {:<12}  {}",
            i + 1,
            format_timestamp(segment.start_ms),
            format_timestamp(segment.end_ms),
            format_timestamp(segment.duration_ms()),
            segment.title
        );
    }
}

/// Segment numbers on the command line are 1-based
fn to_index(number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .context("Segment numbers start at 1")
}

fn ensure_input(input: &Path) -> Result<()> {
    if !input.is_file() {
        bail!("Input file does not exist: {}", input.display());
    }
    Ok(())
}

fn sibling_path(input: &Path, file_name: &str) -> PathBuf {
    input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|dir| dir.join(file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}
