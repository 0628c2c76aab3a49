use clap::Parser;
use liftsense::error::AppError;
use liftsense::performance::TracingErrorReporter;
use liftsense::pose::landmark::*;
use liftsense::{AnalysisSession, FrameInput, Settings};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Level, info, warn};

/// How often the governor is fed
const SAMPLE_INTERVAL_MS: u64 = 1000;

/// Synthetic runs stop after this many frames
const SYNTHETIC_FRAMES: u64 = 300;

/// Placeholder until the binary reads real process memory
const SYNTHETIC_MEMORY_PERCENT: f32 = 45.0;

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

/// Replays pose landmarks through an analysis session
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Settings file (TOML or JSON); `LIFTSENSE__*` variables override it
    settings: Option<PathBuf>,
    /// JSON-lines landmark recording; a synthetic squat runs when omitted
    #[arg(long)]
    replay: Option<PathBuf>,
}

/// One line of a JSON-lines replay file
#[derive(Debug, Deserialize)]
struct ReplayRecord {
    timestamp_ms: u64,
    landmarks: Vec<Landmark>,
    #[serde(default)]
    confidence: Option<f32>,
}

async fn load_replay(path: &Path) -> Result<Vec<FrameInput>, AppError> {
    let contents = tokio::fs::read_to_string(path).await?;
    let mut frames = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord =
            serde_json::from_str(line).map_err(|e| AppError::Replay(e, index + 1))?;
        let Some(landmarks) = LandmarkFrame::from_slice(&record.landmarks) else {
            warn!("Skipping line {}: expected {} landmarks", index + 1, LANDMARK_COUNT);
            continue;
        };
        frames.push(FrameInput {
            landmarks,
            timestamp_ms: record.timestamp_ms,
            confidence: record.confidence,
        });
    }
    info!("Loaded {} frames from {}", frames.len(), path.display());
    Ok(frames)
}

/// A side-on squat with a slight hip drift, one rep every two seconds
fn synthetic_frame(elapsed_ms: u64) -> LandmarkFrame {
    let phase = (elapsed_ms % 2000) as f32 / 2000.0 * std::f32::consts::TAU;
    let descent = (1.0 - phase.cos()) / 2.0;
    let hip_y = 0.45 + 0.2 * descent;
    let hip_x = 0.5 + 0.03 * descent;

    let mut landmarks = [Landmark::new(0.5, 0.5, 0.0, 0.9); LANDMARK_COUNT];
    for (offset, shoulder, hip, knee, ankle, foot) in [
        (-0.05, LEFT_SHOULDER, LEFT_HIP, LEFT_KNEE, LEFT_ANKLE, LEFT_FOOT_INDEX),
        (0.05, RIGHT_SHOULDER, RIGHT_HIP, RIGHT_KNEE, RIGHT_ANKLE, RIGHT_FOOT_INDEX),
    ] {
        landmarks[shoulder] = Landmark::new(0.5 + offset, hip_y - 0.25, 0.0, 0.95);
        landmarks[hip] = Landmark::new(hip_x + offset, hip_y, 0.0, 0.9);
        landmarks[knee] = Landmark::new(0.6 + offset, 0.6, 0.0, 0.85);
        landmarks[ankle] = Landmark::new(0.5 + offset, 0.85, 0.0, 0.9);
        landmarks[foot] = Landmark::new(0.6 + offset, 0.88, 0.0, 0.8);
    }
    LandmarkFrame::new(landmarks)
}

fn frame_period(session: &AnalysisSession) -> Duration {
    let frame_rate = session.current_quality().settings().frame_rate.max(1);
    Duration::from_millis(1000 / frame_rate as u64)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

async fn run(session: &mut AnalysisSession, replay: Option<Vec<FrameInput>>) {
    let started = Instant::now();
    let mut replay = replay.map(Vec::into_iter);
    let mut period = frame_period(session);
    let mut ticker = tokio::time::interval(period);
    let mut last_sample_ms = 0;
    let mut valid_frames = 0u64;
    let mut processed = 0u64;

    loop {
        ticker.tick().await;

        let input = match replay.as_mut() {
            Some(frames) => match frames.next() {
                Some(frame) => frame,
                None => break,
            },
            None if processed >= SYNTHETIC_FRAMES => break,
            None => {
                let now = elapsed_ms(started);
                FrameInput {
                    landmarks: synthetic_frame(now),
                    timestamp_ms: now,
                    confidence: None,
                }
            }
        };
        let timestamp_ms = input.timestamp_ms;
        processed += 1;

        let result = session.process_frame(input);
        if result.is_valid {
            valid_frames += 1;
        }

        if timestamp_ms.saturating_sub(last_sample_ms) >= SAMPLE_INTERVAL_MS {
            last_sample_ms = timestamp_ms;
            session.sample_performance(timestamp_ms, SYNTHETIC_MEMORY_PERCENT);
        }

        // Follow the governor's frame rate
        let next_period = frame_period(session);
        if next_period != period {
            period = next_period;
            ticker = tokio::time::interval(period);
        }
    }

    let stats = session.monitor().stats();
    info!(
        "Processed {} frames ({} valid, {} throttled, {} over budget), avg {:.1} fps",
        processed,
        valid_frames,
        session.throttle().rejected_count(),
        stats.frame_drops,
        stats.avg_fps
    );
    let lateral = session.pipeline().history().lateral_shift();
    info!(
        "Max lateral shift {:+.3} at depth {:?}",
        lateral.signed_max_shift(),
        lateral.depth_at_max()
    );
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_logging();
    let args = Args::parse();

    let settings = Settings::load(args.settings.as_deref())?;
    let mut session = AnalysisSession::new(&settings, Arc::new(TracingErrorReporter))?;

    session.subscribe_optimization(|event| {
        info!(
            "Capture should switch to {:?} ({})",
            event.new.settings(),
            event.reason
        );
        Ok(())
    });
    session.subscribe_performance(|update| {
        info!(
            "{:.1} fps (avg {:.1}), {:?}, {} drops",
            update.fps, update.avg_fps, update.grade, update.frame_drops
        );
        Ok(())
    });

    let replay = match &args.replay {
        Some(path) => Some(load_replay(path).await?),
        None => None,
    };
    run(&mut session, replay).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_settings_and_replay() {
        let args = Args::try_parse_from(["liftsense", "squat.toml", "--replay", "set1.jsonl"]).unwrap();
        assert_eq!(args.settings, Some(PathBuf::from("squat.toml")));
        assert_eq!(args.replay, Some(PathBuf::from("set1.jsonl")));

        let args = Args::try_parse_from(["liftsense"]).unwrap();
        assert!(args.settings.is_none() && args.replay.is_none());
    }

    #[test]
    fn test_rejects_bad_command_lines() {
        assert!(Args::try_parse_from(["liftsense", "--replay"]).is_err());
        assert!(Args::try_parse_from(["liftsense", "--replya", "set1.jsonl"]).is_err());
        assert!(Args::try_parse_from(["liftsense", "a.toml", "b.toml"]).is_err());

        let help = Args::try_parse_from(["liftsense", "--help"]).unwrap_err();
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_synthetic_frames_are_reliable_squats() {
        let frame = synthetic_frame(500);
        let mut pipeline = liftsense::MetricsPipeline::new(Default::default()).unwrap();
        assert!(pipeline.process(&frame, 500).has_valid_pose);
    }
}
