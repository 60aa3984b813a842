//! Command implementations
//!
//! Each command takes already-built components so the frame loops can run
//! against scripted detectors in tests; [`run`] builds them from config.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use alerting::{AlertDecision, AlertLatch};
use anyhow::{bail, Context, Result};
use dms::{AlertTrigger, DrowsinessReading, DrowsinessTracker};
use driver_auth::{AuthModule, CaptureOutcome, VerificationAttempt, VerificationStatus};
use face_detect::FaceLocalizer;
use image::imageops;
use serde::Serialize;
use tracing::{info, warn};
use video_frame::{ImageSequence, VideoFrame};

use crate::cli::Commands;
use crate::config::MonitorConfig;
use crate::store::{RecordStore, StoreError};

/// Run one CLI command
pub fn run(command: Commands, config: &MonitorConfig) -> Result<()> {
    config.validate()?;
    match command {
        Commands::Enroll { name, frames, license } => {
            let mut store = open_store(config)?;
            let mut auth = auth_module(config)?;
            let summary = enroll(&mut auth, &mut store, &name, license, open_frames(&frames, config)?)?;
            println!(
                "Enrolled '{}' with {} samples ({} frames rejected)",
                summary.identity, summary.samples, summary.rejected
            );
        }
        Commands::Verify { frames } => {
            let store = open_store(config)?;
            let mut auth = auth_module(config)?;
            if let Err(e) = auth.rebuild_gallery(&store.records()) {
                warn!("{}", e);
            }
            match verify(&mut auth, config.max_verify_frames, open_frames(&frames, config)?) {
                VerificationStatus::Verified(name) => println!("Verified: {}", name),
                _ => bail!("driver not recognized"),
            }
        }
        Commands::Monitor {
            frames,
            annotated,
            snapshots,
        } => {
            let tracker = DrowsinessTracker::from_config(config.tracker_config())
                .context("failed to build drowsiness tracker")?;
            let mut latch = AlertLatch::new(config.alert.clone());
            let options = MonitorOptions { annotated, snapshots };
            let stdout = io::stdout();
            let summary = monitor(
                &tracker,
                &mut latch,
                open_frames(&frames, config)?,
                &mut stdout.lock(),
                &options,
            )?;
            info!("Monitored {} frames, {} alert(s)", summary.frames, summary.alerts);
        }
        Commands::List => {
            let store = open_store(config)?;
            for line in list(&store) {
                println!("{}", line);
            }
        }
        Commands::Remove { name } => {
            let mut store = open_store(config)?;
            if !store.remove(&name) {
                bail!("no driver named '{}'", name);
            }
            store
                .save()
                .with_context(|| format!("failed to save {}", store.path().display()))?;
            println!("Removed '{}'", name);
        }
    }
    Ok(())
}

fn open_store(config: &MonitorConfig) -> Result<RecordStore> {
    RecordStore::open(&config.store_path)
        .with_context(|| format!("failed to open store {}", config.store_path.display()))
}

fn auth_module(config: &MonitorConfig) -> Result<AuthModule> {
    let localizer = FaceLocalizer::from_cascade_file(&config.face_cascade, config.auth_detection)
        .with_context(|| format!("failed to load face cascade {}", config.face_cascade.display()))?;
    Ok(AuthModule::new(localizer))
}

fn open_frames(dir: &Path, config: &MonitorConfig) -> Result<ImageSequence> {
    ImageSequence::open(dir, config.dms.frame_rate_hz)
        .with_context(|| format!("failed to open frames in {}", dir.display()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollSummary {
    pub identity: String,
    pub samples: usize,
    pub rejected: usize,
}

/// Capture samples from `frames` until the soft cap, then commit and store
pub fn enroll(
    auth: &mut AuthModule,
    store: &mut RecordStore,
    name: &str,
    license: Option<String>,
    frames: impl IntoIterator<Item = VideoFrame>,
) -> Result<EnrollSummary> {
    let name = name.trim();
    if store.contains(name) {
        return Err(StoreError::Duplicate(name.to_string()).into());
    }

    let mut session = auth.enrollment();
    let mut rejected = 0;
    for frame in frames {
        if session.is_full() {
            break;
        }
        match session.capture(&frame) {
            CaptureOutcome::Accepted { total } => println!("Captured sample {}", total),
            CaptureOutcome::Rejected(reason) => {
                rejected += 1;
                println!("Frame {}: {}", frame.sequence, reason);
            }
        }
    }

    let record = session.commit(name)?;
    let samples = record.samples().len();
    store.add(record.to_stored()?, license)?;
    store
        .save()
        .with_context(|| format!("failed to save {}", store.path().display()))?;
    info!(
        "Enrolled '{}' at {} into {}",
        record.identity(),
        record.enrolled_at().to_rfc3339(),
        store.path().display()
    );

    if let Err(e) = auth.rebuild_gallery(&store.records()) {
        warn!("Gallery rebuild after enrollment failed: {}", e);
    }
    Ok(EnrollSummary {
        identity: name.to_string(),
        samples,
        rejected,
    })
}

/// Feed frames to one verification attempt; running out of frames counts as exhausted
pub fn verify(
    auth: &mut AuthModule,
    max_frames: usize,
    frames: impl IntoIterator<Item = VideoFrame>,
) -> VerificationStatus {
    let mut attempt = VerificationAttempt::new(max_frames);
    for frame in frames {
        match attempt.observe(auth, &frame) {
            VerificationStatus::Pending => continue,
            done => return done,
        }
    }
    VerificationStatus::Exhausted
}

/// One line per enrolled driver
pub fn list(store: &RecordStore) -> Vec<String> {
    if store.is_empty() {
        return vec!["No drivers enrolled".to_string()];
    }
    store
        .entries()
        .iter()
        .map(|entry| {
            let samples = driver_auth::sample::decode_samples(&entry.record.blob)
                .map(|s| s.len().to_string())
                .unwrap_or_else(|_| "corrupt".to_string());
            let enrolled = entry
                .record
                .enrolled_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "{}\tlicense={}\tsamples={}\tenrolled={}",
                entry.record.identity,
                entry.license_no.as_deref().unwrap_or("-"),
                samples,
                enrolled
            )
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub annotated: Option<PathBuf>,
    pub snapshots: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    pub frames: usize,
    pub alerts: usize,
}

/// Per-frame monitor output
#[derive(Debug, Serialize)]
struct FrameReport<'a> {
    sequence: u32,
    timestamp_ms: u64,
    #[serde(flatten)]
    reading: &'a DrowsinessReading,
    alert: AlertDecision,
}

/// Run a monitoring session over `frames`, writing one JSON line per frame to `out`
pub fn monitor<W: Write>(
    tracker: &DrowsinessTracker,
    latch: &mut AlertLatch,
    frames: impl IntoIterator<Item = VideoFrame>,
    out: &mut W,
    options: &MonitorOptions,
) -> Result<MonitorSummary> {
    for dir in [&options.annotated, &options.snapshots].into_iter().flatten() {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut state = tracker.new_state();
    tracker.reset(&mut state);
    latch.reset();

    let mut summary = MonitorSummary { frames: 0, alerts: 0 };
    for mut frame in frames {
        let clean = options.snapshots.as_ref().map(|_| frame.clone());
        let reading = tracker.process(&mut frame, &mut state);
        let alert = latch.observe(reading.drowsy, reading.closed_duration_secs);
        summary.frames += 1;

        let report = FrameReport {
            sequence: frame.sequence,
            timestamp_ms: frame.timestamp_ns / 1_000_000,
            reading: &reading,
            alert,
        };
        serde_json::to_writer(&mut *out, &report)?;
        writeln!(out)?;

        if let Some(dir) = &options.annotated {
            save_frame(&frame, &dir.join(format!("frame_{:06}.png", frame.sequence)));
        }
        if alert == AlertDecision::Fire {
            summary.alerts += 1;
            let cause = match reading.trigger {
                Some(AlertTrigger::RisingEdge) => "eyes reopened after long closure",
                _ => "eyes closed",
            };
            warn!(
                "DROWSINESS ALERT at frame {}: {} ({:.2}s)",
                frame.sequence, cause, reading.closed_duration_secs
            );
            if let (Some(dir), Some(clean)) = (&options.snapshots, clean) {
                save_snapshot(&clean, &reading, dir);
            }
        }
    }
    Ok(summary)
}

fn save_frame(frame: &VideoFrame, path: &Path) {
    let Some(rgb) = frame.to_rgb_image() else {
        return;
    };
    if let Err(e) = rgb.save(path) {
        warn!("Failed to write {}: {}", path.display(), e);
    }
}

/// Save the first face (or the whole frame when none was found)
fn save_snapshot(frame: &VideoFrame, reading: &DrowsinessReading, dir: &Path) {
    let Some(rgb) = frame.to_rgb_image() else {
        return;
    };
    let image = match reading.faces.first() {
        Some(obs) => {
            let face = obs.face.clamp_to(rgb.width(), rgb.height());
            imageops::crop_imm(&rgb, face.x, face.y, face.width, face.height).to_image()
        }
        None => rgb,
    };
    let name = format!(
        "drowsy_{}_{:06}.png",
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        frame.sequence
    );
    let path = dir.join(name);
    match image.save(&path) {
        Ok(()) => info!("Saved alert snapshot {}", path.display()),
        Err(e) => warn!("Failed to write snapshot {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerting::AlertConfig;
    use dms::DmsConfig;
    use face_detect::testing::FixedDetector;
    use face_detect::FaceRegion;
    use image::{GrayImage, Luma};

    const FACE: FaceRegion = FaceRegion {
        x: 40,
        y: 20,
        width: 80,
        height: 80,
    };

    fn eye_boxes() -> Vec<FaceRegion> {
        vec![FaceRegion::new(12, 14, 12, 12), FaceRegion::new(56, 14, 12, 12)]
    }

    fn textured(seed: u64) -> VideoFrame {
        VideoFrame::from_gray(GrayImage::from_fn(160, 120, |x, y| {
            let mut h = ((x as u64) << 32 | y as u64) ^ seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
            h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9);
            Luma([(h >> 40) as u8])
        }))
    }

    fn eyes_frame(eye_value: u8, sequence: u32) -> VideoFrame {
        let eyes: Vec<_> = eye_boxes().iter().map(|e| e.offset(FACE.x, FACE.y)).collect();
        VideoFrame::from_gray(GrayImage::from_fn(160, 120, |x, y| {
            let px = FaceRegion::new(x, y, 1, 1);
            Luma([if eyes.iter().any(|e| e.contains(&px)) { eye_value } else { 150 }])
        }))
        .with_timing(sequence as u64 * 33_333_333, sequence)
    }

    fn auth() -> AuthModule {
        AuthModule::new(FaceLocalizer::new(FixedDetector::new(vec![FACE])))
    }

    #[test]
    fn test_enroll_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("drivers.db")).unwrap();
        let mut auth = auth();

        let frames = (0..6).map(|_| textured(7)).chain([VideoFrame::empty()]);
        let summary = enroll(&mut auth, &mut store, "ana", None, frames).unwrap();
        assert_eq!(summary.samples, 6);
        assert_eq!(summary.rejected, 1);

        let reopened = RecordStore::open(dir.path().join("drivers.db")).unwrap();
        assert!(reopened.contains("ana"));
        assert!(list(&reopened)[0].starts_with("ana\tlicense=-\tsamples=6"));

        let status = verify(&mut auth, 10, [VideoFrame::empty(), textured(7)]);
        assert_eq!(status, VerificationStatus::Verified("ana".into()));
    }

    #[test]
    fn test_enroll_duplicate_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("drivers.db")).unwrap();
        let mut auth = auth();
        enroll(&mut auth, &mut store, "ana", None, (0..5).map(|_| textured(1))).unwrap();

        let again = enroll(&mut auth, &mut store, "ana", None, (0..5).map(|_| textured(2)));
        assert!(again.is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_enroll_too_few_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path().join("drivers.db")).unwrap();
        let result = enroll(&mut auth(), &mut store, "ana", None, (0..3).map(|_| textured(1)));
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_verify_runs_out_of_frames() {
        let mut auth = auth();
        assert_eq!(verify(&mut auth, 50, [textured(3)]), VerificationStatus::Exhausted);
    }

    #[test]
    fn test_run_rejects_invalid_alert_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MonitorConfig {
            store_path: dir.path().join("drivers.db"),
            ..Default::default()
        };
        config.alert.rearm_below_secs = 5.0;
        assert!(run(Commands::List, &config).is_err());

        config.alert.rearm_below_secs = 1.0;
        assert!(run(Commands::List, &config).is_ok());
    }

    #[test]
    fn test_monitor_lower_duration_fires_with_require_duration() {
        let dms = DmsConfig {
            alert_duration_secs: 2.0,
            ..Default::default()
        };
        let config = MonitorConfig {
            dms: dms.clone(),
            alert: AlertConfig {
                alert_duration_secs: 2.0,
                require_duration: true,
                ..Default::default()
            },
            ..Default::default()
        };
        config.validate().unwrap();

        let tracker = DrowsinessTracker::new(
            dms,
            FaceLocalizer::new(FixedDetector::new(vec![FACE])),
            FixedDetector::new(eye_boxes()),
        )
        .unwrap();
        let mut latch = AlertLatch::new(config.alert.clone());
        let mut out = Vec::new();
        let options = MonitorOptions { annotated: None, snapshots: None };
        let summary = monitor(&tracker, &mut latch, (0..70).map(|i| eyes_frame(0, i)), &mut out, &options).unwrap();
        assert_eq!(summary.alerts, 1);

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        // 60 closed frames at 30 fps reach 2.0 s
        assert_eq!(lines[58]["alert"], "idle");
        assert_eq!(lines[59]["alert"], "fire");
        assert_eq!(lines[60]["alert"], "suppressed");
    }

    #[test]
    fn test_monitor_emits_json_lines_and_alerts_once() {
        let tracker = DrowsinessTracker::new(
            DmsConfig::default(),
            FaceLocalizer::new(FixedDetector::new(vec![FACE])),
            FixedDetector::new(eye_boxes()),
        )
        .unwrap();
        let mut latch = AlertLatch::new(AlertConfig::default());
        let frames = (0..95).map(|i| eyes_frame(0, i)).chain((95..100).map(|i| eyes_frame(255, i)));

        let snapshots = tempfile::tempdir().unwrap();
        let options = MonitorOptions {
            annotated: None,
            snapshots: Some(snapshots.path().to_path_buf()),
        };
        let mut out = Vec::new();
        let summary = monitor(&tracker, &mut latch, frames, &mut out, &options).unwrap();
        assert_eq!(summary, MonitorSummary { frames: 100, alerts: 1 });

        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 100);
        assert_eq!(lines[89]["alert"], "fire");
        assert_eq!(lines[89]["trigger"], "Duration");
        assert_eq!(lines[90]["alert"], "suppressed");
        assert_eq!(lines[95]["trigger"], "RisingEdge");
        assert_eq!(lines[96]["alert"], "idle");
        assert_eq!(lines[10]["sequence"], 10);

        assert_eq!(fs::read_dir(snapshots.path()).unwrap().count(), 1);
    }
}
