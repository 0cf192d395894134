use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::tempdir;

use dashcam_shrink_core::{
    Error, FileOutcome, ProgressReporter, RunSummary, ShrinkEngine, SilentReporter,
    TranscodeError, Transcoder,
};

const FAKE_CLIP: &[u8] = b"fake mp4 data";
const DOWNSCALED: &[u8] = b"downscaled data";

fn make_video(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, FAKE_CLIP).unwrap();
}

/// Writes fixed bytes to the output, failing for inputs whose file name
/// appears in `fail_on`. Failures leave a partial file behind.
#[derive(Default)]
struct FakeTranscoder {
    fail_on: Vec<&'static str>,
    calls: AtomicUsize,
}

impl FakeTranscoder {
    fn failing_on(names: &[&'static str]) -> Self {
        Self {
            fail_on: names.to_vec(),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for FakeTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(fs::read(input).unwrap(), FAKE_CLIP, "input must be the original");

        let name = input.file_name().unwrap().to_string_lossy().into_owned();
        if self.fail_on.iter().any(|f| *f == name) {
            fs::write(output, b"partial").unwrap();
            return Err(TranscodeError::Failed {
                status: "exited with status code 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }

        fs::write(output, DOWNSCALED)?;
        Ok(())
    }
}

/// Passes the preflight check but reports a missing binary on every file.
struct VanishingTranscoder;

impl Transcoder for VanishingTranscoder {
    fn transcode(&self, _input: &Path, _output: &Path) -> Result<(), TranscodeError> {
        Err(TranscodeError::Missing(PathBuf::from("/gone/ffmpeg")))
    }
}

/// Missing from the start.
struct AbsentTranscoder;

impl Transcoder for AbsentTranscoder {
    fn transcode(&self, _input: &Path, _output: &Path) -> Result<(), TranscodeError> {
        panic!("transcode must not run when verify fails");
    }

    fn verify(&self) -> Result<(), TranscodeError> {
        Err(TranscodeError::Missing(PathBuf::from("/nowhere/ffmpeg")))
    }
}

/// Claims success without writing anything.
struct SilentFailureTranscoder;

impl Transcoder for SilentFailureTranscoder {
    fn transcode(&self, _input: &Path, _output: &Path) -> Result<(), TranscodeError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingReporter {
    discovered: Mutex<Option<(usize, usize)>>,
    started: AtomicUsize,
    completed: Mutex<Vec<(PathBuf, FileOutcome)>>,
    batch_done: AtomicUsize,
}

impl ProgressReporter for RecordingReporter {
    fn on_discovery_complete(&self, total_files: usize, pending: usize) {
        *self.discovered.lock().unwrap() = Some((total_files, pending));
    }

    fn on_file_start(&self, _relative: &Path) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_file_complete(&self, relative: &Path, outcome: &FileOutcome) {
        self.completed
            .lock()
            .unwrap()
            .push((relative.to_path_buf(), outcome.clone()));
    }

    fn on_batch_complete(&self, _summary: &RunSummary) {
        self.batch_done.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_process_moves_and_recreates() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    let original = drive.join("TeslaCam/SavedClips/clip1.mp4");
    make_video(&original);

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::default());
    let summary = engine.run(&SilentReporter).unwrap();

    let backup_copy = backup.join("TeslaCam/SavedClips/clip1.mp4");
    assert_eq!(fs::read(&backup_copy).unwrap(), FAKE_CLIP);
    assert_eq!(fs::read(&backup_copy).unwrap().len(), 13);
    assert_eq!(fs::read(&original).unwrap(), DOWNSCALED);
    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.converted, 1);
    assert!(summary.failed.is_empty());
}

#[test]
fn test_second_run_is_noop() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    for folder in ["RecentClips", "SavedClips", "SentryClips"] {
        make_video(&drive.join("TeslaCam").join(folder).join("clip.mp4"));
    }

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::default());
    let first = engine.run(&SilentReporter).unwrap();
    assert_eq!(first.converted, 3);
    assert_eq!(engine.transcoder().calls(), 3);

    let second = engine.run(&SilentReporter).unwrap();
    assert_eq!(second.skipped, 3);
    assert_eq!(second.converted, 0);
    assert!(second.restored.is_empty());
    assert!(second.failed.is_empty());
    assert_eq!(engine.transcoder().calls(), 3, "no re-conversion on second run");

    for folder in ["RecentClips", "SavedClips", "SentryClips"] {
        let rel = Path::new("TeslaCam").join(folder).join("clip.mp4");
        assert_eq!(fs::read(backup.join(&rel)).unwrap(), FAKE_CLIP);
        assert_eq!(fs::read(drive.join(&rel)).unwrap(), DOWNSCALED);
    }
}

#[test]
fn test_existing_backup_leaves_original_untouched() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    let original = drive.join("TeslaCam/RecentClips/clip.mp4");
    make_video(&original);
    let stale = backup.join("TeslaCam/RecentClips/clip.mp4");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, b"older backup").unwrap();

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::default());
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.transcoder().calls(), 0);
    assert_eq!(fs::read(&original).unwrap(), FAKE_CLIP);
    assert_eq!(fs::read(&stale).unwrap(), b"older backup");
}

#[test]
fn test_encoder_failure_restores_original_bytes() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    let original = drive.join("TeslaCam/SentryClips/2024-01-01_10-00-00/bad.mp4");
    make_video(&original);

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::failing_on(&["bad.mp4"]));
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(fs::read(&original).unwrap(), FAKE_CLIP);
    assert!(!backup
        .join("TeslaCam/SentryClips/2024-01-01_10-00-00/bad.mp4")
        .exists());
    assert_eq!(summary.restored.len(), 1);
    assert!(summary.restored[0].1.contains("Invalid data"));
    assert!(summary.failed.is_empty());
}

#[test]
fn test_one_failure_does_not_abort_batch() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    make_video(&drive.join("TeslaCam/RecentClips/a.mp4"));
    make_video(&drive.join("TeslaCam/RecentClips/b.mp4"));
    make_video(&drive.join("TeslaCam/SavedClips/c.mp4"));

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::failing_on(&["b.mp4"]));
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(engine.transcoder().calls(), 3);
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.restored.len(), 1);
    assert_eq!(
        summary.restored[0].0,
        PathBuf::from("TeslaCam/RecentClips/b.mp4")
    );
    assert_eq!(fs::read(drive.join("TeslaCam/RecentClips/a.mp4")).unwrap(), DOWNSCALED);
    assert_eq!(fs::read(drive.join("TeslaCam/RecentClips/b.mp4")).unwrap(), FAKE_CLIP);
    assert_eq!(fs::read(drive.join("TeslaCam/SavedClips/c.mp4")).unwrap(), DOWNSCALED);

    // The restored clip is retried on the next run, the others are skipped
    let retry = engine.run(&SilentReporter).unwrap();
    assert_eq!(retry.skipped, 2);
    assert_eq!(retry.restored.len(), 1);
}

#[test]
fn test_missing_encoder_fails_before_touching_files() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    let original = drive.join("TeslaCam/SavedClips/clip1.mp4");
    make_video(&original);

    let engine = ShrinkEngine::new(&drive, &backup, AbsentTranscoder);
    let err = engine.run(&SilentReporter).unwrap_err();

    assert!(matches!(err, Error::EncoderMissing(ref p) if p == Path::new("/nowhere/ffmpeg")));
    assert!(err.to_string().contains("FFMPEG_PATH"));
    assert_eq!(fs::read(&original).unwrap(), FAKE_CLIP);
    assert!(!backup.join("TeslaCam/SavedClips/clip1.mp4").exists());
}

#[test]
fn test_encoder_vanishing_mid_run_restores_and_aborts() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    let first = drive.join("TeslaCam/RecentClips/a.mp4");
    let second = drive.join("TeslaCam/RecentClips/b.mp4");
    make_video(&first);
    make_video(&second);

    let engine = ShrinkEngine::new(&drive, &backup, VanishingTranscoder);
    let err = engine.run(&SilentReporter).unwrap_err();

    assert!(matches!(err, Error::EncoderMissing(_)));
    assert_eq!(fs::read(&first).unwrap(), FAKE_CLIP);
    assert_eq!(fs::read(&second).unwrap(), FAKE_CLIP);
    assert!(!backup.join("TeslaCam/RecentClips/a.mp4").exists());
    assert!(!backup.join("TeslaCam/RecentClips/b.mp4").exists());
}

#[test]
fn test_success_without_output_is_restored() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    let original = drive.join("TeslaCam/SavedClips/clip1.mp4");
    make_video(&original);

    let engine = ShrinkEngine::new(&drive, &backup, SilentFailureTranscoder);
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(summary.restored.len(), 1);
    assert_eq!(fs::read(&original).unwrap(), FAKE_CLIP);
    assert!(!backup.join("TeslaCam/SavedClips/clip1.mp4").exists());
}

#[test]
fn test_empty_drive_does_not_need_encoder() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    fs::create_dir_all(drive.join("DCIM")).unwrap();
    fs::write(drive.join("DCIM/holiday.mp4"), FAKE_CLIP).unwrap();

    let engine = ShrinkEngine::new(&drive, &backup, AbsentTranscoder);
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(summary.discovered, 0);
    assert_eq!(summary.processed(), 0);
    assert!(backup.is_dir());
    assert_eq!(fs::read(drive.join("DCIM/holiday.mp4")).unwrap(), FAKE_CLIP);
}

#[test]
fn test_invalid_drive_path() {
    let tmp = tempdir().unwrap();
    let engine = ShrinkEngine::new(
        tmp.path().join("not-mounted"),
        tmp.path().join("backup"),
        FakeTranscoder::default(),
    );
    let err = engine.run(&SilentReporter).unwrap_err();
    assert!(matches!(err, Error::InvalidDrive(_)));
    assert!(!tmp.path().join("backup").exists());
}

#[test]
fn test_resume_pending_regenerates_missing_original() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    let original = drive.join("TeslaCam/SavedClips/clip1.mp4");
    fs::create_dir_all(drive.join("TeslaCam")).unwrap();
    // Interrupted run: moved to backup, conversion never finished
    make_video(&backup.join("TeslaCam/SavedClips/clip1.mp4"));

    let without = ShrinkEngine::new(&drive, &backup, FakeTranscoder::default());
    let summary = without.run(&SilentReporter).unwrap();
    assert_eq!(summary.resumed, 0);
    assert!(!original.exists());
    assert_eq!(without.transcoder().calls(), 0);

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::default())
        .with_resume_pending(true);
    assert_eq!(engine.pending_conversions().unwrap().len(), 1);
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(summary.resumed, 1);
    assert_eq!(summary.converted, 1);
    assert_eq!(fs::read(&original).unwrap(), DOWNSCALED);
    assert_eq!(
        fs::read(backup.join("TeslaCam/SavedClips/clip1.mp4")).unwrap(),
        FAKE_CLIP
    );
    assert!(engine.pending_conversions().unwrap().is_empty());
}

#[test]
fn test_resume_pending_failure_moves_backup_home() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    fs::create_dir_all(&drive).unwrap();
    make_video(&backup.join("TeslaCam/RecentClips/bad.mp4"));

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::failing_on(&["bad.mp4"]))
        .with_resume_pending(true);
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(summary.restored.len(), 1);
    assert_eq!(
        fs::read(drive.join("TeslaCam/RecentClips/bad.mp4")).unwrap(),
        FAKE_CLIP
    );
    assert!(!backup.join("TeslaCam/RecentClips/bad.mp4").exists());
}

#[test]
fn test_parallel_jobs_convert_each_file_once() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    for i in 0..8 {
        let folder = ["RecentClips", "SavedClips", "SentryClips"][i % 3];
        make_video(&drive.join(format!("TeslaCam/{}/clip{}.mp4", folder, i)));
    }

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::failing_on(&["clip5.mp4"]))
        .with_jobs(4);
    let summary = engine.run(&SilentReporter).unwrap();

    assert_eq!(engine.transcoder().calls(), 8);
    assert_eq!(summary.converted, 7);
    assert_eq!(summary.restored.len(), 1);
    assert_eq!(summary.processed(), 8);
}

#[test]
fn test_reporter_sees_every_file() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    make_video(&drive.join("TeslaCam/RecentClips/a.mp4"));
    make_video(&drive.join("TeslaCam/SavedClips/b.mp4"));

    let reporter = RecordingReporter::default();
    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::failing_on(&["b.mp4"]));
    engine.run(&reporter).unwrap();

    assert_eq!(*reporter.discovered.lock().unwrap(), Some((2, 0)));
    assert_eq!(reporter.started.load(Ordering::SeqCst), 2);
    assert_eq!(reporter.batch_done.load(Ordering::SeqCst), 1);

    let completed = reporter.completed.lock().unwrap();
    let a = completed
        .iter()
        .find(|(p, _)| p == Path::new("TeslaCam/RecentClips/a.mp4"))
        .unwrap();
    assert_eq!(a.1, FileOutcome::Converted);
    let b = completed
        .iter()
        .find(|(p, _)| p == Path::new("TeslaCam/SavedClips/b.mp4"))
        .unwrap();
    assert!(matches!(b.1, FileOutcome::Restored { .. }));
}

#[test]
fn test_backup_inside_teslacam_is_rejected() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let original = drive.join("TeslaCam/SavedClips/clip1.mp4");
    make_video(&original);

    for backup in [
        drive.join("TeslaCam/Backup"),
        drive.join("TeslaCam/SavedClips/old/backups"),
    ] {
        let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::default());
        let err = engine.run(&SilentReporter).unwrap_err();

        assert!(matches!(err, Error::BackupInsideDrive(ref p) if *p == backup));
        assert_eq!(engine.transcoder().calls(), 0);
        assert!(!backup.exists());
    }
    assert_eq!(fs::read(&original).unwrap(), FAKE_CLIP);
}

#[test]
fn test_backup_on_drive_outside_teslacam_stays_idempotent() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = drive.join("Backup");
    let original = drive.join("TeslaCam/SavedClips/clip1.mp4");
    make_video(&original);

    let engine = ShrinkEngine::new(&drive, &backup, FakeTranscoder::default());
    let first = engine.run(&SilentReporter).unwrap();
    assert_eq!(first.converted, 1);

    let second = engine.run(&SilentReporter).unwrap();
    assert_eq!(second.discovered, 1);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.converted, 0);
    assert_eq!(engine.transcoder().calls(), 1);
    assert_eq!(
        fs::read(backup.join("TeslaCam/SavedClips/clip1.mp4")).unwrap(),
        FAKE_CLIP
    );
    assert_eq!(fs::read(&original).unwrap(), DOWNSCALED);
}

#[test]
fn test_fatal_error_still_completes_batch() {
    let tmp = tempdir().unwrap();
    let drive = tmp.path().join("drive");
    let backup = tmp.path().join("backup");
    make_video(&drive.join("TeslaCam/RecentClips/a.mp4"));

    let reporter = RecordingReporter::default();
    let engine = ShrinkEngine::new(&drive, &backup, AbsentTranscoder);
    assert!(engine.run(&reporter).is_err());
    assert_eq!(reporter.batch_done.load(Ordering::SeqCst), 1);

    let reporter = RecordingReporter::default();
    let engine = ShrinkEngine::new(&drive, &backup, VanishingTranscoder);
    assert!(engine.run(&reporter).is_err());
    assert_eq!(reporter.batch_done.load(Ordering::SeqCst), 1);
    assert_eq!(reporter.started.load(Ordering::SeqCst), 1);
}
