use crate::encoder::{TranscodeError, Transcoder};
use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::safe_move::{move_file, path_occupied, remove_if_exists};
use crate::scanner::{self, VideoFile};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What happened to one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Original moved to the backup, downscaled copy written in its place.
    Converted,
    /// A backup already existed; nothing was touched.
    Skipped,
    /// The encoder failed and the original bytes were put back.
    Restored { reason: String },
    /// A filesystem step failed. Where the move had not committed, the
    /// original is still at its path; otherwise `reason` says where it is.
    Failed { reason: String },
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub discovered: usize,
    pub resumed: usize,
    pub converted: usize,
    pub skipped: usize,
    pub restored: Vec<(PathBuf, String)>,
    pub failed: Vec<(PathBuf, String)>,
    pub duration: Duration,
}

impl RunSummary {
    fn record(&mut self, relative: PathBuf, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Converted => self.converted += 1,
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Restored { reason } => self.restored.push((relative, reason)),
            FileOutcome::Failed { reason } => self.failed.push((relative, reason)),
        }
    }

    pub fn processed(&self) -> usize {
        self.converted + self.skipped + self.restored.len() + self.failed.len()
    }
}

enum Job {
    /// Clip found on the drive.
    Fresh(VideoFile),
    /// Backup whose drive copy is missing, left by an interrupted run.
    Resume(VideoFile),
}

impl Job {
    fn video(&self) -> &VideoFile {
        match self {
            Job::Fresh(v) | Job::Resume(v) => v,
        }
    }
}

/// Moves each clip into the backup tree and re-encodes it in place.
pub struct ShrinkEngine<T: Transcoder> {
    drive_root: PathBuf,
    backup_root: PathBuf,
    transcoder: T,
    jobs: usize,
    resume_pending: bool,
}

impl<T: Transcoder> ShrinkEngine<T> {
    pub fn new(drive_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>, transcoder: T) -> Self {
        Self {
            drive_root: drive_root.into(),
            backup_root: backup_root.into(),
            transcoder,
            jobs: 1,
            resume_pending: false,
        }
    }

    /// Number of clips converted at once. Values below 1 are treated as 1.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Also regenerate drive copies for backups whose original path is empty.
    pub fn with_resume_pending(mut self, resume: bool) -> Self {
        self.resume_pending = resume;
        self
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Clips currently on the drive.
    pub fn discover(&self) -> Result<Vec<VideoFile>, Error> {
        if !self.drive_root.is_dir() {
            return Err(Error::InvalidDrive(self.drive_root.clone()));
        }
        Ok(scanner::find_videos(&self.drive_root)?)
    }

    /// Refuse a backup root that discovery would walk into. Backups found as
    /// clips would be moved again and re-encoded in place.
    pub fn check_backup_location(&self) -> Result<(), Error> {
        let drive = fs::canonicalize(&self.drive_root)?;
        let backup = resolve_path(&self.backup_root)?;

        let inside_known_folder = scanner::KNOWN_FOLDERS
            .iter()
            .any(|folder| backup.starts_with(drive.join(folder)));
        if inside_known_folder {
            return Err(Error::BackupInsideDrive(self.backup_root.clone()));
        }
        Ok(())
    }

    /// Backups with no file at the matching drive path, rooted at the drive.
    pub fn pending_conversions(&self) -> Result<Vec<VideoFile>, Error> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }

        let pending = scanner::find_videos(&self.backup_root)?
            .into_iter()
            .map(|backup| VideoFile {
                path: self.drive_root.join(&backup.relative),
                relative: backup.relative,
            })
            .filter(|video| !path_occupied(&video.path))
            .collect();
        Ok(pending)
    }

    /// Run the whole batch:
    /// 1. Discover clips (and pending conversions when enabled)
    /// 2. Check the encoder once
    /// 3. Move, convert and, on failure, restore each clip
    ///
    /// Only a missing encoder aborts the batch; everything else is recorded
    /// per file in the returned summary.
    pub fn run(&self, reporter: &dyn ProgressReporter) -> Result<RunSummary, Error> {
        let start = Instant::now();

        reporter.on_discovery_start();
        let videos = self.discover()?;
        self.check_backup_location()?;
        fs::create_dir_all(&self.backup_root)?;
        let pending = if self.resume_pending {
            self.pending_conversions()?
        } else {
            Vec::new()
        };
        reporter.on_discovery_complete(videos.len(), pending.len());

        let mut summary = RunSummary {
            discovered: videos.len(),
            resumed: pending.len(),
            ..Default::default()
        };

        if videos.is_empty() && pending.is_empty() {
            info!("No Tesla videos found.");
            summary.duration = start.elapsed();
            reporter.on_batch_complete(&summary);
            return Ok(summary);
        }

        if let Err(e) = self.verify_encoder() {
            summary.duration = start.elapsed();
            reporter.on_batch_complete(&summary);
            return Err(e);
        }

        info!(
            "Found {} video(s), {} pending. Starting conversion...",
            videos.len(),
            pending.len()
        );

        let jobs: Vec<Job> = pending
            .into_iter()
            .map(Job::Resume)
            .chain(videos.into_iter().map(Job::Fresh))
            .collect();

        let results = match self.run_jobs(&jobs, reporter) {
            Ok(results) => results,
            Err(e) => {
                summary.duration = start.elapsed();
                reporter.on_batch_complete(&summary);
                return Err(e);
            }
        };

        for (relative, outcome) in results {
            summary.record(relative, outcome);
        }
        summary.duration = start.elapsed();
        reporter.on_batch_complete(&summary);

        Ok(summary)
    }

    fn run_jobs(
        &self,
        jobs: &[Job],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<(PathBuf, FileOutcome)>, Error> {
        if self.jobs == 1 {
            return jobs
                .iter()
                .map(|job| self.run_job(job, reporter))
                .collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| Error::Other(format!("Could not start worker pool: {}", e)))?;
        pool.install(|| {
            jobs.par_iter()
                .map(|job| self.run_job(job, reporter))
                .collect()
        })
    }

    fn verify_encoder(&self) -> Result<(), Error> {
        match self.transcoder.verify() {
            Ok(()) => Ok(()),
            Err(TranscodeError::Missing(path)) => Err(Error::EncoderMissing(path)),
            Err(e) => Err(Error::Other(format!("Encoder check failed: {}", e))),
        }
    }

    fn run_job(
        &self,
        job: &Job,
        reporter: &dyn ProgressReporter,
    ) -> Result<(PathBuf, FileOutcome), Error> {
        let video = job.video();
        reporter.on_file_start(&video.relative);
        let outcome = match job {
            Job::Fresh(video) => self.process_file(video)?,
            Job::Resume(video) => self.resume_file(video)?,
        };
        reporter.on_file_complete(&video.relative, &outcome);
        Ok((video.relative.clone(), outcome))
    }

    /// Back up one clip and replace it with a downscaled copy.
    ///
    /// An existing backup means the clip was already processed, so it is left
    /// alone. Returns `Err` only when the encoder binary is missing, after the
    /// original has been put back.
    pub fn process_file(&self, video: &VideoFile) -> Result<FileOutcome, Error> {
        let backup = video.rebase(&self.backup_root);
        let relative = video.relative.display();

        if let Some(parent) = backup.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Could not create {}: {}", parent.display(), e);
                return Ok(FileOutcome::Failed {
                    reason: format!("could not create backup folder: {}", e),
                });
            }
        }

        if path_occupied(&backup) {
            info!("Skipping (already backed up): {}", relative);
            return Ok(FileOutcome::Skipped);
        }

        if let Err(e) = move_file(&video.path, &backup) {
            error!("Could not move {} to backup: {}", relative, e);
            return Ok(FileOutcome::Failed {
                reason: format!("could not move to backup: {}", e),
            });
        }
        debug!("Moved {} -> {}", video.path.display(), backup.display());

        self.convert(video, &backup)
    }

    /// Regenerate the drive copy of a clip whose backup exists but whose
    /// original path is empty.
    pub fn resume_file(&self, video: &VideoFile) -> Result<FileOutcome, Error> {
        let backup = video.rebase(&self.backup_root);
        info!("Resuming pending conversion: {}", video.relative.display());

        if let Some(parent) = video.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Could not create {}: {}", parent.display(), e);
                return Ok(FileOutcome::Failed {
                    reason: format!(
                        "could not recreate drive folder, original kept at {}: {}",
                        backup.display(),
                        e
                    ),
                });
            }
        }

        self.convert(video, &backup)
    }

    fn convert(&self, video: &VideoFile, backup: &Path) -> Result<FileOutcome, Error> {
        let relative = video.relative.display();
        info!("Downscaling {} ...", relative);

        let failure = match self.transcoder.transcode(backup, &video.path) {
            Ok(()) if path_occupied(&video.path) => {
                info!("Converted {}", relative);
                return Ok(FileOutcome::Converted);
            }
            Ok(()) => TranscodeError::Failed {
                status: "reported success".to_string(),
                stderr: "no output file was written".to_string(),
            },
            Err(e) => e,
        };

        let restored = restore(&video.path, backup);

        if let TranscodeError::Missing(path) = &failure {
            if let Err(e) = restored {
                error!(
                    "Could not restore {}, original kept at {}: {}",
                    relative,
                    backup.display(),
                    e
                );
            }
            return Err(Error::EncoderMissing(path.clone()));
        }

        match restored {
            Ok(()) => {
                warn!("Failed to convert {}, restored original: {}", relative, failure);
                Ok(FileOutcome::Restored {
                    reason: failure.to_string(),
                })
            }
            Err(e) => {
                error!(
                    "Failed to convert {} and could not restore it, original kept at {}: {}",
                    relative,
                    backup.display(),
                    e
                );
                Ok(FileOutcome::Failed {
                    reason: format!(
                        "{}; restore failed ({}), original kept at {}",
                        failure,
                        e,
                        backup.display()
                    ),
                })
            }
        }
    }
}

/// Canonical form of `path`, which may not exist yet: the deepest existing
/// ancestor is canonicalized and the missing tail appended.
fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut missing: Vec<&std::ffi::OsStr> = Vec::new();
    let mut existing = absolute.as_path();
    loop {
        match fs::canonicalize(existing) {
            Ok(base) => {
                return Ok(missing.iter().rev().fold(base, |acc, part| acc.join(part)));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                match (existing.file_name(), existing.parent()) {
                    (Some(name), Some(parent)) => {
                        missing.push(name);
                        existing = parent;
                    }
                    _ => return Err(err),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Drop any partial encoder output and move the backup back into place.
fn restore(original: &Path, backup: &Path) -> io::Result<()> {
    if remove_if_exists(original)? {
        debug!("Removed partial output {}", original.display());
    }
    move_file(backup, original)
}
