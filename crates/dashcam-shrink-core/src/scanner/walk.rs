use crate::config::non_overlapping_directories;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

/// Folders a Tesla writes footage into, relative to the drive root.
/// `TeslaCam` already contains the others; the overlap is collapsed before walking.
pub const KNOWN_FOLDERS: [&str; 4] = [
    "TeslaCam",
    "TeslaCam/RecentClips",
    "TeslaCam/SavedClips",
    "TeslaCam/SentryClips",
];

pub const VIDEO_EXTENSION: &str = "mp4";

/// A clip found on disk, with its location relative to the scan root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoFile {
    pub path: PathBuf,
    pub relative: PathBuf,
}

impl VideoFile {
    /// Returns `None` when `path` does not live under `root`.
    pub fn new(root: &Path, path: PathBuf) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?.to_path_buf();
        Some(Self { path, relative })
    }

    /// The same relative path re-rooted under `root`.
    pub fn rebase(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }
}

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(VIDEO_EXTENSION))
}

/// Known folders that exist under `root`.
pub fn known_folders_present(root: &Path) -> Vec<&'static str> {
    KNOWN_FOLDERS
        .iter()
        .copied()
        .filter(|folder| root.join(folder).is_dir())
        .collect()
}

/// Collect every video under the known folders of `root`, recursively.
///
/// Missing folders are skipped and an empty drive yields an empty list.
/// Each file appears once, sorted by path. Symlinks are not followed.
pub fn find_videos(root: &Path) -> io::Result<Vec<VideoFile>> {
    let existing: Vec<PathBuf> = known_folders_present(root)
        .into_iter()
        .map(|folder| root.join(folder))
        .collect();
    let walk_roots = non_overlapping_directories(existing);
    debug!("Walking {:?}", walk_roots);

    let mut found: BTreeSet<VideoFile> = BTreeSet::new();
    for dir in &walk_roots {
        visit_dir(root, dir, &mut found)?;
    }

    Ok(found.into_iter().collect())
}

fn visit_dir(root: &Path, dir: &Path, found: &mut BTreeSet<VideoFile>) -> io::Result<()> {
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let permission_denied = err
                    .io_error()
                    .is_some_and(|e| e.kind() == io::ErrorKind::PermissionDenied);
                if permission_denied {
                    let shown = err.path().unwrap_or(dir).display().to_string();
                    error!("Access denied reading {}: {}", shown, err);
                    continue;
                }
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("Error walking {}: {}", dir.display(), err),
                ));
            }
        };

        if !entry.file_type().is_file() || !is_video(entry.path()) {
            continue;
        }

        if let Some(video) = VideoFile::new(root, entry.into_path()) {
            found.insert(video);
        }
    }

    Ok(())
}
