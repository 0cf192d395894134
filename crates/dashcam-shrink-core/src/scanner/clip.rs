use super::walk::VideoFile;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::{Component, PathBuf};
use tracing::warn;

const TIMESTAMP_LEN: usize = 19; // "2023-06-14_18-22-05"
const TESLA_ROOT: &str = "TeslaCam";

/// Listing row for one discovered clip.
#[derive(Debug, Clone)]
pub struct ClipInfo {
    pub relative: PathBuf,
    /// Clip category, e.g. `SavedClips`, or the top-level folder when there is none.
    pub folder: String,
    pub size: u64,
    pub recorded_at: Option<NaiveDateTime>,
}

/// Gather size, category and recording time for each clip. Files that can no
/// longer be stat'ed are logged and left out.
pub fn describe_clips(files: &[VideoFile]) -> Vec<ClipInfo> {
    files
        .iter()
        .filter_map(|file| {
            let metadata = match fs::metadata(&file.path) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Error reading metadata for {}: {}", file.path.display(), e);
                    return None;
                }
            };

            let recorded_at = file
                .path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(parse_clip_timestamp)
                .or_else(|| {
                    metadata
                        .modified()
                        .ok()
                        .map(|t| DateTime::<Local>::from(t).naive_local())
                });

            Some(ClipInfo {
                relative: file.relative.clone(),
                folder: clip_folder(file),
                size: metadata.len(),
                recorded_at,
            })
        })
        .collect()
}

fn clip_folder(file: &VideoFile) -> String {
    let mut dirs = file
        .relative
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        });

    match dirs.next() {
        Some(first) if first == TESLA_ROOT => dirs.next().unwrap_or(first),
        Some(first) => first,
        None => String::new(),
    }
}

/// Find a `YYYY-MM-DD_HH-MM-SS` stamp anywhere in a clip file name.
///
/// The date/time separator may be `_`, `T` or `-`; time fields may be split by
/// `-`, `_` or `:`.
pub fn parse_clip_timestamp(name: &str) -> Option<NaiveDateTime> {
    let bytes = name.as_bytes();
    if bytes.len() < TIMESTAMP_LEN {
        return None;
    }

    (0..=bytes.len() - TIMESTAMP_LEN).find_map(|start| {
        let window = &bytes[start..start + TIMESTAMP_LEN];
        let normalized = normalize_window(window)?;
        NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d_%H-%M-%S").ok()
    })
}

fn normalize_window(window: &[u8]) -> Option<String> {
    let mut out = String::with_capacity(TIMESTAMP_LEN);
    for (i, &b) in window.iter().enumerate() {
        let c = match i {
            4 | 7 if b == b'-' => '-',
            10 if matches!(b, b'_' | b'T' | b'-') => '_',
            13 | 16 if matches!(b, b'-' | b'_' | b':') => '-',
            4 | 7 | 10 | 13 | 16 => return None,
            _ if b.is_ascii_digit() => b as char,
            _ => return None,
        };
        out.push(c);
    }
    Some(out)
}
