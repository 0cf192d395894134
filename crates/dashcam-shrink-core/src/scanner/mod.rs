pub mod clip;
pub mod walk;

pub use clip::{describe_clips, parse_clip_timestamp, ClipInfo};
pub use walk::{find_videos, known_folders_present, VideoFile, KNOWN_FOLDERS, VIDEO_EXTENSION};
