pub mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The one encode profile the tool applies to every clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeProfile {
    pub width: u32,
    pub height: u32,
    pub video_codec: &'static str,
    /// Constant rate factor; lower means better quality and bigger files.
    pub crf: u8,
    pub preset: &'static str,
    pub audio_codec: &'static str,
}

impl EncodeProfile {
    /// 1280x720 H.264, CRF 28, `slower` preset, audio passed through untouched.
    pub const HD_720: EncodeProfile = EncodeProfile {
        width: 1280,
        height: 720,
        video_codec: "libx264",
        crf: 28,
        preset: "slower",
        audio_codec: "copy",
    };

    pub fn scale_filter(&self) -> String {
        format!("scale={}:{}", self.width, self.height)
    }
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("encoder binary not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("encoder {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("IO error running encoder: {0}")]
    Io(#[from] io::Error),
}

/// Re-encodes one file. Implementations must not touch `input`.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;

    /// One-off check run before a batch starts.
    fn verify(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}
