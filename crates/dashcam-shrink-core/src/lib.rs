pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod progress;
pub mod safe_move;
pub mod scanner;

pub use config::AppConfig;
pub use encoder::{EncodeProfile, FfmpegTranscoder, TranscodeError, Transcoder};
pub use engine::{FileOutcome, RunSummary, ShrinkEngine};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use scanner::{ClipInfo, VideoFile};
