use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "ffmpeg not found at '{}'. Install ffmpeg and ensure it's on PATH, or set FFMPEG_PATH to the ffmpeg binary.",
        .0.display()
    )]
    EncoderMissing(PathBuf),

    #[error("Drive path {} is not a directory", .0.display())]
    InvalidDrive(PathBuf),

    #[error(
        "Backup directory {} is inside a TeslaCam folder of the drive; choose a location outside TeslaCam",
        .0.display()
    )]
    BackupInsideDrive(PathBuf),

    #[error("{0}")]
    Other(String),
}
