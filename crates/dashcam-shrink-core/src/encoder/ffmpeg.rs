use super::{EncodeProfile, TranscodeError, Transcoder};
use crate::config::AppConfig;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, trace};

const STDERR_TAIL_LINES: usize = 5;

/// Runs an external ffmpeg binary with a fixed [`EncodeProfile`].
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    profile: EncodeProfile,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            profile: EncodeProfile::HD_720,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.ffmpeg_path.clone())
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments passed to ffmpeg, without the binary itself.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let p = &self.profile;
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_os_string());
        args.extend(
            [
                "-vf".to_string(),
                p.scale_filter(),
                "-c:v".to_string(),
                p.video_codec.to_string(),
                "-crf".to_string(),
                p.crf.to_string(),
                "-preset".to_string(),
                p.preset.to_string(),
                "-c:a".to_string(),
                p.audio_codec.to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.as_os_str().to_os_string());
        args
    }

    fn spawn_error(&self, err: io::Error) -> TranscodeError {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                TranscodeError::Missing(self.binary.clone())
            }
            _ => TranscodeError::Io(err),
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.build_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!("{:?}", cmd);

        let out = cmd.output().map_err(|e| self.spawn_error(e))?;
        if out.status.success() {
            trace!("ffmpeg succeeded for {}", output.display());
            return Ok(());
        }

        Err(TranscodeError::Failed {
            status: describe_status(out.status),
            stderr: stderr_tail(&out.stderr),
        })
    }

    fn verify(&self) -> Result<(), TranscodeError> {
        let status = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| self.spawn_error(e))?;

        if status.success() {
            Ok(())
        } else {
            Err(TranscodeError::Failed {
                status: describe_status(status),
                stderr: format!("'{} -version' did not succeed", self.binary.display()),
            })
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exited with status code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}
