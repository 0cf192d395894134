use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, File as ConfigFile};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Encoder binary. A bare name is resolved through `PATH`.
    pub ffmpeg_path: PathBuf,
    /// Number of files converted at once. 1 keeps the run strictly sequential.
    pub jobs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG_PATH),
            jobs: 1,
        }
    }
}

/// Load `Config.toml` from the working directory if present, then apply the
/// `FFMPEG_PATH` environment override.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = base_builder()?
        .add_source(ConfigFile::with_name("Config").required(false))
        .set_override_option("ffmpeg_path", env::var(FFMPEG_PATH_ENV).ok())?;
    finish(builder)
}

/// Same layering as [`load_configuration`] with an explicit file and
/// environment value, so callers never depend on process-global state.
pub fn load_configuration_from(
    file: Option<&Path>,
    ffmpeg_env: Option<String>,
) -> Result<AppConfig, ConfigError> {
    let mut builder = base_builder()?;
    if let Some(file) = file {
        builder = builder.add_source(ConfigFile::from(file).required(false));
    }
    let builder = builder.set_override_option("ffmpeg_path", ffmpeg_env)?;
    finish(builder)
}

fn base_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("ffmpeg_path", DEFAULT_FFMPEG_PATH)?
        .set_default("jobs", 1i64)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let config = builder.build()?.try_deserialize::<AppConfig>()?;
    if config.jobs == 0 {
        return Err(ConfigError::Message("jobs must be at least 1".to_string()));
    }
    Ok(config)
}

/// Remove directories that are subdirectories of other directories in the list.
pub fn non_overlapping_directories(dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        if result.iter().any(|res_dir| dir.starts_with(res_dir)) {
            continue;
        }

        // A parent may arrive after several of its children.
        result.retain(|res_dir| !res_dir.starts_with(&dir));
        result.push(dir);
    }

    result
}
