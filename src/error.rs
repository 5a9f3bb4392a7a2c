use std::fmt;
use std::time::Duration;

/// Pipeline stage that an external-call failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Measuring the length of the conversation stream.
    Probe,
    /// Running the layered spatial mix.
    Spatialize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Probe => f.write_str("probe"),
            Stage::Spatialize => f.write_str("spatialize"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SoundscapeError {
    #[error("Invalid configuration at `{key}`: {reason}")]
    Config { key: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error(
        "{0} not found. Install ffmpeg: Linux: `sudo apt-get install ffmpeg`, \
         macOS: `brew install ffmpeg`, Windows: https://ffmpeg.org/download.html"
    )]
    ToolNotFound(String),
    #[error("{stage} stage failed: {reason}")]
    StageFailed { stage: Stage, reason: String },
    #[error("{stage} stage timed out after {after:?}")]
    StageTimedOut { stage: Stage, after: Duration },
    #[error("Speaker '{0}' has no personality in this session")]
    UnknownSpeaker(String),
}

impl SoundscapeError {
    pub(crate) fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        SoundscapeError::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for configuration-shape errors, which are fatal to the whole run.
    pub fn is_config(&self) -> bool {
        matches!(self, SoundscapeError::Config { .. })
    }
}

pub type Result<T> = std::result::Result<T, SoundscapeError>;
