//! Error types for the probe/select/encode pipeline.

use std::path::PathBuf;

/// Result type alias using the engine's error type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Everything that can go wrong between opening a file and reaping ffmpeg.
///
/// Each error is local to one file-open attempt or one job; none of them
/// leave state behind that affects the next attempt.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The source file does not exist.
    #[error("source file not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    /// ffprobe could not be launched, exited non-zero, or printed garbage.
    #[error("ffprobe failed for {}: {reason}", .path.display())]
    ProbeFailure { path: PathBuf, reason: String },

    /// A single stream entry had no usable `codec_type`.
    #[error("stream entry #{position} is malformed: {reason}")]
    MalformedStreamData { position: usize, reason: String },

    #[error("stream {index} is not an audio stream (audio streams: {})", list_indices(.available))]
    InvalidAudioIndex { index: u32, available: Vec<u32> },

    #[error("stream {index} is not a subtitle stream (subtitle streams: {})", list_indices(.available))]
    InvalidSubtitleIndex { index: u32, available: Vec<u32> },

    #[error("unknown preset '{token}' (expected one of: {})", preset_choices())]
    InvalidPreset { token: String },

    /// The source name does not end in an extension we know how to replace.
    #[error("unsupported source extension: {}", .path.display())]
    UnsupportedExtension { path: PathBuf },

    #[error("failed to launch {program}: {source}")]
    EncoderLaunchFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The encoder ran and exited with a non-zero code.
    #[error("encoder exited with code {code}{}", format_tail(.tail))]
    EncoderNonZeroExit { code: i32, tail: Vec<String> },

    /// A job is already running on this runner.
    #[error("a transcode job is already running")]
    RunnerBusy,

    #[error("transcode worker thread panicked")]
    WorkerPanicked,
}

impl EngineError {
    pub(crate) fn probe_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ProbeFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the user can fix this by choosing differently.
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAudioIndex { .. }
                | Self::InvalidSubtitleIndex { .. }
                | Self::InvalidPreset { .. }
        )
    }
}

fn list_indices(indices: &[u32]) -> String {
    if indices.is_empty() {
        return "none".to_string();
    }
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn preset_choices() -> String {
    super::select::EncodePreset::ALL
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_tail(tail: &[String]) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!("\n{}", tail.join("\n"))
    }
}
