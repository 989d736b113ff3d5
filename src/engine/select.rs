// Validation of the user's track selection against a probed inventory

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{EngineError, Result};
use super::probe::{StreamInventory, StreamKind};

/// x264/x265 speed/quality presets, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodePreset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl EncodePreset {
    pub const ALL: [EncodePreset; 9] = [
        EncodePreset::Ultrafast,
        EncodePreset::Superfast,
        EncodePreset::Veryfast,
        EncodePreset::Faster,
        EncodePreset::Fast,
        EncodePreset::Medium,
        EncodePreset::Slow,
        EncodePreset::Slower,
        EncodePreset::Veryslow,
    ];

    /// The token handed to `-preset`
    pub const fn as_str(self) -> &'static str {
        match self {
            EncodePreset::Ultrafast => "ultrafast",
            EncodePreset::Superfast => "superfast",
            EncodePreset::Veryfast => "veryfast",
            EncodePreset::Faster => "faster",
            EncodePreset::Fast => "fast",
            EncodePreset::Medium => "medium",
            EncodePreset::Slow => "slow",
            EncodePreset::Slower => "slower",
            EncodePreset::Veryslow => "veryslow",
        }
    }
}

impl fmt::Display for EncodePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodePreset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        EncodePreset::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EngineError::InvalidPreset {
                token: s.to_string(),
            })
    }
}

/// What the user picked, before anything has been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub audio_index: u32,
    pub subtitle_index: u32,
    pub preset: String,
}

impl SelectionRequest {
    pub fn new(audio_index: u32, subtitle_index: u32, preset: impl Into<String>) -> Self {
        Self {
            audio_index,
            subtitle_index,
            preset: preset.into(),
        }
    }
}

/// A selection known to be realizable against one inventory.
///
/// Only [`validate`] can produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatedSelection {
    audio_index: u32,
    subtitle_index: u32,
    preset: EncodePreset,
}

impl ValidatedSelection {
    pub fn audio_index(&self) -> u32 {
        self.audio_index
    }

    pub fn subtitle_index(&self) -> u32 {
        self.subtitle_index
    }

    pub fn preset(&self) -> EncodePreset {
        self.preset
    }
}

/// Check a selection against the streams that actually exist.
///
/// Audio is checked first, then subtitle, then preset; the first problem wins.
pub fn validate(inventory: &StreamInventory, request: &SelectionRequest) -> Result<ValidatedSelection> {
    if !inventory.contains(StreamKind::Audio, request.audio_index) {
        return Err(EngineError::InvalidAudioIndex {
            index: request.audio_index,
            available: inventory.indices(StreamKind::Audio),
        });
    }

    if !inventory.contains(StreamKind::Subtitle, request.subtitle_index) {
        return Err(EngineError::InvalidSubtitleIndex {
            index: request.subtitle_index,
            available: inventory.indices(StreamKind::Subtitle),
        });
    }

    let preset = request.preset.parse::<EncodePreset>()?;

    Ok(ValidatedSelection {
        audio_index: request.audio_index,
        subtitle_index: request.subtitle_index,
        preset,
    })
}
