// Stream inventory probing using ffprobe

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use super::error::{EngineError, Result};
use super::tools::Tools;

/// Language reported for streams that carry no `language` tag
pub const UNKNOWN_LANGUAGE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Audio,
    Subtitle,
    Video,
    Other,
}

impl StreamKind {
    fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "audio" => StreamKind::Audio,
            "subtitle" => StreamKind::Subtitle,
            "video" => StreamKind::Video,
            _ => StreamKind::Other,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
            StreamKind::Video => "video",
            StreamKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// One stream of the source container, as ffprobe reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    index: u32,
    kind: StreamKind,
    language: String,
    codec_name: Option<String>,
    title: Option<String>,
}

impl StreamDescriptor {
    /// Container-native stream index (what `-map 0:<index>` refers to)
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Language tag, or `"unknown"` when the container has none
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn codec_name(&self) -> Option<&str> {
        self.codec_name.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Track {} - Language: {}", self.index, self.language)?;
        if let Some(codec) = &self.codec_name {
            write!(f, " [{}]", codec)?;
        }
        if let Some(title) = &self.title {
            write!(f, " \"{}\"", title)?;
        }
        Ok(())
    }
}

/// All streams of one source file in container order.
///
/// The per-kind views are filtered from the master list, so they always
/// preserve its relative order and never overlap.
#[derive(Debug, Default, Serialize)]
pub struct StreamInventory {
    streams: Vec<StreamDescriptor>,
    duration: Option<f64>,
    #[serde(skip)]
    warnings: Vec<EngineError>,
}

impl StreamInventory {
    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    pub fn of_kind(&self, kind: StreamKind) -> impl Iterator<Item = &StreamDescriptor> + '_ {
        self.streams.iter().filter(move |s| s.kind == kind)
    }

    pub fn audio(&self) -> impl Iterator<Item = &StreamDescriptor> + '_ {
        self.of_kind(StreamKind::Audio)
    }

    pub fn subtitles(&self) -> impl Iterator<Item = &StreamDescriptor> + '_ {
        self.of_kind(StreamKind::Subtitle)
    }

    pub fn video(&self) -> impl Iterator<Item = &StreamDescriptor> + '_ {
        self.of_kind(StreamKind::Video)
    }

    /// The stream `-map 0:v:0` will pick
    pub fn first_video(&self) -> Option<&StreamDescriptor> {
        self.video().next()
    }

    /// Whether `index` names a stream of the given kind
    pub fn contains(&self, kind: StreamKind, index: u32) -> bool {
        self.of_kind(kind).any(|s| s.index == index)
    }

    /// Indices of every stream of the given kind, in container order
    pub fn indices(&self, kind: StreamKind) -> Vec<u32> {
        self.of_kind(kind).map(|s| s.index).collect()
    }

    /// Container duration in seconds, when ffprobe knew it
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Entries that were kept as `Other` because they were malformed
    pub fn warnings(&self) -> &[EngineError] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

/// Probe `source` with ffprobe and build its stream inventory.
///
/// Blocks until ffprobe exits and all of its output has been read.
pub fn inspect(tools: &Tools, source: &Path) -> Result<StreamInventory> {
    if !source.exists() {
        return Err(EngineError::SourceNotFound {
            path: source.to_path_buf(),
        });
    }

    debug!(source = %source.display(), ffprobe = %tools.ffprobe.display(), "probing streams");

    let output = Command::new(&tools.ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(source)
        .output()
        .map_err(|e| EngineError::probe_failure(source, format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::probe_failure(
            source,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    parse_inventory(&json_str).map_err(|reason| EngineError::probe_failure(source, reason))
}

/// Parse ffprobe's `-print_format json -show_streams` output.
///
/// Fails only when the document as a whole is unusable; a bad individual
/// entry is kept as `Other` and recorded in [`StreamInventory::warnings`].
pub fn parse_inventory(json_str: &str) -> std::result::Result<StreamInventory, String> {
    let json: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| format!("failed to parse ffprobe JSON: {}", e))?;

    let entries = json["streams"]
        .as_array()
        .ok_or("no streams list in ffprobe output")?;

    let mut inventory = StreamInventory {
        streams: Vec::with_capacity(entries.len()),
        duration: json["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok()),
        warnings: Vec::new(),
    };

    for (position, entry) in entries.iter().enumerate() {
        let index = match entry.get("index") {
            None => position as u32,
            Some(v) => v
                .as_u64()
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| format!("stream entry #{} has an invalid index: {}", position, v))?,
        };

        if let Some(prev) = inventory.streams.last() {
            if index <= prev.index {
                return Err(format!(
                    "stream indices out of order: {} follows {}",
                    index, prev.index
                ));
            }
        }

        let kind = match entry["codec_type"].as_str() {
            Some(codec_type) => StreamKind::from_codec_type(codec_type),
            None => {
                let err = EngineError::MalformedStreamData {
                    position,
                    reason: "missing codec_type".to_string(),
                };
                warn!(index, "{}", err);
                inventory.warnings.push(err);
                StreamKind::Other
            }
        };

        let tags = &entry["tags"];
        let language = tags["language"]
            .as_str()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(UNKNOWN_LANGUAGE)
            .to_string();

        inventory.streams.push(StreamDescriptor {
            index,
            kind,
            language,
            codec_name: entry["codec_name"].as_str().map(str::to_string),
            title: tags["title"].as_str().map(str::to_string),
        });
    }

    debug!(
        streams = inventory.len(),
        audio = inventory.audio().count(),
        subtitles = inventory.subtitles().count(),
        "parsed stream inventory"
    );

    Ok(inventory)
}

#[cfg(test)]
pub(crate) fn inventory_from(streams: &[(u32, StreamKind)]) -> StreamInventory {
    StreamInventory {
        streams: streams
            .iter()
            .map(|&(index, kind)| StreamDescriptor {
                index,
                kind,
                language: UNKNOWN_LANGUAGE.to_string(),
                codec_name: None,
                title: None,
            })
            .collect(),
        duration: None,
        warnings: Vec::new(),
    }
}
