// ffmpeg argument construction and output path derivation

use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use super::error::{EngineError, Result};
use super::select::ValidatedSelection;

/// How destination files are named relative to their source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputNaming {
    /// Inserted between the source stem and the new extension
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Destination container extension (without the dot)
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Source extensions we know how to replace (case-insensitive)
    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,
}

fn default_suffix() -> String {
    "_converted".to_string()
}

fn default_extension() -> String {
    "mp4".to_string()
}

fn default_source_extensions() -> Vec<String> {
    vec!["mkv".to_string()]
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            extension: default_extension(),
            source_extensions: default_source_extensions(),
        }
    }
}

/// Derive the output path: `movie.mkv` -> `movie_converted.mp4`.
///
/// Only the final extension is replaced, and only when it is one of
/// `naming.source_extensions`; anything else is rejected rather than
/// producing a name like `movie.avi_converted.mp4`.
pub fn derive_output_path(source: &Path, naming: &OutputNaming) -> Result<PathBuf> {
    let unsupported = || EngineError::UnsupportedExtension {
        path: source.to_path_buf(),
    };

    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(unsupported)?;
    if !naming
        .source_extensions
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    {
        return Err(unsupported());
    }

    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(unsupported)?;

    let file_name = format!("{}{}.{}", stem, naming.suffix, naming.extension);
    let destination = source.with_file_name(file_name);

    // The destination is ffmpeg's last bare argument; `-clip.mp4` would be read as an option
    if destination.is_relative() && destination.as_os_str().as_encoded_bytes().starts_with(b"-") {
        return Ok(Path::new(".").join(destination));
    }
    Ok(destination)
}

/// Build ffmpeg's argument list for one remux.
///
/// Maps exactly three streams in this order: the first video stream (copied),
/// the chosen audio stream (AAC stereo) and the chosen subtitle stream
/// (mov_text). Pure: the same inputs always give the same list.
pub fn build_args(source: &Path, destination: &Path, selection: &ValidatedSelection) -> Vec<OsString> {
    let audio_map = format!("0:{}", selection.audio_index());
    let subtitle_map = format!("0:{}", selection.subtitle_index());

    let mut args: Vec<OsString> = Vec::with_capacity(22);
    args.extend(["-hide_banner", "-nostdin", "-i"].map(OsString::from));
    args.push(source.as_os_str().to_owned());
    args.extend(
        [
            "-map",
            "0:v:0",
            "-map",
            audio_map.as_str(),
            "-map",
            subtitle_map.as_str(),
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-ac",
            "2",
            "-c:s",
            "mov_text",
            "-preset",
            selection.preset().as_str(),
        ]
        .map(OsString::from),
    );
    args.push(destination.as_os_str().to_owned());
    args
}

/// A fully resolved encoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl EncoderCommand {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(|a| a.as_ref().to_os_string()).collect(),
        }
    }

    /// Short name of the program, for log and summary lines
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    pub fn to_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Render a command as a copy-pasteable shell line
pub fn format_command(command: &EncoderCommand) -> String {
    std::iter::once(command.program.as_os_str())
        .chain(command.args.iter().map(|a| a.as_os_str()))
        .map(|part| {
            let part = part.to_string_lossy();
            shlex::try_quote(&part)
                .map(|q| q.into_owned())
                .unwrap_or_else(|_| part.into_owned())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
