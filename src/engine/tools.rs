use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Locations of the external prober and encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tools {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: PathBuf,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

impl Tools {
    /// Check if ffmpeg is available and return its version
    pub fn ffmpeg_version(&self) -> Result<String> {
        tool_version(&self.ffmpeg)
    }

    /// Check if ffprobe is available and return its version
    pub fn ffprobe_version(&self) -> Result<String> {
        tool_version(&self.ffprobe)
    }
}

/// Resolve a tool name to an absolute path using PATH lookup.
/// Paths that already contain a separator are returned as-is if they exist.
pub fn locate(tool: &Path) -> Option<PathBuf> {
    if tool.components().count() > 1 {
        return tool.exists().then(|| tool.to_path_buf());
    }
    which::which(tool).ok()
}

fn tool_version(program: &Path) -> Result<String> {
    let output = Command::new(program)
        .arg("-version")
        .output()
        .with_context(|| {
            format!(
                "Failed to execute {}. Is it installed and in PATH?",
                program.display()
            )
        })?;

    if !output.status.success() {
        anyhow::bail!(
            "{} -version failed with status: {}",
            program.display(),
            output.status
        );
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    let first_line = version_output.lines().next().unwrap_or("Unknown version");

    Ok(first_line.to_string())
}
