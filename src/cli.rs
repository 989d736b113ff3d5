use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trackmux")]
#[command(about = "Pick one audio and one subtitle track and remux an MKV to MP4", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug output (including every ffmpeg line) to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// List the streams of a media file
    Probe {
        /// Path to the media file
        file: PathBuf,

        /// Print the inventory as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remux a file keeping the first video stream plus the chosen audio and subtitle streams
    Convert {
        /// Path to the source file (.mkv)
        file: PathBuf,

        /// Stream index of the audio track to keep (see `probe`)
        #[arg(short, long)]
        audio: u32,

        /// Stream index of the subtitle track to keep (see `probe`)
        #[arg(short, long)]
        subtitle: u32,

        /// Encoder preset (defaults to the configured preset, normally "medium")
        #[arg(short, long)]
        preset: Option<String>,

        /// Overwrite the destination if it already exists
        #[arg(long)]
        overwrite: bool,

        /// Show the ffmpeg command without executing it
        #[arg(long)]
        dry_run: bool,
    },

    /// List the available encoder presets
    Presets,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
