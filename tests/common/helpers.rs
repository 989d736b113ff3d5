#![allow(dead_code)] // Each test binary uses a different subset

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;
use trackmux::engine::{
    EncoderCommand, ProgressLine, ProgressSink, SelectionRequest, SinkEvent, StreamInventory,
    ValidatedSelection, parse_inventory, validate,
};

/// Convert a command to a single string for assertions
pub fn cmd_to_string(cmd: &EncoderCommand) -> String {
    let program = cmd.program.to_string_lossy();
    let args: Vec<String> = cmd
        .args
        .iter()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect();

    format!("{} {}", program, args.join(" "))
}

/// Build ffprobe-style JSON for `(index, codec_type, language)` entries
pub fn ffprobe_json(streams: &[(u32, &str, Option<&str>)]) -> String {
    let entries: Vec<serde_json::Value> = streams
        .iter()
        .map(|&(index, codec_type, language)| {
            let mut entry = serde_json::json!({
                "index": index,
                "codec_type": codec_type,
            });
            if let Some(lang) = language {
                entry["tags"] = serde_json::json!({ "language": lang });
            }
            entry
        })
        .collect();

    serde_json::json!({ "streams": entries }).to_string()
}

pub fn inventory(streams: &[(u32, &str, Option<&str>)]) -> StreamInventory {
    parse_inventory(&ffprobe_json(streams)).expect("synthetic inventory should parse")
}

/// video 0, audio {1, 3}, subtitle {2}
pub fn sample_inventory() -> StreamInventory {
    inventory(&[
        (0, "video", None),
        (1, "audio", Some("eng")),
        (2, "subtitle", Some("eng")),
        (3, "audio", Some("jpn")),
    ])
}

pub fn sample_selection(audio: u32, subtitle: u32, preset: &str) -> ValidatedSelection {
    validate(
        &sample_inventory(),
        &SelectionRequest::new(audio, subtitle, preset),
    )
    .expect("sample selection should validate")
}

/// A `sh -c` command standing in for ffmpeg
pub fn sh(script: &str) -> EncoderCommand {
    EncoderCommand::new("sh", ["-c", script])
}

/// Sink that forwards every event with the instant it was delivered
pub struct TimedSink {
    tx: Sender<(Instant, SinkEvent)>,
}

impl TimedSink {
    pub fn new() -> (Self, Receiver<(Instant, SinkEvent)>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for TimedSink {
    fn progress_started(&mut self) {
        let _ = self.tx.send((Instant::now(), SinkEvent::Started));
    }

    fn line(&mut self, line: &ProgressLine) {
        let _ = self.tx.send((Instant::now(), SinkEvent::Line(line.clone())));
    }

    fn progress_stopped(&mut self) {
        let _ = self.tx.send((Instant::now(), SinkEvent::Stopped));
    }
}

/// Write an executable shell script into `dir`
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}
