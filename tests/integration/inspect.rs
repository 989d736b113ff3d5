// Stream inspection against stand-in ffprobe scripts

#![cfg(unix)]

use crate::common::helpers::{ffprobe_json, write_script};
use std::path::PathBuf;
use tempfile::TempDir;
use trackmux::engine::{EngineError, StreamKind, Tools, UNKNOWN_LANGUAGE, inspect};

fn fixture(ffprobe_body: &str) -> (TempDir, Tools, PathBuf) {
    let dir = TempDir::new().unwrap();
    let ffprobe = write_script(dir.path(), "ffprobe", ffprobe_body);
    let source = dir.path().join("movie.mkv");
    std::fs::write(&source, b"not really matroska").unwrap();
    let tools = Tools {
        ffmpeg: PathBuf::from("ffmpeg"),
        ffprobe,
    };
    (dir, tools, source)
}

#[test]
fn test_inspect_parses_prober_output() {
    let json = ffprobe_json(&[
        (0, "video", None),
        (1, "audio", Some("eng")),
        (2, "subtitle", None),
        (3, "audio", None),
    ]);
    let (_dir, tools, source) = fixture(&format!("cat <<'JSON'\n{}\nJSON", json));

    let inv = inspect(&tools, &source).unwrap();
    assert_eq!(inv.indices(StreamKind::Audio), vec![1, 3]);
    assert_eq!(inv.indices(StreamKind::Subtitle), vec![2]);
    assert_eq!(inv.subtitles().next().unwrap().language(), UNKNOWN_LANGUAGE);
}

#[test]
fn test_inspect_passes_source_as_last_argument() {
    // Echo the last argument back inside a valid document
    let (_dir, tools, source) = fixture(
        r#"for last; do :; done
printf '{"streams":[{"index":0,"codec_type":"audio","tags":{"title":"%s"}}]}' "$last""#,
    );

    let inv = inspect(&tools, &source).unwrap();
    assert_eq!(
        inv.streams()[0].title(),
        Some(&*source.to_string_lossy())
    );
}

#[test]
fn test_inspect_non_zero_exit_is_probe_failure() {
    let (_dir, tools, source) = fixture("echo 'Invalid data found when processing input' >&2\nexit 1");
    let err = inspect(&tools, &source).unwrap_err();
    match err {
        EngineError::ProbeFailure { reason, .. } => {
            assert!(reason.contains("Invalid data found"), "reason: {}", reason)
        }
        other => panic!("expected ProbeFailure, got {:?}", other),
    }
}

#[test]
fn test_inspect_garbage_output_is_probe_failure() {
    let (_dir, tools, source) = fixture("echo 'this is not json'");
    assert!(matches!(
        inspect(&tools, &source).unwrap_err(),
        EngineError::ProbeFailure { .. }
    ));
}

#[test]
fn test_inspect_missing_prober_is_probe_failure() {
    let (_dir, mut tools, source) = fixture("exit 0");
    tools.ffprobe = PathBuf::from("/nonexistent/ffprobe");
    assert!(matches!(
        inspect(&tools, &source).unwrap_err(),
        EngineError::ProbeFailure { .. }
    ));
}

#[test]
fn test_inspect_missing_source() {
    let (dir, tools, _source) = fixture("exit 0");
    let err = inspect(&tools, &dir.path().join("gone.mkv")).unwrap_err();
    assert!(matches!(err, EngineError::SourceNotFound { .. }));
}
