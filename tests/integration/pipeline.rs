// End-to-end: inventory -> selection -> job -> ffmpeg command

use crate::common::assertions::{assert_cmd_has_flag_value, assert_maps};
use crate::common::helpers::{cmd_to_string, inventory, sample_inventory};
use std::path::{Path, PathBuf};
use trackmux::engine::{
    EngineError, OutputNaming, SelectionRequest, StreamKind, Tools, TranscodeJob, validate,
};

#[test]
fn test_selection_to_command() {
    let inv = sample_inventory();
    assert_eq!(inv.indices(StreamKind::Audio), vec![1, 3]);
    assert_eq!(inv.indices(StreamKind::Subtitle), vec![2]);

    let selection = validate(&inv, &SelectionRequest::new(3, 2, "medium")).unwrap();
    let job = TranscodeJob::new(Path::new("movie.mkv"), selection, &OutputNaming::default()).unwrap();
    assert_eq!(job.destination, PathBuf::from("movie_converted.mp4"));

    let cmd = job.command(&Tools::default());
    assert_maps(&cmd, &["0:v:0", "0:3", "0:2"]);
    assert!(
        cmd_to_string(&cmd).contains("-map 0:v:0 -map 0:3 -map 0:2"),
        "maps should be adjacent: {}",
        cmd_to_string(&cmd)
    );
    assert_cmd_has_flag_value(&cmd, "-c:v", "copy");
    assert_cmd_has_flag_value(&cmd, "-c:a", "aac");
    assert_cmd_has_flag_value(&cmd, "-ac", "2");
    assert_cmd_has_flag_value(&cmd, "-c:s", "mov_text");
    assert_cmd_has_flag_value(&cmd, "-preset", "medium");
    assert_cmd_has_flag_value(&cmd, "-i", "movie.mkv");
}

#[test]
fn test_stale_index_from_previous_file_is_rejected() {
    // Audio 3 was valid for the sample file but this one has audio only at 1
    let other = inventory(&[
        (0, "video", None),
        (1, "audio", None),
        (2, "subtitle", None),
        (3, "subtitle", None),
    ]);
    let err = validate(&other, &SelectionRequest::new(3, 2, "medium")).unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidAudioIndex { index: 3, .. }
    ));
}

#[test]
fn test_file_without_subtitles_cannot_be_converted() {
    let inv = inventory(&[(0, "video", None), (1, "audio", Some("eng"))]);
    for subtitle in [0, 1, 2] {
        let err = validate(&inv, &SelectionRequest::new(1, subtitle, "medium")).unwrap_err();
        assert!(matches!(err, EngineError::InvalidSubtitleIndex { .. }));
    }
}

#[test]
fn test_unsupported_source_rejected_before_spawn() {
    let selection = validate(&sample_inventory(), &SelectionRequest::new(1, 2, "fast")).unwrap();
    let err = TranscodeJob::new(Path::new("movie.mp4"), selection, &OutputNaming::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedExtension { .. }));
}

#[test]
fn test_dash_prefixed_destination_is_not_an_option() {
    let selection = validate(&sample_inventory(), &SelectionRequest::new(1, 2, "fast")).unwrap();
    let job = TranscodeJob::new(Path::new("-clip.mkv"), selection, &OutputNaming::default()).unwrap();

    let cmd = job.command(&Tools::default());
    assert_cmd_has_flag_value(&cmd, "-i", "-clip.mkv");
    assert_eq!(
        cmd.args.last().map(PathBuf::from),
        Some(PathBuf::from("./-clip_converted.mp4"))
    );
}
