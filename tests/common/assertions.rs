/// FFmpeg command assertion utilities
use trackmux::engine::EncoderCommand;

use super::helpers::cmd_to_string;

/// Check that a command maps exactly these selectors, in this order
#[allow(dead_code)]
pub fn assert_maps(cmd: &EncoderCommand, expected: &[&str]) {
    let args: Vec<String> = cmd
        .args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    let maps: Vec<&str> = args
        .windows(2)
        .filter(|w| w[0] == "-map")
        .map(|w| w[1].as_str())
        .collect();
    assert_eq!(
        maps,
        expected,
        "Unexpected -map selectors.\nCommand: {}",
        cmd_to_string(cmd)
    );
}

/// Check if a command contains a flag with a specific value
#[allow(dead_code)]
pub fn assert_cmd_has_flag_value(cmd: &EncoderCommand, flag: &str, value: &str) {
    let cmd = cmd_to_string(cmd);
    let pattern = format!("{} {}", flag, value);
    assert!(
        cmd.contains(&pattern),
        "Expected FFmpeg command to contain '{} {}' but it didn't.\nCommand: {}",
        flag,
        value,
        cmd
    );
}

/// Check if a command string does NOT contain a specific flag
#[allow(dead_code)]
pub fn assert_cmd_not_contains(cmd: &EncoderCommand, flag: &str) {
    let cmd = cmd_to_string(cmd);
    assert!(
        !cmd.split(' ').any(|part| part == flag),
        "Expected FFmpeg command to NOT contain '{}' but it did.\nCommand: {}",
        flag,
        cmd
    );
}
