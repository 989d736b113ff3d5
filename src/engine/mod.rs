// Probe, select and encode engine - independent of the command line

pub mod command;
pub mod error;
pub mod job;
pub mod probe;
pub mod runner;
pub mod select;
pub mod stats;
pub mod tools;

pub use command::{EncoderCommand, OutputNaming, build_args, derive_output_path, format_command};
pub use error::{EngineError, Result};
pub use job::TranscodeJob;
pub use probe::{StreamDescriptor, StreamInventory, StreamKind, UNKNOWN_LANGUAGE, inspect, parse_inventory};
pub use runner::{
    CancelHandle, JobHandle, JobOutcome, LineSource, ProgressLine, ProgressSink, RunnerOptions,
    RunnerState, SinkEvent, TerminalStatus, TranscodeRunner,
};
pub use select::{EncodePreset, SelectionRequest, ValidatedSelection, validate};
pub use stats::EncodeStats;
pub use tools::Tools;
