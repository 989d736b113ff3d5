use std::ffi::OsString;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::command::{EncoderCommand, OutputNaming, build_args, derive_output_path};
use super::error::Result;
use super::select::ValidatedSelection;
use super::tools::Tools;

/// One remux of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub id: Uuid,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub selection: ValidatedSelection,
    /// Replace an existing destination instead of failing
    pub overwrite: bool,
}

impl TranscodeJob {
    /// Create a job, deriving the destination path from the source name
    pub fn new(source: &Path, selection: ValidatedSelection, naming: &OutputNaming) -> Result<Self> {
        let destination = derive_output_path(source, naming)?;
        Ok(Self {
            id: Uuid::new_v4(),
            source: source.to_path_buf(),
            destination,
            selection,
            overwrite: false,
        })
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// The ffmpeg invocation for this job.
    ///
    /// `-n` makes ffmpeg refuse an existing destination instead of prompting
    /// on a stdin it does not have.
    pub fn command(&self, tools: &Tools) -> EncoderCommand {
        let overwrite_flag = if self.overwrite { "-y" } else { "-n" };
        let mut args = vec![OsString::from(overwrite_flag)];
        args.extend(build_args(&self.source, &self.destination, &self.selection));
        EncoderCommand::new(&tools.ffmpeg, args)
    }
}
