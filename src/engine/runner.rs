// Runs the encoder as a child process and relays its output line by line

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::command::{EncoderCommand, format_command};
use super::error::{EngineError, Result};
use super::job::TranscodeJob;
use super::tools::Tools;

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    Stdout,
    Stderr,
    /// The runner's own closing line
    Summary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressLine {
    pub source: LineSource,
    pub text: String,
}

/// Receives a job's output.
///
/// Called from a dedicated delivery thread, so a slow sink delays only its
/// own events, never the pipe reads or the reaping of the child.
pub trait ProgressSink: Send + 'static {
    /// Output is about to start; show an indeterminate progress indicator.
    fn progress_started(&mut self) {}

    fn line(&mut self, line: &ProgressLine);

    /// The child has exited; hide the indicator. The summary line follows.
    fn progress_stopped(&mut self) {}
}

/// Sink events, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Started,
    Line(ProgressLine),
    Stopped,
}

/// Forwards every event into a channel, for callers that prefer to poll.
impl ProgressSink for Sender<SinkEvent> {
    fn progress_started(&mut self) {
        let _ = self.send(SinkEvent::Started);
    }

    fn line(&mut self, line: &ProgressLine) {
        let _ = self.send(SinkEvent::Line(line.clone()));
    }

    fn progress_stopped(&mut self) {
        let _ = self.send(SinkEvent::Stopped);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Succeeded,
    Failed { exit_code: i32 },
    Cancelled,
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalStatus::Succeeded => f.write_str("succeeded"),
            TerminalStatus::Failed { exit_code } => write!(f, "failed with exit code {}", exit_code),
            TerminalStatus::Cancelled => f.write_str("was cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed(i32),
    Cancelled,
}

impl From<TerminalStatus> for RunnerState {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Succeeded => RunnerState::Succeeded,
            TerminalStatus::Failed { exit_code } => RunnerState::Failed(exit_code),
            TerminalStatus::Cancelled => RunnerState::Cancelled,
        }
    }
}

/// How a finished job ended
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub status: TerminalStatus,
    /// Last captured output lines, oldest first
    pub tail: Vec<String>,
    pub elapsed: Duration,
    /// The encoder was stopped by SIGINT/SIGQUIT/SIGTERM that this runner
    /// did not send (e.g. Ctrl-C in the terminal). Only set for `Failed`.
    pub interrupted: bool,
}

impl JobOutcome {
    /// Turn a non-zero exit into [`EngineError::EncoderNonZeroExit`].
    /// Success and cancellation are both `Ok`.
    pub fn into_result(self) -> Result<Self> {
        match self.status {
            TerminalStatus::Failed { exit_code } => Err(EngineError::EncoderNonZeroExit {
                code: exit_code,
                tail: self.tail,
            }),
            _ => Ok(self),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Output lines kept for error reports
    pub tail_lines: usize,
    /// How long to wait for the output pipes to close, and then for the
    /// sink to catch up, after the child exits
    pub drain_timeout: Duration,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            tail_lines: 20,
            drain_timeout: Duration::from_secs(2),
        }
    }
}

/// Lets another thread stop a running job
#[derive(Debug, Clone)]
pub struct CancelHandle {
    child: Arc<Mutex<Child>>,
    requested: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Ask the encoder to stop.
    ///
    /// Returns `false` when the child has already exited, in which case the
    /// job keeps whatever status it earned.
    pub fn cancel(&self) -> bool {
        let mut child = lock(&self.child);
        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(_)) => return false,
            Err(e) => {
                warn!(error = %e, "could not query encoder status before cancelling");
                return false;
            }
        }

        self.requested.store(true, Ordering::SeqCst);
        if let Err(e) = terminate(&mut child) {
            warn!(pid = child.id(), error = %e, "failed to signal encoder");
        } else {
            info!(pid = child.id(), "cancellation requested");
        }
        true
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// A job in flight
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    cancel: CancelHandle,
    worker: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Block until the child has been reaped
    pub fn wait(self) -> Result<JobOutcome> {
        self.worker.join().map_err(|_| EngineError::WorkerPanicked)
    }
}

/// Runs one encoder child at a time.
///
/// Starting a job while another is running is an error; nothing is queued.
#[derive(Debug, Default)]
pub struct TranscodeRunner {
    state: Arc<Mutex<RunnerState>>,
    options: RunnerOptions,
}

impl TranscodeRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunnerState::Idle)),
            options,
        }
    }

    pub fn state(&self) -> RunnerState {
        *lock(&self.state)
    }

    /// Start ffmpeg for `job`
    pub fn start_job<S: ProgressSink>(
        &self,
        job: &TranscodeJob,
        tools: &Tools,
        sink: S,
    ) -> Result<JobHandle> {
        info!(
            job_id = %job.id,
            source = %job.source.display(),
            destination = %job.destination.display(),
            "starting transcode"
        );
        self.spawn(job.id, &job.command(tools), sink)
    }

    /// Start an arbitrary encoder command
    pub fn start<S: ProgressSink>(&self, command: &EncoderCommand, sink: S) -> Result<JobHandle> {
        self.spawn(Uuid::new_v4(), command, sink)
    }

    /// Start `command` and block until it finishes
    pub fn run<S: ProgressSink>(&self, command: &EncoderCommand, sink: S) -> Result<JobOutcome> {
        self.start(command, sink)?.wait()
    }

    fn spawn<S: ProgressSink>(
        &self,
        job_id: Uuid,
        command: &EncoderCommand,
        sink: S,
    ) -> Result<JobHandle> {
        let mut state = lock(&self.state);
        if *state == RunnerState::Running {
            return Err(EngineError::RunnerBusy);
        }

        debug!(%job_id, command = %format_command(command), "spawning encoder");

        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| EngineError::EncoderLaunchFailure {
            program: command.program.display().to_string(),
            source,
        })?;
        *state = RunnerState::Running;
        drop(state);

        let started_at = Instant::now();
        let program = command.program_name();
        info!(%job_id, pid = child.id(), "{} started", program);

        let (tx, rx) = mpsc::channel();
        let (drained_tx, drained_rx) = mpsc::channel();
        thread::spawn(move || deliver(sink, rx, drained_tx));
        let _ = tx.send(SinkEvent::Started);

        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(self.options.tail_lines)));
        let tail_cap = self.options.tail_lines;
        let (reader_done_tx, reader_done_rx) = mpsc::channel();
        let readers = [
            child.stdout.take().map(|s| {
                let output = ReaderOutput::new(
                    LineSource::Stdout,
                    &tx,
                    &tail,
                    tail_cap,
                    &reader_done_tx,
                );
                spawn_reader(s, output)
            }),
            child.stderr.take().map(|s| {
                let output = ReaderOutput::new(
                    LineSource::Stderr,
                    &tx,
                    &tail,
                    tail_cap,
                    &reader_done_tx,
                );
                spawn_reader(s, output)
            }),
        ]
        .into_iter()
        .flatten()
        .count();
        drop(reader_done_tx);

        let child = Arc::new(Mutex::new(child));
        let requested = Arc::new(AtomicBool::new(false));
        let cancel = CancelHandle {
            child: child.clone(),
            requested: requested.clone(),
        };

        let runner_state = self.state.clone();
        let drain_timeout = self.options.drain_timeout;

        let worker = thread::spawn(move || {
            let exit = reap(&child);
            let cancel_requested = requested.load(Ordering::SeqCst);

            let status = match &exit {
                Ok(exit) => classify(exit, cancel_requested),
                Err(e) => {
                    warn!(%job_id, error = %e, "failed to wait for encoder");
                    if cancel_requested {
                        TerminalStatus::Cancelled
                    } else {
                        TerminalStatus::Failed { exit_code: -1 }
                    }
                }
            };
            let elapsed = started_at.elapsed();
            *lock(&runner_state) = status.into();

            // A grandchild that inherited the pipes can keep them open long
            // after the encoder itself is gone
            let deadline = Instant::now() + drain_timeout;
            for _ in 0..readers {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if reader_done_rx.recv_timeout(remaining).is_err() {
                    warn!(
                        %job_id,
                        "encoder output still open {:?} after exit; detaching readers",
                        drain_timeout
                    );
                    break;
                }
            }

            let tail: Vec<String> = lock(&tail).iter().cloned().collect();
            let interrupted = match (&exit, status) {
                (Ok(exit), TerminalStatus::Failed { .. }) => was_interrupted(exit, &tail),
                _ => false,
            };

            let _ = tx.send(SinkEvent::Stopped);
            let _ = tx.send(SinkEvent::Line(ProgressLine {
                source: LineSource::Summary,
                text: format!(
                    "{} {} after {:.1}s",
                    program,
                    status,
                    elapsed.as_secs_f64()
                ),
            }));
            drop(tx);

            match status {
                TerminalStatus::Succeeded => info!(%job_id, ?elapsed, "{} {}", program, status),
                _ => warn!(%job_id, ?elapsed, "{} {}", program, status),
            }

            if drained_rx.recv_timeout(drain_timeout).is_err() {
                warn!(%job_id, "progress sink did not drain within {:?}", drain_timeout);
            }

            JobOutcome {
                job_id,
                status,
                tail,
                elapsed,
                interrupted,
            }
        });

        Ok(JobHandle {
            id: job_id,
            cancel,
            worker,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn deliver<S: ProgressSink>(mut sink: S, rx: Receiver<SinkEvent>, drained: Sender<()>) {
    for event in rx {
        match event {
            SinkEvent::Started => sink.progress_started(),
            SinkEvent::Line(line) => sink.line(&line),
            SinkEvent::Stopped => sink.progress_stopped(),
        }
    }
    let _ = drained.send(());
}

/// Where one pipe reader sends its lines
struct ReaderOutput {
    source: LineSource,
    tx: Sender<SinkEvent>,
    tail: Arc<Mutex<VecDeque<String>>>,
    tail_cap: usize,
    done: Sender<()>,
}

impl ReaderOutput {
    fn new(
        source: LineSource,
        tx: &Sender<SinkEvent>,
        tail: &Arc<Mutex<VecDeque<String>>>,
        tail_cap: usize,
        done: &Sender<()>,
    ) -> Self {
        Self {
            source,
            tx: tx.clone(),
            tail: tail.clone(),
            tail_cap,
            done: done.clone(),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(stream: R, out: ReaderOutput) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let source = out.source;
        let result = for_each_line(&mut reader, |text| {
            push_tail(&out.tail, out.tail_cap, &text);
            // Keep draining the pipe even if the sink has gone away
            let _ = out.tx.send(SinkEvent::Line(ProgressLine { source, text }));
        });
        if let Err(e) = result {
            debug!(?source, error = %e, "output reader stopped early");
        }
        let _ = out.done.send(());
    })
}

/// Wait for the child without holding its lock, so `CancelHandle::cancel`
/// can always get in to signal it.
fn reap(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    loop {
        let exited = lock(child).try_wait()?;
        if let Some(status) = exited {
            return Ok(status);
        }
        thread::sleep(REAP_POLL_INTERVAL);
    }
}

fn push_tail(tail: &Mutex<VecDeque<String>>, cap: usize, line: &str) {
    if cap == 0 {
        return;
    }
    let mut tail = lock(tail);
    if tail.len() == cap {
        tail.pop_front();
    }
    tail.push_back(line.to_string());
}

/// Read to EOF, handing `f` every non-empty line as soon as its terminator
/// arrives. Both `\n` and `\r` end a line: ffmpeg redraws its stats line with
/// carriage returns only.
pub(crate) fn for_each_line<R: BufRead>(reader: &mut R, mut f: impl FnMut(String)) -> io::Result<()> {
    let mut pending: Vec<u8> = Vec::new();
    loop {
        let buf = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if buf.is_empty() {
            break;
        }

        let len = buf.len();
        let mut start = 0;
        for (i, &byte) in buf.iter().enumerate() {
            if byte == b'\n' || byte == b'\r' {
                pending.extend_from_slice(&buf[start..i]);
                flush_line(&mut pending, &mut f);
                start = i + 1;
            }
        }
        pending.extend_from_slice(&buf[start..]);
        reader.consume(len);
    }
    flush_line(&mut pending, &mut f);
    Ok(())
}

fn flush_line(pending: &mut Vec<u8>, f: &mut impl FnMut(String)) {
    if pending.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(pending).into_owned();
    pending.clear();
    f(text);
}

/// Only a cancellation this runner performed counts as `Cancelled`
fn classify(exit: &ExitStatus, cancel_requested: bool) -> TerminalStatus {
    if cancel_requested {
        TerminalStatus::Cancelled
    } else if exit.success() {
        TerminalStatus::Succeeded
    } else {
        TerminalStatus::Failed {
            exit_code: exit_code(exit),
        }
    }
}

/// Exit code, or `128 + signal` for a child killed by a signal
fn exit_code(exit: &ExitStatus) -> i32 {
    if let Some(code) = exit.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = exit.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Whether the encoder stopped because someone else interrupted it (Ctrl-C in
/// the terminal, SIGTERM from a service manager).
///
/// FFmpeg catches these signals and exits with "Exiting normally, received
/// signal N", so the output is checked as well as the exit status.
#[cfg(unix)]
fn was_interrupted(exit: &ExitStatus, tail: &[String]) -> bool {
    use std::os::unix::process::ExitStatusExt;

    if let Some(signal) = exit.signal() {
        if matches!(signal, libc::SIGINT | libc::SIGQUIT | libc::SIGTERM) {
            return true;
        }
    }

    tail.iter().any(|line| {
        line.contains("received signal 2")
            || line.contains("received signal 3")
            || line.contains("received signal 15")
    })
}

#[cfg(not(unix))]
fn was_interrupted(_exit: &ExitStatus, tail: &[String]) -> bool {
    tail.iter().any(|line| line.contains("received signal"))
}

/// SIGTERM lets ffmpeg close the output file cleanly; elsewhere we can only kill.
#[cfg(unix)]
fn terminate(child: &mut Child) -> io::Result<()> {
    let pid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: the child has not been reaped (we hold its lock and try_wait
    // reported it running), so the pid still refers to our process.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}
