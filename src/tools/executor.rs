//! Shell Executor
//!
//! Runs one command through the shell interpreter as a child process,
//! streams its output into an [`OutputAggregator`], reacts to cancellation
//! by killing the process tree, and composes the final result.
//!
//! # Concurrency
//!
//! stdout and stderr are read by two pump tasks that forward chunks over a
//! bounded channel. A single consumer loop owns the session and is the only
//! writer of its buffers; it also observes the child's exit and the abort
//! signal. The run completes only once the OS reports exit, whether or not
//! a kill was issued.

use super::cancel::CancellationController;
use super::output::{OutputAggregator, StreamKind, DEFAULT_PROGRESS_INTERVAL};
use super::result::{ExecutionResult, ResultComposer};
use super::validator::{CommandRequest, CommandValidator, ValidatedCommand};
use crate::metrics;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Size of a single read from a child pipe
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Capacity of the chunk channel between the pump tasks and the consumer
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Default grace window for in-flight output after the child exits
pub const DEFAULT_EXIT_DRAIN: Duration = Duration::from_millis(100);

/// Callback receiving throttled snapshots of the combined raw output
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Default interpreter and the arguments placed before the command
#[cfg(windows)]
fn default_shell() -> (String, Vec<String>) {
    ("powershell.exe".to_string(), vec!["-Command".to_string()])
}

/// Default interpreter and the arguments placed before the command
#[cfg(not(windows))]
fn default_shell() -> (String, Vec<String>) {
    ("bash".to_string(), vec!["-c".to_string()])
}

/// Configuration for the shell executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Shell interpreter binary
    pub interpreter: String,

    /// Arguments placed before the command (e.g. `-c`, `-Command`)
    pub interpreter_args: Vec<String>,

    /// Root that relative directories resolve against
    pub project_root: PathBuf,

    /// Minimum interval between progress snapshots (default: 1s)
    pub progress_interval: Duration,

    /// How long to keep reading output after the child exits (default: 100ms)
    pub exit_drain: Duration,

    /// Display the full report instead of the short summary
    pub debug_mode: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let (interpreter, interpreter_args) = default_shell();
        Self {
            interpreter,
            interpreter_args,
            project_root: PathBuf::from("."),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            exit_drain: DEFAULT_EXIT_DRAIN,
            debug_mode: false,
        }
    }
}

impl ExecutorConfig {
    /// Create a config rooted at `project_root`
    pub fn with_project_root(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Default::default()
        }
    }

    /// Use a different shell interpreter
    pub fn interpreter(mut self, interpreter: impl Into<String>, args: &[&str]) -> Self {
        self.interpreter = interpreter.into();
        self.interpreter_args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Change the progress snapshot interval
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Enable debug display mode
    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }
}

/// Transient state of one run
///
/// Created at spawn time and consumed by the result composer.
#[derive(Debug)]
pub struct ExecutionSession {
    output: OutputAggregator,
    exit_code: Option<i32>,
    signal: Option<String>,
    error: Option<String>,
    pid: Option<u32>,
}

impl ExecutionSession {
    /// Create an empty session
    pub fn new(progress_interval: Duration, started: Instant) -> Self {
        Self {
            output: OutputAggregator::new(progress_interval, started),
            exit_code: None,
            signal: None,
            error: None,
            pid: None,
        }
    }

    /// Aggregated output
    pub fn output(&self) -> &OutputAggregator {
        &self.output
    }

    pub(crate) fn output_mut(&mut self) -> &mut OutputAggregator {
        &mut self.output
    }

    /// Exit code, absent when the process was killed by a signal or never ran
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Name of the terminating signal
    pub fn signal(&self) -> Option<&str> {
        self.signal.as_deref()
    }

    /// Spawn or I/O error message
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process id of the shell, which also leads the process group
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub(crate) fn set_pid(&mut self, pid: u32) {
        self.pid = Some(pid);
    }

    pub(crate) fn record_exit(&mut self, exit_code: Option<i32>, signal: Option<String>) {
        self.exit_code = exit_code;
        self.signal = signal;
    }

    /// Record an error; the first one wins
    pub(crate) fn record_error(&mut self, error: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(error.into());
        }
    }

    pub(crate) fn record_status(&mut self, status: ExitStatus) {
        self.record_exit(status.code(), termination_signal(&status));
    }

    pub(crate) fn mark_exited(&mut self) {
        self.output.mark_exited();
    }
}

/// Events forwarded from the pump tasks
#[derive(Debug)]
enum StreamEvent {
    Data(StreamKind, Vec<u8>),
    Error(StreamKind, String),
}

/// Shell executor for one tool instance
///
/// # Example
///
/// ```no_run
/// use shellgate::tools::{CommandRequest, ExecutorConfig, ShellExecutor};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let executor = ShellExecutor::new(ExecutorConfig::with_project_root("."));
///     let result = executor
///         .run(&CommandRequest::new("echo hello"), &CancellationToken::new(), None)
///         .await;
///     println!("{}", result.report_text);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    validator: CommandValidator,
    composer: ResultComposer,
    config: ExecutorConfig,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl ShellExecutor {
    /// Create an executor with the given configuration
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            validator: CommandValidator::new(config.project_root.clone()),
            composer: ResultComposer::new(config.debug_mode),
            config,
        }
    }

    /// Get a reference to the validator
    pub fn validator(&self) -> &CommandValidator {
        &self.validator
    }

    /// Get a reference to the result composer
    pub fn composer(&self) -> &ResultComposer {
        &self.composer
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a command to completion
    ///
    /// Never fails: validation errors, spawn errors, abnormal exits and
    /// cancellation are all reported through the returned [`ExecutionResult`].
    /// `on_progress` receives the combined raw output at most once per
    /// progress interval; the complete output is only guaranteed in the result.
    pub async fn run(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> ExecutionResult {
        let validated = match self.validator.validate(request) {
            Ok(validated) => validated,
            Err(e) => {
                warn!("Command rejected: {}", e);
                let result = self.composer.rejected(request, &e);
                metrics::record_run(result.outcome.as_str(), None);
                return result;
            }
        };

        if cancel.is_cancelled() {
            info!("Command cancelled before start: {}", request.command);
            let result = self.composer.cancelled_before_start();
            metrics::record_run(result.outcome.as_str(), None);
            return result;
        }

        let started = Instant::now();
        let mut session = ExecutionSession::new(self.config.progress_interval, started);

        match self.build_command(&validated).spawn() {
            Ok(mut child) => {
                info!(
                    pid = child.id(),
                    root = %validated.root,
                    "Executing: {}",
                    validated.command
                );
                self.supervise(&mut child, &mut session, cancel, on_progress)
                    .await;
            }
            Err(e) => {
                warn!("Failed to spawn {}: {}", self.config.interpreter, e);
                session.record_error(e.to_string());
                session.mark_exited();
            }
        }

        let result = self
            .composer
            .compose(request, &session, cancel.is_cancelled());
        metrics::record_run(result.outcome.as_str(), Some(started.elapsed()));

        info!(
            exit_code = session.exit_code(),
            signal = session.signal(),
            "Command finished ({}) in {:?}",
            result.outcome,
            started.elapsed()
        );

        result
    }

    /// Build the interpreter invocation
    fn build_command(&self, validated: &ValidatedCommand) -> Command {
        let mut command = Command::new(&self.config.interpreter);
        command
            .args(&self.config.interpreter_args)
            .arg(&validated.command)
            .current_dir(&validated.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        command.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            command.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        command
    }

    /// Consume output and wait for exit, killing the tree on abort
    async fn supervise(
        &self,
        child: &mut Child,
        session: &mut ExecutionSession,
        cancel: &CancellationToken,
        mut on_progress: Option<ProgressCallback<'_>>,
    ) {
        if let Some(pid) = child.id() {
            session.set_pid(pid);
        }

        let (tx, mut rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, StreamKind::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, StreamKind::Stderr, tx.clone())));
        }
        drop(tx);

        let mut controller = CancellationController::arm(session.pid());
        let mut abort_seen = false;
        let status = loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    apply_event(session, event, &mut on_progress);
                }
                _ = cancel.cancelled(), if !abort_seen => {
                    abort_seen = true;
                    if controller.on_abort(session.output().is_exited()) {
                        // The group kill covers the shell; this covers platforms
                        // where the group could not be signalled.
                        if let Err(e) = child.start_kill() {
                            debug!("start_kill after tree kill: {}", e);
                        }
                    }
                }
                status = child.wait() => break status,
            }
        };
        drop(controller);

        match status {
            Ok(status) => session.record_status(status),
            Err(e) => {
                warn!("Failed to wait for child: {}", e);
                session.record_error(e.to_string());
            }
        }

        // Pick up output that was already in flight when the exit arrived.
        let drain = async {
            while let Some(event) = rx.recv().await {
                apply_event(session, event, &mut on_progress);
            }
        };
        if tokio::time::timeout(self.config.exit_drain, drain).await.is_err() {
            debug!("Output pipes still open after exit, likely held by background jobs");
        }

        session.mark_exited();
        for pump in pumps {
            pump.abort();
        }
    }
}

/// Apply one stream event to the session, emitting a snapshot if due
fn apply_event(
    session: &mut ExecutionSession,
    event: StreamEvent,
    on_progress: &mut Option<ProgressCallback<'_>>,
) {
    match event {
        StreamEvent::Data(kind, chunk) => {
            debug!("{} chunk: {} bytes", kind, chunk.len());
            let snapshot = session.output_mut().push(kind, &chunk, Instant::now());
            if let (Some(snapshot), Some(callback)) = (snapshot, on_progress.as_mut()) {
                callback(snapshot);
            }
        }
        StreamEvent::Error(kind, message) => {
            warn!("Error reading {}: {}", kind, message);
            session.record_error(message);
        }
    }
}

/// Forward chunks from a child pipe until EOF or the consumer goes away
async fn pump<R>(mut reader: R, kind: StreamKind, tx: mpsc::Sender<StreamEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(StreamEvent::Data(kind, buf[..n].to_vec())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(kind, e.to_string())).await;
                break;
            }
        }
    }
}

/// Name of the signal that terminated the process, if any
#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(signal_name)
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<String> {
    None
}

/// Conventional name for a signal number
#[cfg(unix)]
pub fn signal_name(signal: i32) -> String {
    let name = match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGBUS => "SIGBUS",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGUSR2 => "SIGUSR2",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        _ => return format!("signal {}", signal),
    };
    name.to_string()
}
