//! Shell Command Execution Subsystem
//!
//! Runs one shell command per invocation as a child process, streams its
//! output to an observer, gates it behind user confirmation and supports
//! cancellation that kills the whole process tree.
//!
//! # Architecture
//!
//! The module is organized into:
//! - `root.rs`: command root extraction, the unit of trust
//! - `validator.rs`: request validation and working directory resolution
//! - `ansi.rs`: streaming ANSI escape stripping
//! - `output.rs`: output aggregation and progress throttling
//! - `cancel.rs`: process-tree termination on abort
//! - `executor.rs`: spawning and supervising the child
//! - `result.rs`: report and display text composition
//! - `shell.rs`: the tool facade tying confirmation and execution together
//!
//! # Example
//!
//! ```no_run
//! use shellgate::approval::{ConfirmationOutcome, StaticDecision};
//! use shellgate::tools::{CommandRequest, ExecutorConfig, ShellTool};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let tool = ShellTool::new(ExecutorConfig::with_project_root("."));
//!     let request = CommandRequest::new("cargo --version");
//!
//!     let result = tool
//!         .execute_with_confirmation(
//!             &request,
//!             &StaticDecision(ConfirmationOutcome::ProceedOnce),
//!             &CancellationToken::new(),
//!             None,
//!         )
//!         .await;
//!
//!     println!("{}", result.report_text);
//! }
//! ```

mod ansi;
mod cancel;
mod executor;
mod output;
mod result;
mod root;
mod shell;
mod validator;

pub use ansi::{strip_ansi, AnsiStripper};
pub use cancel::{kill_process_tree, CancellationController};
pub use executor::{
    ExecutionSession, ExecutorConfig, ProgressCallback, ShellExecutor, DEFAULT_EXIT_DRAIN,
};
pub use output::{trim_trailing_newlines, OutputAggregator, StreamKind, DEFAULT_PROGRESS_INTERVAL};
pub use result::{
    ExecutionResult, ResultComposer, RunOutcome, CANCELLED_DISPLAY, EMPTY_MARKER, NONE_MARKER,
    ROOT_MARKER,
};
pub use root::command_root;
pub use shell::ShellTool;
pub use validator::{CommandRequest, CommandValidator, ValidatedCommand, ValidationError};
