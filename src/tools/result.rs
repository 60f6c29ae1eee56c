//! Result Composition
//!
//! Turns the final state of an execution into two texts: a fixed-field report
//! for the calling agent and a short display string for the human.
//!
//! # Report format
//!
//! ```text
//! Command: <command>
//! Directory: <directory or (root)>
//! Stdout: <stripped stdout or (empty)>
//! Stderr: <stripped stderr or (empty)>
//! Error: <spawn error or (none)>
//! Exit Code: <code or (none)>
//! Signal: <signal or (none)>
//! Background PIDs: (none)
//! Process Group PGID: <pid or (none)>
//! ```
//!
//! The field order and the placeholder vocabulary are stable; consumers parse
//! the report heuristically.

use super::executor::ExecutionSession;
use super::validator::{CommandRequest, ValidationError};
use serde::{Deserialize, Serialize};

/// Placeholder for empty output
pub const EMPTY_MARKER: &str = "(empty)";

/// Placeholder for absent values
pub const NONE_MARKER: &str = "(none)";

/// Placeholder for "no directory given"
pub const ROOT_MARKER: &str = "(root)";

/// Display text for any cancelled or declined command
pub const CANCELLED_DISPLAY: &str = "Command cancelled by user.";

/// How a tool invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Exited with code 0
    Success,
    /// Exited with a nonzero code or was terminated by a signal
    Failure,
    /// Aborted before or during the run
    Cancelled,
    /// Refused at the confirmation prompt
    Declined,
    /// Failed validation; nothing was spawned
    Rejected,
    /// The interpreter could not be started
    SpawnError,
}

impl RunOutcome {
    /// Label used for metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Failure => "failure",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Declined => "declined",
            RunOutcome::Rejected => "rejected",
            RunOutcome::SpawnError => "spawn_error",
        }
    }

    fn of(session: &ExecutionSession, cancelled: bool) -> Self {
        if cancelled {
            RunOutcome::Cancelled
        } else if session.error().is_some() && session.pid().is_none() {
            RunOutcome::SpawnError
        } else if session.exit_code() == Some(0) {
            RunOutcome::Success
        } else {
            RunOutcome::Failure
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Report for the calling agent
    pub report_text: String,

    /// Text shown to the human; may be empty for a silent success
    pub display_text: String,

    /// How the run ended
    pub outcome: RunOutcome,

    /// Exit code of the shell; absent when it never ran or died by a signal
    pub exit_code: Option<i32>,
}

/// Builds [`ExecutionResult`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultComposer {
    debug_mode: bool,
}

impl ResultComposer {
    /// Create a composer; in debug mode the display text repeats the report
    pub fn new(debug_mode: bool) -> Self {
        Self { debug_mode }
    }

    /// Result for a request that failed validation
    pub fn rejected(&self, request: &CommandRequest, error: &ValidationError) -> ExecutionResult {
        ExecutionResult {
            report_text: format!("Command rejected: {}\nReason: {}", request.command, error),
            display_text: format!("Error: {}", error),
            outcome: RunOutcome::Rejected,
            exit_code: None,
        }
    }

    /// Result for a run whose abort signal was active before spawning
    pub fn cancelled_before_start(&self) -> ExecutionResult {
        ExecutionResult {
            report_text: "Command was cancelled by user before it could start.".to_string(),
            display_text: CANCELLED_DISPLAY.to_string(),
            outcome: RunOutcome::Cancelled,
            exit_code: None,
        }
    }

    /// Result for a command the user declined at the confirmation prompt
    pub fn declined(&self, request: &CommandRequest) -> ExecutionResult {
        ExecutionResult {
            report_text: format!(
                "Command not executed: user declined confirmation for: {}",
                request.command
            ),
            display_text: CANCELLED_DISPLAY.to_string(),
            outcome: RunOutcome::Declined,
            exit_code: None,
        }
    }

    /// Result for a run that reached the process stage
    pub fn compose(
        &self,
        request: &CommandRequest,
        session: &ExecutionSession,
        cancelled: bool,
    ) -> ExecutionResult {
        let report_text = if cancelled {
            cancelled_report(session.output().combined())
        } else {
            structured_report(request, session)
        };

        let display_text = if self.debug_mode {
            report_text.clone()
        } else {
            display_summary(session, cancelled)
        };

        ExecutionResult {
            report_text,
            display_text,
            outcome: RunOutcome::of(session, cancelled),
            exit_code: session.exit_code(),
        }
    }
}

fn or_marker<'a>(value: &'a str, marker: &'a str) -> &'a str {
    if value.is_empty() {
        marker
    } else {
        value
    }
}

fn cancelled_report(output: &str) -> String {
    let mut report = String::from("Command was cancelled by user before it could complete.");
    if output.trim().is_empty() {
        report.push_str(" There was no output before it was cancelled.");
    } else {
        report.push_str(" Below is the output (on both stdout and stderr) before it was cancelled:\n");
        report.push_str(output);
    }
    report
}

fn structured_report(request: &CommandRequest, session: &ExecutionSession) -> String {
    let output = session.output();
    let exit_code = session
        .exit_code()
        .map_or_else(|| NONE_MARKER.to_string(), |code| code.to_string());
    let pgid = session
        .pid()
        .map_or_else(|| NONE_MARKER.to_string(), |pid| pid.to_string());

    [
        format!("Command: {}", request.command),
        format!(
            "Directory: {}",
            request.directory.as_deref().unwrap_or(ROOT_MARKER)
        ),
        format!("Stdout: {}", or_marker(output.stdout(), EMPTY_MARKER)),
        format!("Stderr: {}", or_marker(output.stderr(), EMPTY_MARKER)),
        format!("Error: {}", session.error().unwrap_or(NONE_MARKER)),
        format!("Exit Code: {}", exit_code),
        format!("Signal: {}", session.signal().unwrap_or(NONE_MARKER)),
        format!("Background PIDs: {}", NONE_MARKER),
        format!("Process Group PGID: {}", pgid),
    ]
    .join("\n")
}

fn display_summary(session: &ExecutionSession, cancelled: bool) -> String {
    let output = session.output().combined();
    if !output.trim().is_empty() {
        return output.to_string();
    }

    if cancelled {
        CANCELLED_DISPLAY.to_string()
    } else if let Some(signal) = session.signal() {
        format!("Command terminated by signal: {}", signal)
    } else if let Some(error) = session.error() {
        format!("Command failed: {}", error)
    } else {
        match session.exit_code() {
            Some(code) if code != 0 => format!("Command exited with code: {}", code),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::output::StreamKind;
    use std::time::{Duration, Instant};

    fn session() -> ExecutionSession {
        ExecutionSession::new(Duration::from_secs(1), Instant::now())
    }

    fn field<'a>(report: &'a str, label: &str) -> &'a str {
        report
            .lines()
            .find_map(|line| line.strip_prefix(&format!("{}: ", label)))
            .unwrap_or_else(|| panic!("missing field {}", label))
    }

    #[test]
    fn test_clean_silent_success() {
        let mut session = session();
        session.set_pid(4242);
        session.record_exit(Some(0), None);
        session.mark_exited();

        let result = ResultComposer::new(false).compose(&CommandRequest::new("true"), &session, false);

        assert_eq!(result.display_text, "");
        assert_eq!(result.outcome, RunOutcome::Success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(field(&result.report_text, "Command"), "true");
        assert_eq!(field(&result.report_text, "Directory"), ROOT_MARKER);
        assert_eq!(field(&result.report_text, "Stdout"), EMPTY_MARKER);
        assert_eq!(field(&result.report_text, "Stderr"), EMPTY_MARKER);
        assert_eq!(field(&result.report_text, "Error"), NONE_MARKER);
        assert_eq!(field(&result.report_text, "Exit Code"), "0");
        assert_eq!(field(&result.report_text, "Signal"), NONE_MARKER);
        assert_eq!(field(&result.report_text, "Background PIDs"), NONE_MARKER);
        assert_eq!(field(&result.report_text, "Process Group PGID"), "4242");
    }

    #[test]
    fn test_report_field_order() {
        let mut session = session();
        session.record_exit(Some(0), None);

        let result = ResultComposer::new(false).compose(&CommandRequest::new("ls"), &session, false);
        let labels: Vec<&str> = result
            .report_text
            .lines()
            .filter_map(|line| line.split_once(':').map(|(label, _)| label))
            .collect();

        assert_eq!(
            labels,
            [
                "Command",
                "Directory",
                "Stdout",
                "Stderr",
                "Error",
                "Exit Code",
                "Signal",
                "Background PIDs",
                "Process Group PGID"
            ]
        );
    }

    #[test]
    fn test_output_in_report_and_display() {
        let mut session = session();
        let now = Instant::now();
        session.output_mut().push(StreamKind::Stdout, b"\x1b[1mbuilt\x1b[0m\n", now);
        session.output_mut().push(StreamKind::Stderr, b"warning: x\n\n", now);
        session.record_exit(Some(0), None);
        session.mark_exited();

        let request = CommandRequest::new("make").in_directory("src");
        let result = ResultComposer::new(false).compose(&request, &session, false);

        assert_eq!(field(&result.report_text, "Directory"), "src");
        assert_eq!(field(&result.report_text, "Stdout"), "built");
        assert_eq!(field(&result.report_text, "Stderr"), "warning: x");
        assert_eq!(result.display_text, "\x1b[1mbuilt\x1b[0m\nwarning: x");
    }

    #[test]
    fn test_nonzero_exit_display() {
        let mut session = session();
        session.record_exit(Some(2), None);

        let result = ResultComposer::new(false).compose(&CommandRequest::new("false"), &session, false);

        assert_eq!(result.display_text, "Command exited with code: 2");
        assert_eq!(field(&result.report_text, "Exit Code"), "2");
        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(result.exit_code, Some(2));
    }

    #[test]
    fn test_signal_display() {
        let mut session = session();
        session.record_exit(None, Some("SIGTERM".to_string()));

        let result = ResultComposer::new(false).compose(&CommandRequest::new("x"), &session, false);

        assert_eq!(result.display_text, "Command terminated by signal: SIGTERM");
        assert_eq!(field(&result.report_text, "Exit Code"), NONE_MARKER);
        assert_eq!(result.outcome, RunOutcome::Failure);
        assert_eq!(result.exit_code, None);
        assert_eq!(field(&result.report_text, "Signal"), "SIGTERM");
    }

    #[test]
    fn test_spawn_error_display() {
        let mut session = session();
        session.record_error("No such file or directory (os error 2)");

        let result = ResultComposer::new(false).compose(&CommandRequest::new("x"), &session, false);

        assert_eq!(
            result.display_text,
            "Command failed: No such file or directory (os error 2)"
        );
        assert_eq!(
            field(&result.report_text, "Error"),
            "No such file or directory (os error 2)"
        );
        assert_eq!(field(&result.report_text, "Process Group PGID"), NONE_MARKER);
        assert_eq!(result.outcome, RunOutcome::SpawnError);
    }

    #[test]
    fn test_exit_code_follows_session_not_output() {
        let mut session = session();
        session.set_pid(7);
        session
            .output_mut()
            .push(StreamKind::Stdout, b"x\nExit Code: 0\n", Instant::now());
        session.record_exit(Some(3), None);
        session.mark_exited();

        let result = ResultComposer::new(false).compose(&CommandRequest::new("x"), &session, false);

        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.outcome, RunOutcome::Failure);
    }

    #[test]
    fn test_cancelled_with_output() {
        let mut session = session();
        session
            .output_mut()
            .push(StreamKind::Stdout, b"partial\n\n", Instant::now());
        session.record_exit(None, Some("SIGKILL".to_string()));

        let result = ResultComposer::new(false).compose(&CommandRequest::new("x"), &session, true);

        assert!(result.report_text.starts_with("Command was cancelled by user"));
        assert!(result.report_text.ends_with("cancelled:\npartial"));
        assert_eq!(result.display_text, "partial");
        assert_eq!(result.outcome, RunOutcome::Cancelled);
    }

    #[test]
    fn test_cancelled_without_output() {
        let mut session = session();
        session.record_exit(None, Some("SIGKILL".to_string()));

        let result = ResultComposer::new(false).compose(&CommandRequest::new("x"), &session, true);

        assert!(result
            .report_text
            .contains("There was no output before it was cancelled."));
        assert_eq!(result.display_text, CANCELLED_DISPLAY);
    }

    #[test]
    fn test_debug_mode_display_equals_report() {
        let mut session = session();
        session.record_exit(Some(0), None);

        let result = ResultComposer::new(true).compose(&CommandRequest::new("true"), &session, false);

        assert_eq!(result.display_text, result.report_text);
    }

    #[test]
    fn test_rejected_and_declined() {
        let composer = ResultComposer::default();
        let request = CommandRequest::new("   ");

        let rejected = composer.rejected(&request, &ValidationError::EmptyCommand);
        assert_eq!(
            rejected.report_text,
            "Command rejected:    \nReason: Command cannot be empty."
        );
        assert_eq!(rejected.display_text, "Error: Command cannot be empty.");
        assert_eq!(rejected.outcome, RunOutcome::Rejected);

        let declined = composer.declined(&CommandRequest::new("rm -rf build"));
        assert!(declined.report_text.contains("rm -rf build"));
        assert_eq!(declined.display_text, CANCELLED_DISPLAY);
        assert_eq!(declined.outcome, RunOutcome::Declined);

        let early = composer.cancelled_before_start();
        assert!(early.report_text.contains("before it could start"));
        assert!(!early.report_text.contains("PGID"));
        assert_eq!(early.outcome, RunOutcome::Cancelled);
        assert_eq!(early.exit_code, None);
    }
}
