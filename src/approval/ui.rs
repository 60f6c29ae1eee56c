//! Confirmation Prompt for the terminal
//!
//! Asks the user on stdin/stderr whether a command may run. Supports both
//! interactive and non-interactive (mock) modes.

use super::gate::ConfirmationRequest;
use super::{ConfirmationHandler, ConfirmationOutcome};
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

/// Terminal confirmation prompt
#[derive(Debug, Clone)]
pub struct TerminalPrompt {
    /// Read answers from stdin (false for testing)
    interactive: bool,

    /// Answer used in non-interactive mode
    default_outcome: ConfirmationOutcome,
}

impl TerminalPrompt {
    /// Create an interactive prompt
    pub fn new() -> Self {
        Self {
            interactive: true,
            default_outcome: ConfirmationOutcome::Cancel,
        }
    }

    /// Create a prompt that never reads stdin and answers with `outcome`
    pub fn mock(outcome: ConfirmationOutcome) -> Self {
        Self {
            interactive: false,
            default_outcome: outcome,
        }
    }

    fn print_request(request: &ConfirmationRequest) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "\n{}", request.title);
        let _ = writeln!(err, "  Command: {}", request.command);
        let _ = writeln!(err, "  Root:    {}", request.root_command);
        Self::print_options();
    }

    fn print_options() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "Please choose an action:");
        let _ = writeln!(err, "  (y) Yes     - Run this command once");
        let _ = writeln!(err, "  (a) Always  - Run and trust this command root for the session");
        let _ = writeln!(err, "  (n) No      - Do not run");
        let _ = write!(err, "\nYour choice: ");
        let _ = err.flush();
    }

    /// Read answers until one is valid; EOF cancels
    fn read_outcome(input: &mut impl BufRead) -> anyhow::Result<ConfirmationOutcome> {
        let mut line = String::new();

        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                warn!("No input provided (EOF), cancelling by default");
                return Ok(ConfirmationOutcome::Cancel);
            }

            match parse_answer(&line) {
                Some(outcome) => return Ok(outcome),
                None => {
                    let mut err = io::stderr().lock();
                    let _ = write!(
                        err,
                        "Invalid choice. Please enter 'y' (yes), 'a' (always) or 'n' (no): "
                    );
                    let _ = err.flush();
                }
            }
        }
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one line of user input
fn parse_answer(line: &str) -> Option<ConfirmationOutcome> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(ConfirmationOutcome::ProceedOnce),
        "a" | "always" => Some(ConfirmationOutcome::ProceedAlways),
        "n" | "no" | "q" | "quit" => Some(ConfirmationOutcome::Cancel),
        _ => None,
    }
}

#[async_trait]
impl ConfirmationHandler for TerminalPrompt {
    async fn confirm(&self, request: &ConfirmationRequest) -> anyhow::Result<ConfirmationOutcome> {
        debug!("Asking for confirmation: root={}", request.root_command);

        if !self.interactive {
            debug!("Mock confirmation prompt: using default outcome");
            return Ok(self.default_outcome);
        }

        Self::print_request(request);
        let outcome = tokio::task::spawn_blocking(|| {
            let stdin = io::stdin();
            let mut lock = stdin.lock();
            Self::read_outcome(&mut lock)
        })
        .await??;

        eprintln!("You chose: {}\n", outcome);
        Ok(outcome)
    }
}
