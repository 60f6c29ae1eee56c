// Shellgate - Main Entry Point
//
// CLI around the shell tool:
// - run a single command with confirmation and Ctrl-C cancellation
// - interactive session sharing one trust whitelist
// - command root inspection
// - effective configuration dump

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shellgate::approval::{
    ConfirmationHandler, ConfirmationOutcome, StaticDecision, TerminalPrompt,
};
use shellgate::config::Config;
use shellgate::tools::{
    command_root, trim_trailing_newlines, CommandRequest, ExecutionResult, RunOutcome, ShellTool,
};
use shellgate::{logging, metrics};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shellgate: confirmed, cancellable shell command execution
#[derive(Parser, Debug)]
#[command(name = "shellgate")]
#[command(version)]
#[command(about = "Run shell commands behind a confirmation gate", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single shell command
    Run {
        /// Command line passed to the shell
        command: String,

        /// Working directory relative to the project root
        #[arg(long)]
        dir: Option<String>,

        /// Short explanation of the command
        #[arg(long)]
        description: Option<String>,

        /// Run without asking for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Display the full report
        #[arg(long)]
        debug: bool,
    },
    /// Print the command root used for trust decisions
    Root {
        /// Command line to inspect
        command: String,
    },
    /// Start an interactive session
    Shell,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    logging::init(&config.logging, args.verbose)?;
    metrics::init().context("Failed to register metrics")?;
    debug!("Effective configuration: {:?}", config);

    match args.command {
        Commands::Run {
            command,
            dir,
            description,
            yes,
            json,
            debug,
        } => {
            let mut request = CommandRequest::new(command);
            if let Some(dir) = dir {
                request = request.in_directory(dir);
            }
            if let Some(description) = description {
                request = request.with_description(description);
            }
            let code = run_once(&config, request, yes, json, debug).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Root { command } => match command_root(&command) {
            Some(root) => println!("{}", root),
            None => {
                eprintln!("Could not identify command root");
                std::process::exit(1);
            }
        },
        Commands::Shell => interactive_session(&config).await?,
        Commands::Config => print!("{}", config.to_toml()?),
    }

    Ok(())
}

/// Cancel `token` when Ctrl-C is pressed
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, cancelling command");
                token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    })
}

/// Ctrl-C routing for an interactive session
///
/// One listener lives for the whole session. An interrupt cancels the
/// command in flight; at the prompt it only prints how to leave.
#[derive(Debug, Clone, Default)]
struct SessionInterrupts {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl SessionInterrupts {
    /// Token for the next command; interrupts cancel it until [`Self::end`]
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.lock() = Some(token.clone());
        token
    }

    fn end(&self) {
        *self.lock() = None;
    }

    /// Cancel the command in flight, if any
    fn interrupt(&self) -> bool {
        match self.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn listen(&self) -> tokio::task::JoinHandle<()> {
        let interrupts = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    return;
                }
                if interrupts.interrupt() {
                    info!("Interrupt received, cancelling command");
                } else {
                    print!("\nUse :quit or Ctrl-D to end the session.\n$ ");
                    let _ = io::stdout().flush();
                }
            }
        })
    }
}

/// Run one command, streaming its output to stdout
async fn execute_streaming(
    tool: &ShellTool,
    request: &CommandRequest,
    handler: &dyn ConfirmationHandler,
    cancel: &CancellationToken,
    stream: bool,
) -> ExecutionResult {
    let mut streamed = String::new();
    let mut print_progress = |snapshot: &str| {
        let fresh = new_text(&streamed, snapshot);
        if !fresh.is_empty() {
            let mut out = io::stdout().lock();
            let _ = out.write_all(fresh.as_bytes());
            let _ = out.flush();
            streamed = snapshot.to_string();
        }
    };

    let result = if stream {
        tool.execute_with_confirmation(request, handler, cancel, Some(&mut print_progress))
            .await
    } else {
        tool.execute_with_confirmation(request, handler, cancel, None)
            .await
    };

    if stream {
        let rest = remaining_display(&streamed, &result.display_text);
        if !rest.is_empty() {
            println!("{}", rest);
        } else if !streamed.is_empty() && !streamed.ends_with('\n') {
            println!();
        }
    } else if !result.display_text.is_empty() {
        println!("{}", result.display_text);
    }

    result
}

async fn run_once(
    config: &Config,
    request: CommandRequest,
    yes: bool,
    json: bool,
    debug: bool,
) -> Result<i32> {
    let mut executor_config = config.executor_config();
    executor_config.debug_mode |= debug;
    let stream = !json && !executor_config.debug_mode;
    let tool = ShellTool::new(executor_config);

    let handler: Box<dyn ConfirmationHandler> = if yes {
        Box::new(StaticDecision(ConfirmationOutcome::ProceedOnce))
    } else {
        Box::new(TerminalPrompt::new())
    };

    let cancel = CancellationToken::new();
    let listener = cancel_on_ctrl_c(cancel.clone());
    let result = if json {
        let result = tool
            .execute_with_confirmation(&request, handler.as_ref(), &cancel, None)
            .await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        result
    } else {
        execute_streaming(&tool, &request, handler.as_ref(), &cancel, stream).await
    };
    listener.abort();

    Ok(exit_status(&result))
}

/// Text in `snapshot` that has not been printed yet
///
/// Snapshots grow by appending, so anything past the printed prefix is new.
fn new_text<'a>(streamed: &str, snapshot: &'a str) -> &'a str {
    match snapshot.strip_prefix(streamed) {
        Some(fresh) => fresh,
        None => snapshot,
    }
}

/// Part of the final display text not already streamed
fn remaining_display<'a>(streamed: &str, display: &'a str) -> &'a str {
    if streamed.is_empty() {
        return display;
    }
    let printed = trim_trailing_newlines(streamed);
    match display.strip_prefix(printed) {
        Some(rest) => {
            let printed_newlines = &streamed[printed.len()..];
            rest.strip_prefix(printed_newlines).unwrap_or(rest)
        }
        None => display,
    }
}

/// Process exit status for a finished command
fn exit_status(result: &ExecutionResult) -> i32 {
    match result.outcome {
        RunOutcome::Cancelled | RunOutcome::Declined => 130,
        _ => result.exit_code.unwrap_or(1),
    }
}

/// Meta commands available in the interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaCommand {
    Trusted,
    History,
    Metrics,
    Help,
    Quit,
}

/// Input line in the interactive session
#[derive(Debug, PartialEq, Eq)]
enum SessionInput<'a> {
    Empty,
    Meta(MetaCommand),
    UnknownMeta(&'a str),
    Command(&'a str),
}

fn parse_session_input(line: &str) -> SessionInput<'_> {
    let line = line.trim();
    if line.is_empty() {
        return SessionInput::Empty;
    }
    if let Some(meta) = line.strip_prefix(':') {
        return match meta.trim().to_lowercase().as_str() {
            "trusted" => SessionInput::Meta(MetaCommand::Trusted),
            "history" => SessionInput::Meta(MetaCommand::History),
            "metrics" => SessionInput::Meta(MetaCommand::Metrics),
            "help" | "?" => SessionInput::Meta(MetaCommand::Help),
            "quit" | "exit" | "q" => SessionInput::Meta(MetaCommand::Quit),
            _ => SessionInput::UnknownMeta(line),
        };
    }
    SessionInput::Command(line)
}

fn print_session_help() {
    println!("\nAvailable commands:");
    println!("  <command>  - Run a shell command");
    println!("  :trusted   - List command roots trusted for this session");
    println!("  :history   - Show confirmation history as JSON");
    println!("  :metrics   - Show execution metrics");
    println!("  :help      - Show this help message");
    println!("  :quit      - Exit the session (or Ctrl-D)");
    println!("  Ctrl-C     - Cancel the running command");
    println!();
}

/// Read one line from stdin without blocking the runtime
async fn read_line() -> Result<Option<String>> {
    tokio::task::spawn_blocking(|| -> Result<Option<String>> {
        let mut line = String::new();
        match io::stdin().read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    })
    .await?
}

async fn interactive_session(config: &Config) -> Result<()> {
    let tool = ShellTool::new(config.executor_config());
    let prompt = TerminalPrompt::new();
    let stream = !config.execution.debug_mode;
    let interrupts = SessionInterrupts::default();
    let listener = interrupts.listen();

    println!("Shellgate interactive session");
    println!("Project root: {}", config.execution.project_root.display());
    println!("Type ':help' for available commands.\n");

    loop {
        print!("$ ");
        io::stdout().flush()?;

        let Some(line) = read_line().await? else {
            println!();
            break;
        };

        match parse_session_input(&line) {
            SessionInput::Empty => continue,
            SessionInput::Meta(MetaCommand::Quit) => break,
            SessionInput::Meta(MetaCommand::Help) => print_session_help(),
            SessionInput::Meta(MetaCommand::Trusted) => {
                let roots = tool.whitelist().roots();
                if roots.is_empty() {
                    println!("No trusted command roots.");
                } else {
                    for root in roots {
                        println!("  {}", root);
                    }
                }
            }
            SessionInput::Meta(MetaCommand::History) => println!("{}", tool.export_history()?),
            SessionInput::Meta(MetaCommand::Metrics) => print!("{}", metrics::gather_metrics()?),
            SessionInput::UnknownMeta(input) => {
                println!("Unknown command: {}. Type ':help' for help.", input)
            }
            SessionInput::Command(command) => {
                let request = CommandRequest::new(command);
                let cancel = interrupts.begin();
                let result = execute_streaming(&tool, &request, &prompt, &cancel, stream).await;
                interrupts.end();
                debug!("Report:\n{}", result.report_text);
            }
        }
    }

    listener.abort();
    info!("Session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_text() {
        assert_eq!(new_text("", "abc"), "abc");
        assert_eq!(new_text("ab", "abcd"), "cd");
        assert_eq!(new_text("abcd", "abcd"), "");
    }

    #[test]
    fn test_remaining_display() {
        assert_eq!(remaining_display("", "done"), "done");
        assert_eq!(remaining_display("line 1\n", "line 1\nline 2"), "line 2");
        assert_eq!(remaining_display("line 1\n", "line 1"), "");
        assert_eq!(remaining_display("partial", "partial output"), " output");
        assert_eq!(
            remaining_display("out\n", "Command exited with code: 1"),
            "Command exited with code: 1"
        );
    }

    #[test]
    fn test_exit_status() {
        let result = |outcome: RunOutcome, exit_code: Option<i32>| ExecutionResult {
            report_text: "Stdout: Exit Code: 0\nExit Code: 0".to_string(),
            display_text: String::new(),
            outcome,
            exit_code,
        };

        assert_eq!(exit_status(&result(RunOutcome::Success, Some(0))), 0);
        assert_eq!(exit_status(&result(RunOutcome::Failure, Some(3))), 3);
        assert_eq!(exit_status(&result(RunOutcome::Failure, None)), 1);
        assert_eq!(exit_status(&result(RunOutcome::Cancelled, Some(0))), 130);
        assert_eq!(exit_status(&result(RunOutcome::Declined, None)), 130);
        assert_eq!(exit_status(&result(RunOutcome::Rejected, None)), 1);
        assert_eq!(exit_status(&result(RunOutcome::SpawnError, None)), 1);
    }

    #[test]
    fn test_session_interrupts_target_running_command() {
        let interrupts = SessionInterrupts::default();

        // at the prompt nothing is cancelled
        assert!(!interrupts.interrupt());

        let first = interrupts.begin();
        assert!(interrupts.interrupt());
        assert!(first.is_cancelled());
        interrupts.end();

        // the next command gets a fresh token
        let second = interrupts.begin();
        assert!(!second.is_cancelled());
        interrupts.end();
        assert!(!interrupts.interrupt());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn test_parse_session_input() {
        assert_eq!(parse_session_input("  \n"), SessionInput::Empty);
        assert_eq!(
            parse_session_input(":trusted\n"),
            SessionInput::Meta(MetaCommand::Trusted)
        );
        assert_eq!(
            parse_session_input(":QUIT"),
            SessionInput::Meta(MetaCommand::Quit)
        );
        assert_eq!(parse_session_input(":nope"), SessionInput::UnknownMeta(":nope"));
        assert_eq!(
            parse_session_input("ls -la\n"),
            SessionInput::Command("ls -la")
        );
    }
}
