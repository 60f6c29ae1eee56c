// Command Confirmation Module
//
// Boundary between commands the user has already trusted and commands that
// need an explicit decision before they run.
//
// Trusted (no prompt):
// - Any command whose root was approved with "always allow" in this session
//
// Untrusted (prompt):
// - Every other valid command; the user may run it once, trust its root,
//   or cancel

pub mod gate;
pub mod history;
pub mod ui;
pub mod whitelist;

pub use gate::{ConfirmationGate, ConfirmationRequest};
pub use history::{ConfirmationHistory, ConfirmationRecord};
pub use ui::TerminalPrompt;
pub use whitelist::TrustWhitelist;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The user's answer to a confirmation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmationOutcome {
    /// Run this command once without remembering the root
    ProceedOnce,

    /// Run and trust the command root for the rest of the session
    ProceedAlways,

    /// Do not run
    Cancel,
}

impl ConfirmationOutcome {
    /// Whether the command may run
    pub fn proceeds(self) -> bool {
        !matches!(self, ConfirmationOutcome::Cancel)
    }

    /// Stable label used in metrics and logs
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmationOutcome::ProceedOnce => "proceed_once",
            ConfirmationOutcome::ProceedAlways => "proceed_always",
            ConfirmationOutcome::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for ConfirmationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfirmationOutcome::ProceedOnce => write!(f, "Proceed once"),
            ConfirmationOutcome::ProceedAlways => write!(f, "Proceed always"),
            ConfirmationOutcome::Cancel => write!(f, "Cancel"),
        }
    }
}

/// Supplies the human decision for a confirmation request
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> anyhow::Result<ConfirmationOutcome>;
}

/// Handler that always answers with the same outcome
///
/// Used for `--yes` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticDecision(pub ConfirmationOutcome);

#[async_trait]
impl ConfirmationHandler for StaticDecision {
    async fn confirm(&self, request: &ConfirmationRequest) -> anyhow::Result<ConfirmationOutcome> {
        tracing::debug!("Static decision for {}: {}", request.root_command, self.0);
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_proceeds() {
        assert!(ConfirmationOutcome::ProceedOnce.proceeds());
        assert!(ConfirmationOutcome::ProceedAlways.proceeds());
        assert!(!ConfirmationOutcome::Cancel.proceeds());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ConfirmationOutcome::ProceedAlways.as_str(), "proceed_always");
        assert_eq!(ConfirmationOutcome::Cancel.to_string(), "Cancel");
    }

    #[tokio::test]
    async fn test_static_decision() {
        let gate = ConfirmationGate::new(
            crate::tools::CommandValidator::new("."),
            TrustWhitelist::new(),
        );
        let request = gate
            .should_confirm(&crate::tools::CommandRequest::new("ls"))
            .unwrap();

        let outcome = StaticDecision(ConfirmationOutcome::ProceedOnce)
            .confirm(&request)
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::ProceedOnce);
    }
}
