//! Confirmation Gate
//!
//! Decides before spawning whether the user must confirm a command.
//!
//! 1. Requests that fail validation need no confirmation; the runner rejects
//!    them anyway.
//! 2. Requests whose command root is trusted need no confirmation.
//! 3. Anything else yields a [`ConfirmationRequest`]. Only a
//!    [`ConfirmationOutcome::ProceedAlways`] delivered to it adds the root to
//!    the whitelist.
//!
//! Only the leading program is considered, so `git status; rm -rf build`
//! is gated as `git`.

use super::whitelist::TrustWhitelist;
use super::ConfirmationOutcome;
use crate::tools::{CommandRequest, CommandValidator};
use serde::Serialize;
use tracing::debug;

/// A pending confirmation for one command
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    /// Prompt title
    pub title: String,

    /// Full command text
    pub command: String,

    /// Extracted command root, the unit of trust
    pub root_command: String,

    #[serde(skip)]
    whitelist: TrustWhitelist,
}

impl ConfirmationRequest {
    /// Deliver the user's decision
    ///
    /// Returns whether the command may run.
    pub fn on_confirm(&self, outcome: ConfirmationOutcome) -> bool {
        crate::metrics::CONFIRMATION_OUTCOMES_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();

        if outcome == ConfirmationOutcome::ProceedAlways && self.whitelist.insert(&self.root_command) {
            debug!("Trusted command root: {}", self.root_command);
        }
        outcome.proceeds()
    }
}

/// Confirmation gate bound to one validator and one whitelist
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    validator: CommandValidator,
    whitelist: TrustWhitelist,
}

impl ConfirmationGate {
    pub fn new(validator: CommandValidator, whitelist: TrustWhitelist) -> Self {
        Self {
            validator,
            whitelist,
        }
    }

    /// The whitelist this gate consults
    pub fn whitelist(&self) -> &TrustWhitelist {
        &self.whitelist
    }

    /// Decide whether `request` needs confirmation
    pub fn should_confirm(&self, request: &CommandRequest) -> Option<ConfirmationRequest> {
        let validated = match self.validator.validate(request) {
            Ok(validated) => validated,
            Err(e) => {
                debug!("No confirmation for invalid request: {}", e);
                return None;
            }
        };

        if self.whitelist.contains(&validated.root) {
            debug!("Command root already trusted: {}", validated.root);
            return None;
        }

        crate::metrics::CONFIRMATION_REQUESTS_TOTAL.inc();
        Some(ConfirmationRequest {
            title: "Confirm Shell Command".to_string(),
            command: validated.command,
            root_command: validated.root,
            whitelist: self.whitelist.clone(),
        })
    }
}
