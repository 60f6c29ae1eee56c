//! Shell Tool
//!
//! One tool instance: an executor, a confirmation gate and the trust
//! whitelist the gate consults. The whitelist and the confirmation history
//! live as long as the instance and are shared by its clones.

use super::executor::{ExecutorConfig, ProgressCallback, ShellExecutor};
use super::result::ExecutionResult;
use super::validator::CommandRequest;
use crate::approval::{
    ConfirmationGate, ConfirmationHandler, ConfirmationHistory, ConfirmationRecord,
    ConfirmationRequest, TrustWhitelist,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ShellTool {
    executor: ShellExecutor,
    gate: ConfirmationGate,
    history: Arc<Mutex<ConfirmationHistory>>,
}

impl ShellTool {
    /// Create a tool instance with an empty whitelist
    pub fn new(config: ExecutorConfig) -> Self {
        let executor = ShellExecutor::new(config);
        let gate = ConfirmationGate::new(executor.validator().clone(), TrustWhitelist::new());
        Self {
            executor,
            gate,
            history: Arc::new(Mutex::new(ConfirmationHistory::new())),
        }
    }

    pub fn executor(&self) -> &ShellExecutor {
        &self.executor
    }

    /// Trusted command roots of this instance
    pub fn whitelist(&self) -> &TrustWhitelist {
        self.gate.whitelist()
    }

    /// Decide whether `request` needs confirmation
    pub fn should_confirm(&self, request: &CommandRequest) -> Option<ConfirmationRequest> {
        self.gate.should_confirm(request)
    }

    /// Run without asking; the caller has already handled confirmation
    pub async fn execute(
        &self,
        request: &CommandRequest,
        cancel: &CancellationToken,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> ExecutionResult {
        self.executor.run(request, cancel, on_progress).await
    }

    /// Confirm through `handler` when required, then run
    ///
    /// A declined command never spawns. A handler error is treated as a
    /// declined confirmation.
    pub async fn execute_with_confirmation<H>(
        &self,
        request: &CommandRequest,
        handler: &H,
        cancel: &CancellationToken,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> ExecutionResult
    where
        H: ConfirmationHandler + ?Sized,
    {
        if let Some(confirmation) = self.gate.should_confirm(request) {
            let outcome = match handler.confirm(&confirmation).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Confirmation failed, not running command: {:#}", e);
                    crate::approval::ConfirmationOutcome::Cancel
                }
            };

            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(ConfirmationRecord::new(
                    &confirmation.command,
                    &confirmation.root_command,
                    outcome,
                ));

            if !confirmation.on_confirm(outcome) {
                info!("User declined: {}", request.command);
                return self.executor.composer().declined(request);
            }
        }

        self.executor.run(request, cancel, on_progress).await
    }

    /// Snapshot of the confirmation history
    pub fn history(&self) -> ConfirmationHistory {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Confirmation history as JSON
    pub fn export_history(&self) -> anyhow::Result<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .export_json()
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}
