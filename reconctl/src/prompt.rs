use async_trait::async_trait;
use dialoguer::{Confirm, console::Term};
use recon_core::{ConfirmationRequest, OperatorPrompt};
use tracing::warn;

/// Asks on the terminal, or answers yes for every request when `assume_yes`.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl OperatorPrompt for TerminalPrompt {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        if self.assume_yes {
            return true;
        }

        let message = request.message.clone();
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(message)
                .default(false)
                .interact_on(&Term::stderr())
        })
        .await;

        match answer {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(err)) => {
                warn!(
                    job_id = %request.job_id,
                    error = %err,
                    "confirmation prompt failed"
                );
                false
            }
            Err(err) => {
                warn!(
                    job_id = %request.job_id,
                    error = %err,
                    "confirmation prompt task failed"
                );
                false
            }
        }
    }
}
