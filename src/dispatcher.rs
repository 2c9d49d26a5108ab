//! Per-request dispatch: validation, admission, submission, reply.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::address;
use crate::chain::TransferSubmitter;
use crate::errors::SubmissionError;
use crate::rate_limiter::RateLimiter;

/// One inbound dispense request, as delivered by the chat collaborator after
/// it stripped the command trigger.
#[derive(Debug, Clone)]
pub struct DispenseRequest {
    pub requester_id: String,
    pub args: Vec<String>,
}

/// Terminal result of one request. Maps 1:1 to a reply string.
#[derive(Debug, Clone, PartialEq)]
pub enum DispenseOutcome {
    Sent {
        tx_hash: String,
        amount: String,
        symbol: String,
        recipient: String,
    },
    RateLimited {
        remaining: Duration,
    },
    InvalidAddress,
    MissingArgument,
    SubmissionFailed {
        reason: String,
    },
}

/// Dispatcher settings, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// Human-readable decimal amount, echoed in the success reply
    pub amount: String,
    pub symbol: String,
    /// Network display name for the invalid-address reply
    pub network: String,
    pub address_prefix: String,
    pub cooldown: Duration,
}

pub struct FaucetDispatcher {
    submitter: Arc<dyn TransferSubmitter>,
    limiter: RateLimiter,
    settings: DispatcherSettings,
}

impl FaucetDispatcher {
    pub fn new(submitter: Arc<dyn TransferSubmitter>, settings: DispatcherSettings) -> Self {
        Self { submitter, limiter: RateLimiter::new(), settings }
    }

    /// Run one request to its terminal outcome.
    ///
    /// The admission guard spans the whole submission, so a second request
    /// from the same requester cannot slip through mid-flight; it is dropped
    /// uncommitted on every failure path, leaving the window open for an
    /// immediate retry.
    pub async fn dispatch(&self, request: &DispenseRequest) -> DispenseOutcome {
        let Some(candidate) = request.args.first() else {
            debug!(requester = %request.requester_id, "dispense request without address argument");
            return DispenseOutcome::MissingArgument;
        };

        if !address::validate(candidate, &self.settings.address_prefix) {
            debug!(
                requester = %request.requester_id,
                candidate = %candidate,
                "invalid recipient address"
            );
            return DispenseOutcome::InvalidAddress;
        }

        let guard = match self.limiter.try_admit(&request.requester_id, self.settings.cooldown) {
            Ok(guard) => guard,
            Err(remaining) => {
                debug!(
                    requester = %request.requester_id,
                    remaining_secs = remaining.as_secs(),
                    "request refused by cooldown"
                );
                return DispenseOutcome::RateLimited { remaining };
            }
        };

        info!(
            requester = %request.requester_id,
            recipient = %candidate,
            amount = %self.settings.amount,
            symbol = %self.settings.symbol,
            "submitting transfer"
        );

        match self.submitter.submit(candidate).await {
            Ok(tx_hash) => {
                guard.commit(self.settings.cooldown);
                info!(tx_hash = %tx_hash, recipient = %candidate, "transfer confirmed");
                DispenseOutcome::Sent {
                    tx_hash,
                    amount: self.settings.amount.clone(),
                    symbol: self.settings.symbol.clone(),
                    recipient: candidate.clone(),
                }
            }
            Err(err) => {
                error!(
                    requester = %request.requester_id,
                    recipient = %candidate,
                    error = %err,
                    "transfer submission failed"
                );
                DispenseOutcome::SubmissionFailed { reason: failure_reason(&err) }
            }
        }
    }

    /// Render the single reply string for an outcome.
    pub fn reply(&self, outcome: &DispenseOutcome) -> String {
        match outcome {
            DispenseOutcome::Sent { tx_hash, amount, symbol, recipient } => {
                format!("Done! Transfer {} {} to {} with hash {}", amount, symbol, recipient, tx_hash)
            }
            DispenseOutcome::RateLimited { .. } => format!(
                "Sorry please wait for {} hours between token requests from the same account!",
                self.cooldown_hours()
            ),
            DispenseOutcome::InvalidAddress => format!(
                "Invalid address! Please use the {} format with address type {}!",
                self.settings.network, self.settings.address_prefix
            ),
            DispenseOutcome::MissingArgument => format!(
                "Missing address! Please provide the address that should receive the {}!",
                self.settings.symbol
            ),
            DispenseOutcome::SubmissionFailed { reason } => format!("Sorry, {}!", reason),
        }
    }

    /// Live cooldown entries, for the status endpoint
    pub fn active_cooldowns(&self) -> usize {
        self.limiter.active()
    }

    fn cooldown_hours(&self) -> String {
        let hours = self.settings.cooldown.as_secs_f64() / 3600.0;
        if hours >= 1.0 && hours.fract() == 0.0 {
            format!("{}", hours as u64)
        } else {
            format!("{:.1}", hours)
        }
    }
}

/// Requester-facing description of a submission failure. Detailed node output
/// stays in the logs; key material appears nowhere.
fn failure_reason(err: &SubmissionError) -> String {
    match err {
        SubmissionError::InvalidAddress => "the recipient address was rejected".to_string(),
        SubmissionError::NodeUnreachable(_) => {
            "the chain node is not responding, please try again later".to_string()
        }
        SubmissionError::SigningFailed(_) => {
            "the faucet could not sign the transfer, the operator has been notified".to_string()
        }
        SubmissionError::Rejected(_) => {
            "the chain rejected the transfer, the operator has been notified".to_string()
        }
    }
}
