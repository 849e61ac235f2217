//! Response pickers
//!
//! A picker consumes the outcome stream of one fan-out and decides what the
//! client sees. Every outcome it does not hand to the client has its body
//! drained, including outcomes still in flight when the decision is made.

use crate::synclog::SyncSender;
use std::sync::Arc;
use tessera_core::{CoreError, Outcome, OutcomeDigest, OutcomeStream, Picked, Result};
use tracing::debug;

/// Drain every outcome left on `stream`, returning the digests of failures
pub(crate) async fn drain_remaining(mut stream: OutcomeStream) -> Vec<OutcomeDigest> {
    let mut failures = Vec::new();
    while let Some(outcome) = stream.recv().await {
        if !outcome.is_successful() {
            failures.push(outcome.digest());
        }
        outcome.discard_body().await;
    }
    failures
}

fn winning_response(outcome: Outcome) -> Result<reqwest::Response> {
    outcome
        .into_response()
        .ok_or_else(|| CoreError::InvalidResponse("successful outcome without response".to_string()))
}

/// Availability-favoring policy for reads and idempotent writes
///
/// The first successful outcome is returned at once. Outcomes still in
/// flight are drained by a background task, which then records divergences.
#[derive(Clone, Debug)]
pub struct ObjectPicker {
    sync: Arc<SyncSender>,
}

impl ObjectPicker {
    pub fn new(sync: Arc<SyncSender>) -> Self {
        Self { sync }
    }

    pub async fn pick(&self, mut stream: OutcomeStream) -> Result<Picked> {
        let mut failures = Vec::new();
        let mut last_status = None;

        while let Some(outcome) = stream.recv().await {
            if outcome.is_successful() {
                let winner = outcome.digest();
                debug!(
                    "request {} answered by {}",
                    winner.request.request_id,
                    winner.backend.host()
                );
                let response = winning_response(outcome)?;
                let sync = Arc::clone(&self.sync);
                let settled = tokio::spawn(async move {
                    failures.extend(drain_remaining(stream).await);
                    sync.record(&winner, &failures).await;
                });
                return Ok(Picked::with_settlement(response, settled));
            }

            last_status = outcome.status().or(last_status);
            failures.push(outcome.digest());
            outcome.discard_body().await;
        }

        Err(CoreError::NoSuccessfulResponses { last_status })
    }
}

/// Unanimity policy for deletes
///
/// The whole stream is consumed before deciding. A delete that some backends
/// applied and others did not is reported as failed and recorded for repair;
/// nothing is rolled back.
#[derive(Clone, Debug)]
pub struct DeletePicker {
    sync: Arc<SyncSender>,
}

impl DeletePicker {
    pub fn new(sync: Arc<SyncSender>) -> Self {
        Self { sync }
    }

    pub async fn pick(&self, mut stream: OutcomeStream) -> Result<Picked> {
        let mut chosen: Option<Outcome> = None;
        let mut failures = Vec::new();
        let mut last_status = None;

        while let Some(outcome) = stream.recv().await {
            if outcome.is_successful() {
                if chosen.is_none() {
                    chosen = Some(outcome);
                } else {
                    outcome.discard_body().await;
                }
                continue;
            }
            last_status = outcome.status().or(last_status);
            failures.push(outcome.digest());
            outcome.discard_body().await;
        }

        match chosen {
            Some(outcome) if failures.is_empty() => Ok(Picked::new(winning_response(outcome)?)),
            Some(outcome) => {
                debug!(
                    "delete {} failed on {} of its backends",
                    outcome.request.request_id,
                    failures.len()
                );
                self.sync.record(&outcome.digest(), &failures).await;
                outcome.discard_body().await;
                Err(CoreError::NoSuccessfulResponses { last_status })
            }
            None => Err(CoreError::NoSuccessfulResponses { last_status }),
        }
    }
}
