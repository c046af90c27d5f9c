//! Notification fan-out.
//!
//! Sends a composed payload to every delivery token of a recipient, collects
//! the per-token outcomes, and prunes tokens the delivery service reported as
//! permanently invalid. Delivery is best-effort: no outcome here ever fails
//! the triggering event, and transient failures are left to the platform's
//! redelivery rather than retried in place.

use futures::future::join_all;

use crate::heartline::Heartline;
use crate::heartline::error::Result;
use crate::heartline::push::{DeliveryError, PushPayload};

/// Outcome of one fan-out call.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Tokens the service accepted the payload for.
    pub delivered: Vec<String>,
    /// Tokens that failed for a reason that may heal on its own.
    pub transient_failures: Vec<(String, DeliveryError)>,
    /// Tokens reported permanently invalid; these were removed from the
    /// recipient's registry.
    pub invalid: Vec<String>,
}

impl DispatchReport {
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn failure_count(&self) -> usize {
        self.transient_failures.len() + self.invalid.len()
    }
}

impl Heartline {
    /// Fans a payload out to every token and cleans up after the delivery
    /// service's verdicts.
    ///
    /// Pruning works against the registry as it is at removal time, not the
    /// snapshot the send started from, so a token registered while the send
    /// was in flight survives.
    pub(crate) async fn dispatch_to_member(
        &self,
        uid: &str,
        tokens: &[String],
        payload: &PushPayload,
    ) -> Result<DispatchReport> {
        if tokens.is_empty() {
            return Ok(DispatchReport::default());
        }

        let sends = tokens.iter().map(|token| async move {
            let result = self.push.send(token, payload).await;
            (token.clone(), result)
        });
        let outcomes = join_all(sends).await;

        let mut report = DispatchReport::default();
        for (token, result) in outcomes {
            match result {
                Ok(()) => report.delivered.push(token),
                Err(DeliveryError::NotRegistered) => report.invalid.push(token),
                Err(e) => report.transient_failures.push((token, e)),
            }
        }

        if report.delivered.is_empty() && report.invalid.is_empty() {
            tracing::error!(
                target: "heartline::dispatcher::dispatch_to_member",
                "Delivery failed for all {} tokens of member {}",
                tokens.len(),
                uid
            );
        } else {
            tracing::debug!(
                target: "heartline::dispatcher::dispatch_to_member",
                "Delivered to {}/{} tokens of member {}",
                report.delivered_count(),
                tokens.len(),
                uid
            );
        }

        if !report.invalid.is_empty() {
            let removed = self.database.remove_push_tokens(uid, &report.invalid).await?;
            tracing::info!(
                target: "heartline::dispatcher::dispatch_to_member",
                "Removed {} invalid tokens for member {}",
                removed,
                uid
            );
        }

        Ok(report)
    }
}
