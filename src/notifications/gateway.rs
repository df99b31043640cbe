//! Push gateway: the shared send primitive every handler ends up calling.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

use super::NotificationError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TokenFailure { pub token: String, pub reason: String }

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: Vec<TokenFailure>,
    /// Set when messages were handed off but the broker never confirmed them.
    pub unconfirmed: Option<String>,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered += other.delivered;
        self.failed.extend(other.failed);
        if other.unconfirmed.is_some() {
            self.unconfirmed = other.unconfirmed;
        }
    }

    /// Keeps the per-token outcome and notes a failed flush alongside it.
    pub fn confirmed_by<E: std::fmt::Display>(mut self, flush: Result<(), E>) -> Self {
        if let Err(e) = flush {
            self.unconfirmed = Some(e.to_string());
        }
        self
    }

    pub fn attempted(&self) -> usize { self.delivered + self.failed.len() }
}

/// Per-token failures belong in the report; `Err` means the gateway could
/// not be used at all for this batch.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send_multicast(&self, message: &PushMessage, tokens: &[String]) -> Result<DeliveryReport, NotificationError>;
}

/// Envelope published for the push worker, one per device token.
#[derive(Serialize)]
struct PushEnvelope<'a> {
    token: &'a str,
    #[serde(flatten)]
    message: &'a PushMessage,
}

/// Hands push messages to the delivery worker over NATS.
pub struct NatsPushGateway {
    client: async_nats::Client,
    subject: String,
}

impl NatsPushGateway {
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self { client, subject: subject.into() }
    }
}

#[async_trait]
impl PushGateway for NatsPushGateway {
    async fn send_multicast(&self, message: &PushMessage, tokens: &[String]) -> Result<DeliveryReport, NotificationError> {
        let mut report = DeliveryReport::default();
        for token in tokens {
            let payload = serde_json::to_vec(&PushEnvelope { token, message })?;
            match self.client.publish(self.subject.clone(), payload.into()).await {
                Ok(()) => report.delivered += 1,
                Err(e) => report.failed.push(TokenFailure { token: token.clone(), reason: e.to_string() }),
            }
        }
        Ok(report.confirmed_by(self.client.flush().await))
    }
}

/// Used when no broker is configured: records what would have been sent.
#[derive(Default)]
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn send_multicast(&self, message: &PushMessage, tokens: &[String]) -> Result<DeliveryReport, NotificationError> {
        tracing::info!(title = %message.title, recipients = tokens.len(), "push (log only)");
        Ok(DeliveryReport { delivered: tokens.len(), ..Default::default() })
    }
}
