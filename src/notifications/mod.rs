//! Notification fan-out after a committed status change.
//!
//! [`NotificationDispatcher::dispatch`] never returns an error. Whatever goes
//! wrong while resolving recipients or talking to the gateway is logged here
//! and stops at this boundary.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::aggregates::{Order, OrderStatus};

pub mod gateway;
pub mod handlers;
pub mod recipients;

pub use gateway::{DeliveryReport, LogPushGateway, NatsPushGateway, PushGateway, PushMessage, TokenFailure};
pub use handlers::{handler_for, Audience, Handler};
pub use recipients::{MemoryRecipientDirectory, PgRecipientDirectory, RecipientDirectory};

/// Default multicast chunk, the common provider limit per request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Recipient lookup failed: {0}")]
    Recipients(String),

    #[error("Push delivery failed: {0}")]
    DeliveryFailure(String),

    #[error("Payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),
}

pub struct NotificationDispatcher {
    directory: Arc<dyn RecipientDirectory>,
    gateway: Arc<dyn PushGateway>,
    batch_size: usize,
}

impl NotificationDispatcher {
    pub fn new(directory: Arc<dyn RecipientDirectory>, gateway: Arc<dyn PushGateway>) -> Self {
        Self { directory, gateway, batch_size: DEFAULT_BATCH_SIZE }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn dispatch(&self, order: &Order, status: OrderStatus) {
        let Some(report) = self.notify(order, status).await else {
            debug!("nothing to send");
            return;
        };
        if let Some(reason) = &report.unconfirmed {
            warn!(delivered = report.delivered, reason = %reason, "push broker did not confirm delivery");
        }
        if report.failed.is_empty() {
            debug!(delivered = report.delivered, "notifications sent");
            return;
        }
        for failure in &report.failed {
            debug!(token = %failure.token, reason = %failure.reason, "push rejected");
        }
        warn!(delivered = report.delivered, failed = report.failed.len(), "some notifications were not delivered");
    }

    /// `None` when the status has no handler or nobody has a device token.
    pub async fn notify(&self, order: &Order, status: OrderStatus) -> Option<DeliveryReport> {
        let handler = handler_for(status)?;

        let tokens = self.resolve(order, handler.audiences).await;
        if tokens.is_empty() { return None; }

        let message = PushMessage {
            title: handler.title.to_string(),
            body: (handler.body)(order),
            data: [("order_id".to_string(), order.id.to_string()), ("status".to_string(), status.to_string())].into(),
        };

        let mut report = DeliveryReport::default();
        for chunk in tokens.chunks(self.batch_size) {
            match self.gateway.send_multicast(&message, chunk).await {
                Ok(r) => report.merge(r),
                Err(e) => {
                    warn!(error = %e, recipients = chunk.len(), "push batch failed");
                    report.failed.extend(chunk.iter().map(|t| TokenFailure { token: t.clone(), reason: e.to_string() }));
                }
            }
        }
        Some(report)
    }

    /// Collects deduplicated tokens across audiences. An audience whose
    /// lookup fails is skipped so the others are still reached.
    async fn resolve(&self, order: &Order, audiences: &[Audience]) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for audience in audiences {
            let found = match audience {
                Audience::Client => self.directory.user_tokens(&[order.user_id]).await,
                Audience::BusinessOwners => self.directory.business_owner_tokens(&order.business_ids()).await,
                Audience::AvailableCouriers => self.directory.available_courier_tokens().await,
                Audience::AssignedCourier => match order.delivery_agent_id {
                    Some(agent) => self.directory.user_tokens(&[agent]).await,
                    None => Ok(vec![]),
                },
            };
            match found {
                Ok(found) => {
                    for token in found {
                        if !tokens.contains(&token) { tokens.push(token); }
                    }
                }
                Err(e) => warn!(?audience, error = %e, "recipient lookup failed, skipping audience"),
            }
        }
        tokens
    }
}
