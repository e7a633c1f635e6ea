mod inmemory;
mod webhook;

pub use inmemory::{InMemoryDeliveryChannel, ScriptedDelivery};
use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use webhook::WebhookDeliveryChannel;

/// What the dispatcher hands the delivery channel: an opaque routing address
/// and the rendered message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub address: String,
    pub text: String,
}

/// Outcome of a delivery attempt the channel itself decided on
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryReceipt {
    Accepted,
    Rejected { reason: String },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Transport failure or channel 5xx; the obligation stays owed and is
    /// retried next cycle
    #[error("Transient delivery failure: {0}")]
    Transient(String),
}

/// The only outbound boundary of the dispatcher. The channel has no memory
/// of past sends; at-most-once lives entirely in the notification ledger.
#[async_trait::async_trait]
pub trait IDeliveryChannel: Send + Sync {
    async fn deliver(&self, message: &NotificationMessage)
        -> Result<DeliveryReceipt, DeliveryError>;
}
