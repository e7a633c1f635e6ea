use super::{DeliveryError, DeliveryReceipt, IDeliveryChannel, NotificationMessage};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Outcome the in-memory channel should produce for an upcoming delivery
#[derive(Debug, Clone)]
pub enum ScriptedDelivery {
    Accept,
    Reject(String),
    Transient(String),
}

/// Delivery channel used by tests: records every accepted message and can be
/// scripted to reject or transiently fail upcoming deliveries.
pub struct InMemoryDeliveryChannel {
    sent: Mutex<Vec<NotificationMessage>>,
    script: Mutex<VecDeque<ScriptedDelivery>>,
}

impl InMemoryDeliveryChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
        }
    }

    /// Messages accepted so far, in delivery order
    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Queue an outcome for the next delivery; unscripted deliveries accept
    pub fn push_script(&self, outcome: ScriptedDelivery) {
        self.script.lock().unwrap().push_back(outcome);
    }
}

#[async_trait::async_trait]
impl IDeliveryChannel for InMemoryDeliveryChannel {
    async fn deliver(
        &self,
        message: &NotificationMessage,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedDelivery::Accept);
        match outcome {
            ScriptedDelivery::Accept => {
                self.sent.lock().unwrap().push(message.clone());
                Ok(DeliveryReceipt::Accepted)
            }
            ScriptedDelivery::Reject(reason) => Ok(DeliveryReceipt::Rejected { reason }),
            ScriptedDelivery::Transient(reason) => Err(DeliveryError::Transient(reason)),
        }
    }
}
