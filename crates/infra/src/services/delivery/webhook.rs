use super::{DeliveryError, DeliveryReceipt, IDeliveryChannel, NotificationMessage};
use crate::retry::RetryPolicy;
use std::time::Duration;
use tracing::warn;

const WEBHOOK_KEY_HEADER: &str = "classwatch-webhook-key";

/// Delivery channel that POSTs every accepted notification to a webhook,
/// authenticated with a shared key header. 2xx counts as accepted, 4xx as
/// rejected, anything else is transient and retried per the policy.
pub struct WebhookDeliveryChannel {
    url: String,
    key: String,
    retry: RetryPolicy,
    timeout: Duration,
    http: reqwest::Client,
}

impl WebhookDeliveryChannel {
    pub fn new(url: String, key: String, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            url,
            key,
            retry,
            timeout,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl IDeliveryChannel for WebhookDeliveryChannel {
    async fn deliver(
        &self,
        message: &NotificationMessage,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let mut attempt = 0;
        loop {
            let sent = self
                .http
                .post(&self.url)
                .header(WEBHOOK_KEY_HEADER, &self.key)
                .timeout(self.timeout)
                .json(message)
                .send()
                .await;

            let retryable = match sent {
                Ok(response) if response.status().is_success() => {
                    return Ok(DeliveryReceipt::Accepted)
                }
                Ok(response) if response.status().is_client_error() => {
                    return Ok(DeliveryReceipt::Rejected {
                        reason: format!("delivery channel returned {}", response.status()),
                    })
                }
                Ok(response) => format!("delivery channel returned {}", response.status()),
                Err(err) => format!("delivery channel unreachable: {}", err),
            };
            if self.retry.is_last(attempt) {
                return Err(DeliveryError::Transient(format!(
                    "{} after {} attempts",
                    retryable,
                    attempt + 1
                )));
            }
            warn!("{}, retrying", retryable);
            tokio::time::sleep(self.retry.delay_for(attempt)).await;
            attempt += 1;
        }
    }
}
