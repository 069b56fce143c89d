use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use kinetic_types::api::PushKeys;

use crate::format::PushPayload;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The push service answered with a non-success status.
    #[error("push service rejected delivery with status {0}")]
    Rejected(u16),

    #[error("push transport failed: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// 404/410 mean the subscription will never accept deliveries again.
    pub fn is_permanent(&self) -> bool {
        matches!(self, DeliveryError::Rejected(404 | 410))
    }
}

/// One device registration, as handed to the transport.
#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(&self, subscription: &Subscription, payload: &PushPayload) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    subscription: &'a Subscription,
    payload: &'a PushPayload,
}

/// Hands deliveries to a web-push relay that owns the VAPID keys and payload
/// encryption, and passes the push service's status code back.
pub struct RelayPushTransport {
    relay_url: String,
    http_client: reqwest::Client,
}

impl RelayPushTransport {
    pub fn new(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PushTransport for RelayPushTransport {
    async fn deliver(&self, subscription: &Subscription, payload: &PushPayload) -> Result<(), DeliveryError> {
        let response = self
            .http_client
            .post(&self.relay_url)
            .json(&RelayRequest { subscription, payload })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected(status.as_u16()))
        }
    }
}
