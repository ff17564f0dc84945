use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::PushGatewayConfig;
use crate::error::{AppError, PushError};
use crate::models::{PushSubscription, ReminderType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub reminder_id: String,
    #[serde(rename = "type")]
    pub reminder_type: ReminderType,
    pub due_date: String,
    pub url: String,
}

/// What the service worker on the client receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: NotificationData,
    pub timestamp: i64,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError>;
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    subscription: &'a PushSubscription,
    payload: &'a NotificationPayload,
}

/// Hands notifications to a Web Push gateway over HTTP. The gateway owns the
/// VAPID keys and payload encryption and relays the push service's status.
pub struct HttpPushTransport {
    client: Client,
    config: PushGatewayConfig,
}

impl HttpPushTransport {
    pub fn new(config: PushGatewayConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .json(&GatewayRequest { subscription, payload });

        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| PushError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == StatusCode::GONE || status == StatusCode::NOT_FOUND {
            return Err(PushError::Gone { status: status.as_u16() });
        }

        let body = response.text().await.unwrap_or_default();
        Err(PushError::Rejected { status: status.as_u16(), body })
    }
}

/// Used when no gateway is configured. Every send fails transiently so
/// reminders stay unsent until a gateway is available.
pub struct NoopPushTransport;

#[async_trait]
impl PushTransport for NoopPushTransport {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        tracing::warn!(
            "push gateway not configured, dropping notification {:?} for {}",
            payload.title,
            subscription.endpoint
        );
        Err(PushError::Network("push gateway not configured".to_string()))
    }
}
