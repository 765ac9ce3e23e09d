//! Client for the internal communication service.
//!
//! Only order-created events are sent. Calls are bounded by the configured
//! timeout; failures are returned to the outbox dispatcher, never to API
//! callers.

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::NotifierConfig;

/// Path of the order-created hook, relative to the service base URL.
const ORDER_CREATED_PATH: &str = "events/order-created";

/// Errors that can occur when notifying the internal service.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Request failed: timeout, connection refused, DNS.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Base URL cannot carry the event path.
    #[error("invalid notifier URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// HTTP client for the internal communication service.
#[derive(Debug, Clone)]
pub struct NotificationClient {
    client: reqwest::Client,
    order_created_url: Url,
}

impl NotificationClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the base URL cannot
    /// be joined with the event path.
    pub fn new(config: &NotifierConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            order_created_url: endpoint(&config.base_url)?,
        })
    }

    /// The URL order-created events are posted to.
    #[must_use]
    pub const fn order_created_url(&self) -> &Url {
        &self.order_created_url
    }

    /// Post an order-created event.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Http` if the request fails or times out and
    /// `NotifyError::Api` for non-2xx responses.
    pub async fn notify_order_created<T: Serialize + Sync>(
        &self,
        payload: &T,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.order_created_url.clone())
            .json(payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Join the event path onto `base`, keeping any path prefix `base` has.
fn endpoint(base: &Url) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(ORDER_CREATED_PATH)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joining() {
        let cases = [
            ("http://localhost:9000", "http://localhost:9000/events/order-created"),
            ("http://localhost:9000/", "http://localhost:9000/events/order-created"),
            (
                "http://comm.internal/api/v1",
                "http://comm.internal/api/v1/events/order-created",
            ),
        ];
        for (base, expected) in cases {
            let url = endpoint(&Url::parse(base).unwrap()).unwrap();
            assert_eq!(url.as_str(), expected);
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_http_error() {
        let client = NotificationClient::new(&NotifierConfig {
            base_url: Url::parse("http://127.0.0.1:1").unwrap(),
            timeout: std::time::Duration::from_millis(500),
        })
        .unwrap();

        let err = client
            .notify_order_created(&serde_json::json!({"orderId": 1, "restaurantId": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
    }
}
