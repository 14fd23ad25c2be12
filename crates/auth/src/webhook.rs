//! Signing of outbound webhook deliveries to partner platforms.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::signature::{SignedHeaders, sign_request};

/// Signs webhook bodies with a partner's shared secret, producing the same
/// headers partners use when calling in.
#[derive(Debug, Clone)]
pub struct WebhookSigner {
    platform_id: String,
    secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedWebhook {
    pub path: String,
    pub body: String,
    pub headers: SignedHeaders,
}

impl WebhookSigner {
    pub fn new(platform_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
            secret: secret.into(),
        }
    }

    pub fn sign(&self, path: &str, body: &str, now: DateTime<Utc>) -> SignedWebhook {
        SignedWebhook {
            path: path.to_string(),
            body: body.to_string(),
            headers: sign_request(&self.platform_id, self.secret.as_bytes(), "POST", path, body, now),
        }
    }

    pub fn sign_json<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
        now: DateTime<Utc>,
    ) -> Result<SignedWebhook, serde_json::Error> {
        let body = serde_json::to_string(payload)?;
        Ok(self.sign(path, &body, now))
    }

    /// Payload for `POST /federation/webhooks/test`.
    pub fn test_delivery(&self, now: DateTime<Utc>) -> Result<SignedWebhook, serde_json::Error> {
        self.sign_json(
            "/federation/webhooks/test",
            &serde_json::json!({
                "event": "webhook.test",
                "platform_id": self.platform_id,
                "sent_at": now,
            }),
            now,
        )
    }
}
