//! JSON webhook delivery

use std::time::Duration;

use async_trait::async_trait;

use super::{Notification, NotificationSink, NotifyError};
use crate::config::defaults::WEBHOOK_TIMEOUT_SECS;

/// POSTs each notification as JSON to a fixed URL.
#[derive(Clone)]
pub struct WebhookSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            url: url.trim().to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let resp = self.http.post(&self.url).json(notification).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(resp.status()))
        }
    }
}
