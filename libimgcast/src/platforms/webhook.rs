//! Webhook relay adapter
//!
//! Bridges to platforms without a direct API in this design (Twitter and
//! Instagram through IFTTT applets). The relay fetches the image itself, so
//! there is no pre-upload step: `upload_media` hands the image URL straight
//! back, and `publish` makes a single JSON POST to the record's posting host.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::{DispatchError, Result};
use crate::platforms::{check_status, Credentials, PlatformAdapter};
use crate::types::MediaHandle;

pub struct WebhookAdapter {
    client: reqwest::Client,
    name: String,
}

/// IFTTT maker payload
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct WebhookPayload<'a> {
    pub value1: &'a str,
    pub value2: &'a str,
    pub value3: &'a str,
}

impl WebhookAdapter {
    /// Create a relay adapter; `name` identifies the bridged platform in logs
    pub fn new(client: reqwest::Client, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for WebhookAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload_media(
        &self,
        _credentials: &Credentials,
        image_url: &str,
    ) -> Result<MediaHandle> {
        Ok(MediaHandle::ImageUrl(image_url.to_string()))
    }

    async fn publish(
        &self,
        credentials: &Credentials,
        caption: &str,
        media: &MediaHandle,
    ) -> Result<()> {
        let MediaHandle::ImageUrl(image_url) = media else {
            return Err(DispatchError::Publish(format!(
                "{} relay cannot publish media handle {:?}",
                self.name, media
            ))
            .into());
        };

        let payload = WebhookPayload {
            value1: caption,
            value2: image_url,
            value3: "",
        };

        let response = self
            .client
            .post(&credentials.host)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                DispatchError::Publish(format!("{} relay request failed: {}", self.name, e))
            })?;

        check_status(response, &self.name, "relay", DispatchError::Publish).await?;

        info!(platform = %self.name, "updated status via webhook relay");
        Ok(())
    }
}
