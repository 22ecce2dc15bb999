//! Mastodon platform adapter
//!
//! Posts to Mastodon and other Fediverse servers implementing the Mastodon
//! client API (Pleroma, Akkoma, GoToSocial, ...). The instance URL and bearer
//! token come from each scheduled record, so one adapter serves any number of
//! accounts.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::platforms::{check_status, fetch_image, Credentials, PlatformAdapter};
use crate::types::MediaHandle;

/// Token-based instance adapter
pub struct MastodonAdapter {
    client: reqwest::Client,
    /// Character limit for statuses
    caption_limit: usize,
}

#[derive(Debug, Deserialize)]
struct MediaAttachment {
    id: String,
}

impl MastodonAdapter {
    /// Create a new adapter
    ///
    /// # Arguments
    ///
    /// * `client` - Shared HTTP client
    /// * `caption_limit` - Maximum status length; 500 on stock Mastodon
    pub fn new(client: reqwest::Client, caption_limit: usize) -> Self {
        Self {
            client,
            caption_limit,
        }
    }
}

/// Normalise an instance host into a base URL without trailing slash
///
/// Hosts given without a scheme are assumed to be `https://`.
pub fn instance_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl PlatformAdapter for MastodonAdapter {
    fn name(&self) -> &str {
        "mastodon"
    }

    fn caption_limit(&self) -> Option<usize> {
        Some(self.caption_limit)
    }

    async fn upload_media(
        &self,
        credentials: &Credentials,
        image_url: &str,
    ) -> Result<MediaHandle> {
        let token = credentials.require_token(self.name(), DispatchError::MediaUpload)?;
        let image = fetch_image(&self.client, image_url).await?;

        let part = Part::bytes(image.bytes)
            .file_name("image")
            .mime_str(&image.content_type)
            .map_err(|e| {
                DispatchError::MediaUpload(format!(
                    "invalid content type '{}': {}",
                    image.content_type, e
                ))
            })?;
        let form = Form::new().part("file", part);

        let url = format!("{}/api/v2/media", instance_url(&credentials.host));
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DispatchError::MediaUpload(format!("POST {}: {}", url, e)))?;

        let response =
            check_status(response, "mastodon", "media upload", DispatchError::MediaUpload).await?;

        let attachment: MediaAttachment = response.json().await.map_err(|e| {
            DispatchError::MediaUpload(format!("unexpected media upload response: {}", e))
        })?;

        info!(media_id = %attachment.id, "uploaded image to mastodon instance");
        Ok(MediaHandle::MediaId(attachment.id))
    }

    async fn publish(
        &self,
        credentials: &Credentials,
        caption: &str,
        media: &MediaHandle,
    ) -> Result<()> {
        let MediaHandle::MediaId(media_id) = media else {
            return Err(DispatchError::Publish(format!(
                "mastodon cannot publish media handle {:?}",
                media
            ))
            .into());
        };
        let token = credentials.require_token(self.name(), DispatchError::Publish)?;

        let url = format!("{}/api/v1/statuses", instance_url(&credentials.host));
        debug!(url = %url, media_id = %media_id, "updating status on mastodon instance");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .form(&[("status", caption), ("media_ids[]", media_id.as_str())])
            .send()
            .await
            .map_err(|e| DispatchError::Publish(format!("POST {}: {}", url, e)))?;

        check_status(response, "mastodon", "status update", DispatchError::Publish).await?;

        info!("updated mastodon status");
        Ok(())
    }
}
