//! Bluesky platform adapter
//!
//! Talks XRPC to an AT Protocol PDS. Each call opens a fresh session from the
//! handle and app password stored with the record; sessions are never cached.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::platforms::{check_status, fetch_image, Credentials, PlatformAdapter};
use crate::types::MediaHandle;

const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Session-based adapter
pub struct BlueskyAdapter {
    client: reqwest::Client,
    /// PDS base URL (e.g., "https://bsky.social")
    service: String,
    caption_limit: usize,
}

/// Session returned by `com.atproto.server.createSession`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadBlobResponse {
    blob: Blob,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    #[serde(rename = "ref")]
    reference: BlobLink,
    mime_type: String,
    size: u64,
}

#[derive(Debug, Deserialize)]
struct BlobLink {
    #[serde(rename = "$link")]
    link: String,
}

impl BlueskyAdapter {
    pub fn new(client: reqwest::Client, service: impl Into<String>, caption_limit: usize) -> Self {
        Self {
            client,
            service: service.into().trim_end_matches('/').to_string(),
            caption_limit,
        }
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }

    /// Exchange handle + app password for a session
    ///
    /// Failures are reported through `into_error` so they are attributed to the
    /// pipeline step that needed the session.
    async fn create_session(
        &self,
        credentials: &Credentials,
        into_error: fn(String) -> DispatchError,
    ) -> std::result::Result<Session, DispatchError> {
        let password = credentials.require_token(self.name(), into_error)?;
        let url = self.xrpc_url("com.atproto.server.createSession");

        debug!(handle = %credentials.host, "obtaining bluesky session");

        let response = self
            .client
            .post(&url)
            .json(&SessionRequest {
                identifier: &credentials.host,
                password,
            })
            .send()
            .await
            .map_err(|e| into_error(format!("POST {}: {}", url, e)))?;

        let response = check_status(response, "bluesky", "createSession", into_error).await?;

        response
            .json::<Session>()
            .await
            .map_err(|e| into_error(format!("unexpected session response: {}", e)))
    }
}

/// Build the `app.bsky.feed.post` record embedding one uploaded image
pub fn post_record(
    caption: &str,
    link: &str,
    mime_type: &str,
    size: u64,
    created_at: DateTime<Utc>,
) -> Value {
    json!({
        "$type": POST_COLLECTION,
        "text": caption,
        "createdAt": created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "embed": {
            "$type": "app.bsky.embed.images",
            "images": [
                {
                    "alt": "",
                    "image": {
                        "$type": "blob",
                        "ref": { "$link": link },
                        "mimeType": mime_type,
                        "size": size
                    }
                }
            ]
        }
    })
}

#[async_trait]
impl PlatformAdapter for BlueskyAdapter {
    fn name(&self) -> &str {
        "bluesky"
    }

    fn caption_limit(&self) -> Option<usize> {
        Some(self.caption_limit)
    }

    async fn upload_media(
        &self,
        credentials: &Credentials,
        image_url: &str,
    ) -> Result<MediaHandle> {
        let session = self
            .create_session(credentials, DispatchError::MediaUpload)
            .await?;
        let image = fetch_image(&self.client, image_url).await?;

        let url = self.xrpc_url("com.atproto.repo.uploadBlob");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_jwt)
            .header(reqwest::header::CONTENT_TYPE, image.content_type.as_str())
            .body(image.bytes)
            .send()
            .await
            .map_err(|e| DispatchError::MediaUpload(format!("POST {}: {}", url, e)))?;

        let response =
            check_status(response, "bluesky", "uploadBlob", DispatchError::MediaUpload).await?;

        let uploaded: UploadBlobResponse = response.json().await.map_err(|e| {
            DispatchError::MediaUpload(format!("unexpected uploadBlob response: {}", e))
        })?;

        info!(link = %uploaded.blob.reference.link, "uploaded image to bluesky");

        Ok(MediaHandle::Blob {
            link: uploaded.blob.reference.link,
            mime_type: uploaded.blob.mime_type,
            size: uploaded.blob.size,
        })
    }

    async fn publish(
        &self,
        credentials: &Credentials,
        caption: &str,
        media: &MediaHandle,
    ) -> Result<()> {
        let MediaHandle::Blob {
            link,
            mime_type,
            size,
        } = media
        else {
            return Err(DispatchError::Publish(format!(
                "bluesky cannot publish media handle {:?}",
                media
            ))
            .into());
        };

        let session = self
            .create_session(credentials, DispatchError::Publish)
            .await?;

        let url = self.xrpc_url("com.atproto.repo.createRecord");
        let body = json!({
            "repo": session.did,
            "collection": POST_COLLECTION,
            "record": post_record(caption, link, mime_type, *size, Utc::now()),
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_jwt)
            .json(&body)
            .send()
            .await
            .map_err(|e| DispatchError::Publish(format!("POST {}: {}", url, e)))?;

        check_status(response, "bluesky", "createRecord", DispatchError::Publish).await?;

        info!("updated bluesky status");
        Ok(())
    }
}
