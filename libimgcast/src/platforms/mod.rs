//! Platform adapters
//!
//! Every target platform is reached through [`PlatformAdapter`], a two-step
//! capability: `upload_media` turns an image URL into a [`MediaHandle`], and
//! `publish` posts a caption together with that handle. Adapters come in three
//! flavours:
//!
//! - token-based instances ([`mastodon::MastodonAdapter`]): bearer token, media
//!   pre-upload, hard caption limit
//! - session-based services ([`bluesky::BlueskyAdapter`]): handle + password
//!   exchanged for a session on every call, blob pre-upload
//! - webhook relays ([`webhook::WebhookAdapter`]): one JSON POST carrying
//!   caption and image URL, no pre-upload, no token
//!
//! An [`AdapterSet`] maps each [`Context`] to its adapter and is handed to the
//! scheduler explicitly, so tests swap in [`mock::MockAdapter`] instead of
//! flipping a global switch.
//!
//! # Examples
//!
//! ```no_run
//! use libimgcast::platforms::{AdapterSet, Credentials};
//! use libimgcast::types::Context;
//! use libimgcast::Config;
//!
//! # async fn example() -> libimgcast::Result<()> {
//! let adapters = AdapterSet::live(&Config::default_config())?;
//! let mastodon = adapters.get(Context::Mastodon).expect("registered");
//!
//! let credentials = Credentials::new("https://mastodon.social", Some("token".to_string()));
//! let media = mastodon
//!     .upload_media(&credentials, "https://example.com/cat.jpg")
//!     .await?;
//! mastodon.publish(&credentials, "A cat.", &media).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{ConfigError, DispatchError, Result};
use crate::types::{Context, MediaHandle, ScheduledPost};

pub mod bluesky;
pub mod mastodon;
pub mod webhook;

// Mock adapter is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Two-step publishing capability implemented once per platform
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Lowercase platform identifier used in logs
    fn name(&self) -> &str;

    /// Hard caption limit enforced by the platform's publish API
    ///
    /// Captions for adapters returning `Some` are shortened before publishing;
    /// `None` means the caption is forwarded verbatim.
    fn caption_limit(&self) -> Option<usize> {
        None
    }

    /// Make the image at `image_url` available to the platform
    ///
    /// # Errors
    ///
    /// - `DispatchError::MediaFetch` if the source image cannot be downloaded
    /// - `DispatchError::MediaUpload` if authentication or the upload fails
    async fn upload_media(&self, credentials: &Credentials, image_url: &str)
        -> Result<MediaHandle>;

    /// Publish `caption` with the previously uploaded media
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Publish` if authentication or the publish call fails,
    /// or if `media` is not a handle this adapter produced.
    async fn publish(
        &self,
        credentials: &Credentials,
        caption: &str,
        media: &MediaHandle,
    ) -> Result<()>;
}

/// Where and as whom to post
///
/// For token-based instances `host` is the instance URL and `token` the bearer
/// token. For session-based services `host` is the account handle and `token`
/// the app password. Webhook relays use `host` as the endpoint and ignore `token`.
#[derive(Debug)]
pub struct Credentials {
    pub host: String,
    token: Option<SecretString>,
}

impl Credentials {
    pub fn new(host: impl Into<String>, token: Option<String>) -> Self {
        Self {
            host: host.into(),
            token: token.map(SecretString::from),
        }
    }

    pub fn from_post(post: &ScheduledPost) -> Self {
        Self::new(post.posting_host.clone(), post.posting_token.clone())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.expose_secret())
    }

    /// The token, or `into_error` when absent or blank
    pub(crate) fn require_token(
        &self,
        platform: &str,
        into_error: fn(String) -> DispatchError,
    ) -> std::result::Result<&str, DispatchError> {
        match self.token() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(into_error(format!(
                "{} requires a posting token for {}",
                platform, self.host
            ))),
        }
    }
}

/// Adapters keyed by platform context
#[derive(Default)]
pub struct AdapterSet {
    adapters: HashMap<Context, Box<dyn PlatformAdapter>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` for `context`, replacing any previous one
    pub fn with(mut self, context: Context, adapter: impl PlatformAdapter + 'static) -> Self {
        self.insert(context, Box::new(adapter));
        self
    }

    pub fn insert(&mut self, context: Context, adapter: Box<dyn PlatformAdapter>) {
        self.adapters.insert(context, adapter);
    }

    pub fn get(&self, context: Context) -> Option<&dyn PlatformAdapter> {
        self.adapters.get(&context).map(|adapter| adapter.as_ref())
    }

    /// The production adapters for all four contexts, sharing one HTTP client
    pub fn live(config: &Config) -> Result<Self> {
        let client = build_http_client(config.scheduling.request_timeout)?;

        Ok(Self::new()
            .with(
                Context::Mastodon,
                mastodon::MastodonAdapter::new(client.clone(), config.caption.max_length),
            )
            .with(
                Context::Bluesky,
                bluesky::BlueskyAdapter::new(
                    client.clone(),
                    config.bluesky.service.clone(),
                    config.bluesky.max_length,
                ),
            )
            .with(
                Context::Twitter,
                webhook::WebhookAdapter::new(client.clone(), "twitter"),
            )
            .with(
                Context::Instagram,
                webhook::WebhookAdapter::new(client, "instagram"),
            ))
    }
}

/// Build the shared HTTP client, with an optional per-request deadline in seconds
pub fn build_http_client(request_timeout: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));

    if let Some(seconds) = request_timeout {
        builder = builder.timeout(Duration::from_secs(seconds));
    }

    // Building only fails when the TLS backend cannot initialise
    builder
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()).into())
}

/// A downloaded source image
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Download the image at `image_url`
///
/// The content type falls back to `application/octet-stream` when the server
/// does not send one.
pub async fn fetch_image(
    client: &reqwest::Client,
    image_url: &str,
) -> std::result::Result<FetchedImage, DispatchError> {
    let response = client
        .get(image_url)
        .send()
        .await
        .map_err(|e| DispatchError::MediaFetch(format!("GET {}: {}", image_url, e)))?;

    let response = check_status(response, "image host", "fetch", DispatchError::MediaFetch).await?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DispatchError::MediaFetch(format!("reading {}: {}", image_url, e)))?;

    debug!(
        image_url,
        content_type = %content_type,
        size = bytes.len(),
        "fetched image"
    );

    Ok(FetchedImage {
        bytes: bytes.to_vec(),
        content_type,
    })
}

/// Pass successful responses through, turn anything else into `into_error`
pub(crate) async fn check_status(
    response: reqwest::Response,
    platform: &str,
    operation: &str,
    into_error: fn(String) -> DispatchError,
) -> std::result::Result<reqwest::Response, DispatchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(into_error(describe_failure(
        platform,
        operation,
        status.as_u16(),
        &body,
    )))
}

/// Human-readable description of a failed platform call, with a hint by status
pub(crate) fn describe_failure(platform: &str, operation: &str, status: u16, body: &str) -> String {
    let hint = match status {
        401 | 403 => {
            " Suggestion: Verify the posting token or password is valid and has not expired."
        }
        422 => " Suggestion: Check that the caption and image meet the platform's requirements.",
        429 => " Suggestion: Rate limit exceeded; the post stays queued for the next sweep.",
        500..=599 => {
            " Suggestion: The service may be experiencing issues; the post stays queued for the next sweep."
        }
        _ => "",
    };

    format!(
        "{} {} failed with HTTP {}: {}{}",
        platform,
        operation,
        status,
        body.trim(),
        hint
    )
}
