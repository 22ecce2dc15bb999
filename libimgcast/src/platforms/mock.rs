//! Mock adapter for testing
//!
//! A scriptable [`PlatformAdapter`] that records every call and can be told to
//! fail at either pipeline step, to fail only for particular images, to enforce
//! a caption limit, or to stall for a while. Clones share their call log, so a
//! test can keep one clone while the scheduler owns the other.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{DispatchError, Result};
use crate::platforms::{Credentials, PlatformAdapter};
use crate::types::MediaHandle;

/// Configuration for mock adapter behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Adapter name (e.g., "mock-mastodon")
    pub name: String,

    /// Error returned from every `upload_media` call
    pub upload_error: Option<DispatchError>,

    /// Error returned from every `publish` call
    pub publish_error: Option<DispatchError>,

    /// Image URLs whose upload fails with `MediaFetch`
    pub failing_images: Vec<String>,

    /// Caption limit reported to the scheduler
    pub caption_limit: Option<usize>,

    /// Delay before completing each call (simulates network latency)
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            upload_error: None,
            publish_error: None,
            failing_images: Vec::new(),
            caption_limit: None,
            delay: Duration::from_millis(0),
        }
    }
}

/// A recorded adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Upload {
        host: String,
        image_url: String,
    },
    Publish {
        host: String,
        caption: String,
        media: MediaHandle,
    },
}

#[derive(Clone)]
pub struct MockAdapter {
    config: MockConfig,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An adapter that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// An adapter whose upload step fails
    pub fn upload_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            upload_error: Some(DispatchError::MediaUpload(error.to_string())),
            ..Default::default()
        })
    }

    /// An adapter whose publish step fails
    pub fn publish_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            publish_error: Some(DispatchError::Publish(error.to_string())),
            ..Default::default()
        })
    }

    /// An adapter that cannot fetch the given image but handles every other one
    pub fn failing_image(name: &str, image_url: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            failing_images: vec![image_url.to_string()],
            ..Default::default()
        })
    }

    /// An adapter with a hard caption limit
    pub fn with_limit(name: &str, limit: usize) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            caption_limit: Some(limit),
            ..Default::default()
        })
    }

    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock_calls().clone()
    }

    pub fn upload_call_count(&self) -> usize {
        self.lock_calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Upload { .. }))
            .count()
    }

    pub fn publish_call_count(&self) -> usize {
        self.lock_calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Publish { .. }))
            .count()
    }

    /// Captions passed to `publish`, in call order
    pub fn published_captions(&self) -> Vec<String> {
        self.lock_calls()
            .iter()
            .filter_map(|c| match c {
                MockCall::Publish { caption, .. } => Some(caption.clone()),
                MockCall::Upload { .. } => None,
            })
            .collect()
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn caption_limit(&self) -> Option<usize> {
        self.config.caption_limit
    }

    async fn upload_media(
        &self,
        credentials: &Credentials,
        image_url: &str,
    ) -> Result<MediaHandle> {
        let upload_number = {
            let mut calls = self.lock_calls();
            calls.push(MockCall::Upload {
                host: credentials.host.clone(),
                image_url: image_url.to_string(),
            });
            calls
                .iter()
                .filter(|c| matches!(c, MockCall::Upload { .. }))
                .count()
        };

        self.simulate_latency().await;

        if self.config.failing_images.iter().any(|url| url == image_url) {
            return Err(
                DispatchError::MediaFetch(format!("mock fetch of {} failed", image_url)).into(),
            );
        }

        if let Some(error) = &self.config.upload_error {
            return Err(error.clone().into());
        }

        Ok(MediaHandle::MediaId(format!(
            "{}-media-{}",
            self.config.name, upload_number
        )))
    }

    async fn publish(
        &self,
        credentials: &Credentials,
        caption: &str,
        media: &MediaHandle,
    ) -> Result<()> {
        self.lock_calls().push(MockCall::Publish {
            host: credentials.host.clone(),
            caption: caption.to_string(),
            media: media.clone(),
        });

        self.simulate_latency().await;

        match &self.config.publish_error {
            Some(error) => Err(error.clone().into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImgcastError;

    fn credentials() -> Credentials {
        Credentials::new("https://mock.host", Some("token".to_string()))
    }

    #[tokio::test]
    async fn test_mock_success() {
        let adapter = MockAdapter::success("test");
        assert_eq!(adapter.name(), "test");
        assert_eq!(adapter.caption_limit(), None);

        let media = adapter
            .upload_media(&credentials(), "http://image.host/a.jpg")
            .await
            .unwrap();
        assert_eq!(media, MediaHandle::MediaId("test-media-1".to_string()));

        adapter.publish(&credentials(), "Hello", &media).await.unwrap();

        assert_eq!(adapter.upload_call_count(), 1);
        assert_eq!(adapter.publish_call_count(), 1);
        assert_eq!(adapter.published_captions(), vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_mock_clones_share_call_log() {
        let adapter = MockAdapter::success("test");
        let observer = adapter.clone();

        adapter
            .upload_media(&credentials(), "http://image.host/a.jpg")
            .await
            .unwrap();

        assert_eq!(
            observer.calls(),
            vec![MockCall::Upload {
                host: "https://mock.host".to_string(),
                image_url: "http://image.host/a.jpg".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_mock_upload_failure() {
        let adapter = MockAdapter::upload_failure("test", "quota exceeded");
        let err = adapter
            .upload_media(&credentials(), "http://image.host/a.jpg")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ImgcastError::Dispatch(DispatchError::MediaUpload(ref m)) if m == "quota exceeded"
        ));
    }

    #[tokio::test]
    async fn test_mock_publish_failure() {
        let adapter = MockAdapter::publish_failure("test", "Network error");
        let media = adapter
            .upload_media(&credentials(), "http://image.host/a.jpg")
            .await
            .unwrap();

        let err = adapter
            .publish(&credentials(), "Hello", &media)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Network error"));
        assert_eq!(adapter.publish_call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failing_image_only() {
        let adapter = MockAdapter::failing_image("test", "http://image.host/broken.jpg");

        assert!(adapter
            .upload_media(&credentials(), "http://image.host/broken.jpg")
            .await
            .is_err());
        assert!(adapter
            .upload_media(&credentials(), "http://image.host/fine.jpg")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let adapter = MockAdapter::with_delay("test", Duration::from_millis(50));

        let start = std::time::Instant::now();
        adapter
            .upload_media(&credentials(), "http://image.host/a.jpg")
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
