//! Core types for Imgcast

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ImgcastError;

/// Target platform of a queued post
///
/// Doubles as the partition key the store indexes records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Mastodon,
    Twitter,
    Instagram,
    Bluesky,
}

impl Context {
    /// Order in which a sweep visits the platform contexts
    pub const SWEEP_ORDER: [Context; 4] = [
        Context::Bluesky,
        Context::Mastodon,
        Context::Twitter,
        Context::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Context::Mastodon => "mastodon",
            Context::Twitter => "twitter",
            Context::Instagram => "instagram",
            Context::Bluesky => "bluesky",
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Context {
    type Err = ImgcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mastodon" => Ok(Context::Mastodon),
            "twitter" => Ok(Context::Twitter),
            "instagram" => Ok(Context::Instagram),
            "bluesky" => Ok(Context::Bluesky),
            other => Err(ImgcastError::UnknownContext(other.to_string())),
        }
    }
}

/// A post waiting in the schedule store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPost {
    pub id: String,
    pub context: Context,
    pub posting_host: String,
    pub posting_token: Option<String>,
    pub caption: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    /// Unix seconds
    pub posting_time: i64,
}

impl ScheduledPost {
    /// Build a new record with a freshly generated id
    pub fn new(post: NewPost) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context: post.context,
            posting_host: post.posting_host,
            posting_token: post.posting_token,
            caption: post.caption,
            image_url: post.image_url,
            posting_time: post.posting_time,
        }
    }

    pub fn is_due(&self, now: i64) -> bool {
        self.posting_time <= now
    }
}

/// Fields submitted when enqueueing a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub context: Context,
    pub posting_host: String,
    pub posting_token: Option<String>,
    pub caption: String,
    pub image_url: String,
    pub posting_time: i64,
}

/// Persisted row shape of a scheduled post
///
/// Every column is textual, including the posting time, which is parsed back
/// into a [`ScheduledPost`] before the engine compares it against the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRecord {
    pub id: String,
    pub context: String,
    pub posting_host: String,
    pub posting_token: Option<String>,
    pub caption: String,
    pub image_url: String,
    pub posting_time: String,
}

impl From<&ScheduledPost> for ScheduleRecord {
    fn from(post: &ScheduledPost) -> Self {
        Self {
            id: post.id.clone(),
            context: post.context.to_string(),
            posting_host: post.posting_host.clone(),
            posting_token: post.posting_token.clone(),
            caption: post.caption.clone(),
            image_url: post.image_url.clone(),
            posting_time: post.posting_time.to_string(),
        }
    }
}

impl TryFrom<ScheduleRecord> for ScheduledPost {
    type Error = ImgcastError;

    fn try_from(record: ScheduleRecord) -> Result<Self, Self::Error> {
        let context = record.context.parse::<Context>()?;
        let posting_time = record.posting_time.trim().parse::<i64>().map_err(|e| {
            ImgcastError::InvalidInput(format!(
                "Record {} has unparseable posting time '{}': {}",
                record.id, record.posting_time, e
            ))
        })?;

        Ok(Self {
            id: record.id,
            context,
            posting_host: record.posting_host,
            posting_token: record.posting_token,
            caption: record.caption,
            image_url: record.image_url,
            posting_time,
        })
    }
}

/// Aggregate outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub successful_count: usize,
    pub failed_count: usize,
}

/// Opaque reference to an uploaded image, produced by `upload_media`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaHandle {
    /// Media attachment id on a token-based instance
    MediaId(String),
    /// Content-addressed blob on a session-based service
    Blob {
        link: String,
        mime_type: String,
        size: u64,
    },
    /// Relays that fetch the image themselves get the source URL
    ImageUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post() -> ScheduledPost {
        ScheduledPost::new(NewPost {
            context: Context::Mastodon,
            posting_host: "https://mastodon.social".to_string(),
            posting_token: Some("1234567890".to_string()),
            caption: "This is a test caption".to_string(),
            image_url: "http://image.host/image.jpg".to_string(),
            posting_time: 1_700_000_000,
        })
    }

    #[test]
    fn test_context_from_str() {
        assert_eq!("mastodon".parse::<Context>().unwrap(), Context::Mastodon);
        assert_eq!("twitter".parse::<Context>().unwrap(), Context::Twitter);
        assert_eq!("instagram".parse::<Context>().unwrap(), Context::Instagram);
        assert_eq!("bluesky".parse::<Context>().unwrap(), Context::Bluesky);
    }

    #[test]
    fn test_context_from_str_rejects_schedule() {
        // "schedule" is a control value, never a storable context
        let err = "schedule".parse::<Context>().unwrap_err();
        assert!(matches!(err, ImgcastError::UnknownContext(ref c) if c == "schedule"));
    }

    #[test]
    fn test_sweep_order() {
        assert_eq!(
            Context::SWEEP_ORDER,
            [
                Context::Bluesky,
                Context::Mastodon,
                Context::Twitter,
                Context::Instagram
            ]
        );
    }

    #[test]
    fn test_new_posts_get_unique_ids() {
        let a = sample_post();
        let b = sample_post();
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_is_due() {
        let post = sample_post();
        assert!(post.is_due(1_700_000_000));
        assert!(post.is_due(1_700_000_001));
        assert!(!post.is_due(1_699_999_999));
    }

    #[test]
    fn test_record_stores_time_as_text() {
        let post = sample_post();
        let record = ScheduleRecord::from(&post);
        assert_eq!(record.posting_time, "1700000000");
        assert_eq!(record.context, "mastodon");

        let parsed = ScheduledPost::try_from(record).unwrap();
        assert_eq!(parsed, post);
    }

    #[test]
    fn test_record_with_bad_time_is_rejected() {
        let mut record = ScheduleRecord::from(&sample_post());
        record.posting_time = "soon".to_string();
        let err = ScheduledPost::try_from(record).unwrap_err();
        assert!(matches!(err, ImgcastError::InvalidInput(_)));
    }

    #[test]
    fn test_sweep_result_json_shape() {
        let result = SweepResult {
            successful_count: 2,
            failed_count: 1,
        };
        let json = serde_json::to_value(result).unwrap();
        assert_eq!(json["successfulCount"], 2);
        assert_eq!(json["failedCount"], 1);
    }
}
