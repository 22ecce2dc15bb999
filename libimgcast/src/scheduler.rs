//! Scheduler engine
//!
//! Enqueues posts into a [`ScheduleStore`] and, on each sweep, dispatches every
//! record whose posting time has passed through the [`PlatformAdapter`]
//! registered for its context. Records are handled strictly one at a time:
//! a record is deleted only after it was published, and a failed record stays
//! queued for the next sweep.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::caption::CaptionProcessor;
use crate::config::Config;
use crate::error::{ImgcastError, Result};
use crate::platforms::{AdapterSet, Credentials, PlatformAdapter};
use crate::store::{ScheduleStore, SqliteScheduleStore};
use crate::types::{Context, NewPost, ScheduledPost, SweepResult};

/// Where a record is in its dispatch pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Pending,
    Uploading,
    Publishing,
    Done,
    Failed,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Pending => "pending",
            DispatchStage::Uploading => "uploading",
            DispatchStage::Publishing => "publishing",
            DispatchStage::Done => "done",
            DispatchStage::Failed => "failed",
        }
    }
}

/// Outcome of one record's pass through the pipeline
enum Outcome {
    Published,
    Failed,
}

pub struct SchedulerEngine {
    store: Arc<dyn ScheduleStore>,
    adapters: AdapterSet,
    captions: CaptionProcessor,
}

impl SchedulerEngine {
    /// Create an engine over an explicit store and adapter set
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use libimgcast::caption::CaptionProcessor;
    /// use libimgcast::platforms::{mock::MockAdapter, AdapterSet};
    /// use libimgcast::store::MemoryScheduleStore;
    /// use libimgcast::types::Context;
    /// use libimgcast::SchedulerEngine;
    ///
    /// let adapters = AdapterSet::new().with(Context::Twitter, MockAdapter::success("twitter"));
    /// let engine = SchedulerEngine::new(
    ///     Arc::new(MemoryScheduleStore::new()),
    ///     adapters,
    ///     CaptionProcessor::default(),
    /// );
    /// ```
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        adapters: AdapterSet,
        captions: CaptionProcessor,
    ) -> Self {
        Self {
            store,
            adapters,
            captions,
        }
    }

    /// Production engine: SQLite store at the configured path plus live adapters
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = SqliteScheduleStore::new(&config.database.path).await?;
        let adapters = AdapterSet::live(config)?;

        Ok(Self::new(
            Arc::new(store),
            adapters,
            CaptionProcessor::from_config(&config.caption),
        ))
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }

    /// Persist a new post and return its generated id
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Write` if the store rejects the record.
    pub async fn schedule(&self, post: NewPost) -> Result<String> {
        let post = ScheduledPost::new(post);
        self.store.put(&post).await?;

        info!(
            context = %post.context,
            id = %post.id,
            posting_time = post.posting_time,
            "scheduled post"
        );
        Ok(post.id)
    }

    /// Records queued under `context` (or every context), oldest posting time first
    ///
    /// Rows that cannot be parsed are skipped with a warning.
    pub async fn pending(&self, context: Option<Context>) -> Result<Vec<ScheduledPost>> {
        let contexts = match context {
            Some(context) => vec![context],
            None => Context::SWEEP_ORDER.to_vec(),
        };

        let mut posts = Vec::new();
        for context in contexts {
            posts.extend(self.load(context).await?);
        }
        posts.sort_by_key(|p| p.posting_time);
        Ok(posts)
    }

    /// Dispatch every record due at `now` (unix seconds)
    ///
    /// Contexts are swept in [`Context::SWEEP_ORDER`]. Per-record failures are
    /// logged and counted, never propagated. A store query failure skips that
    /// context; the remaining contexts are still swept and the first such error
    /// is returned once the sweep is over.
    pub async fn run_due(&self, now: i64) -> Result<SweepResult> {
        let mut result = SweepResult::default();
        let mut first_error: Option<ImgcastError> = None;

        info!(now, "running scheduler");

        for context in Context::SWEEP_ORDER {
            if let Err(e) = self.sweep_context(context, now, &mut result).await {
                error!(context = %context, error = %e, "failed to query scheduled posts");
                first_error.get_or_insert(e);
            }
        }

        info!(
            successful = result.successful_count,
            failed = result.failed_count,
            "scheduler run finished"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    async fn sweep_context(
        &self,
        context: Context,
        now: i64,
        result: &mut SweepResult,
    ) -> Result<()> {
        debug!(context = %context, "getting scheduled posts");

        let due: Vec<ScheduledPost> = self
            .load(context)
            .await?
            .into_iter()
            .filter(|post| post.is_due(now))
            .collect();

        if due.is_empty() {
            return Ok(());
        }

        let Some(adapter) = self.adapters.get(context) else {
            warn!(
                context = %context,
                count = due.len(),
                "no adapter registered, leaving due posts queued"
            );
            result.failed_count += due.len();
            return Ok(());
        };

        for post in &due {
            match self.dispatch(adapter, post).await {
                Outcome::Published => {
                    if let Err(e) = self.store.delete(&post.id).await {
                        // Published but still queued; the next sweep will post it again
                        error!(
                            context = %context,
                            id = %post.id,
                            error = %e,
                            "published post could not be removed from the schedule"
                        );
                    }
                    result.successful_count += 1;
                }
                Outcome::Failed => result.failed_count += 1,
            }
        }

        Ok(())
    }

    /// Query and parse one context's rows
    async fn load(&self, context: Context) -> Result<Vec<ScheduledPost>> {
        let records = self.store.query_by_context(context).await?;

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let id = record.id.clone();
                match ScheduledPost::try_from(record) {
                    Ok(post) => Some(post),
                    Err(e) => {
                        warn!(
                            context = %context,
                            id = %id,
                            error = %e,
                            "skipping unreadable record"
                        );
                        None
                    }
                }
            })
            .collect())
    }

    async fn dispatch(&self, adapter: &dyn PlatformAdapter, post: &ScheduledPost) -> Outcome {
        let credentials = Credentials::from_post(post);
        let mut stage = DispatchStage::Pending;
        debug!(context = %post.context, id = %post.id, stage = stage.as_str(), "dispatching");

        stage = DispatchStage::Uploading;
        debug!(context = %post.context, id = %post.id, stage = stage.as_str(), "uploading media");

        let media = match adapter.upload_media(&credentials, &post.image_url).await {
            Ok(media) => media,
            Err(e) => return self.fail(post, stage, &e),
        };

        stage = DispatchStage::Publishing;
        debug!(context = %post.context, id = %post.id, stage = stage.as_str(), "publishing");

        let caption = match adapter.caption_limit() {
            Some(limit) => self.captions.shorten_caption(&post.caption, limit),
            None => post.caption.clone(),
        };

        if let Err(e) = adapter.publish(&credentials, &caption, &media).await {
            return self.fail(post, stage, &e);
        }

        stage = DispatchStage::Done;
        info!(
            context = %post.context,
            id = %post.id,
            stage = stage.as_str(),
            platform = adapter.name(),
            "published scheduled post"
        );
        Outcome::Published
    }

    fn fail(&self, post: &ScheduledPost, at: DispatchStage, e: &ImgcastError) -> Outcome {
        warn!(
            context = %post.context,
            id = %post.id,
            stage = DispatchStage::Failed.as_str(),
            failed_at = at.as_str(),
            error = %e,
            "dispatch failed, post stays queued"
        );
        Outcome::Failed
    }
}
