//! Request routing
//!
//! Translates an incoming event into either an enqueue or a sweep and wraps the
//! outcome in a `{statusCode, body}` response. An event is either the request
//! object itself or an HTTP-proxy envelope whose `body` field holds the request
//! as a JSON string.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{ImgcastError, Result};
use crate::scheduler::SchedulerEngine;
use crate::types::{Context, NewPost};

/// Context value that triggers a sweep instead of an enqueue
pub const SWEEP_CONTEXT: &str = "schedule";

const UNKNOWN_CONTEXT_BODY: &str = "unknown context";
const FAILURE_BODY: &str = "failed to run scheduler";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    pub fn from_error(error: &ImgcastError) -> Self {
        let status_code = error.status_code();
        let body = if status_code == 404 {
            UNKNOWN_CONTEXT_BODY
        } else {
            FAILURE_BODY
        };

        Self {
            status_code,
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Enqueue(NewPost),
    Sweep,
}

/// Enqueue fields, read once the context is known to be a platform
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueFields {
    posting_host: Option<String>,
    posting_token: Option<String>,
    caption: Option<String>,
    #[serde(rename = "imageURL")]
    image_url: Option<String>,
    posting_time: Option<PostingTime>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PostingTime {
    Seconds(i64),
    Text(String),
}

impl PostingTime {
    fn seconds(self) -> Result<i64> {
        match self {
            PostingTime::Seconds(seconds) => Ok(seconds),
            PostingTime::Text(text) => text.trim().parse().map_err(|_| {
                ImgcastError::InvalidInput(format!("postingTime '{}' is not unix seconds", text))
            }),
        }
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| ImgcastError::InvalidInput(format!("missing field '{}'", field)))
}

impl Request {
    /// Parse an event, unwrapping a string `body` envelope when present
    ///
    /// # Errors
    ///
    /// - `ImgcastError::UnknownContext` if `context` is absent, not a string, or
    ///   not one of the four platforms or `"schedule"`
    /// - `ImgcastError::InvalidInput` if the envelope is malformed, or an enqueue
    ///   request has a malformed or missing field
    ///
    /// Fields other than `context` are only read for enqueue requests.
    pub fn from_event(event: Value) -> Result<Self> {
        let envelope_body = event
            .get("body")
            .and_then(Value::as_str)
            .filter(|body| !body.is_empty())
            .map(str::to_owned);

        let request = match envelope_body {
            Some(body) => serde_json::from_str::<Value>(&body).map_err(|e| {
                ImgcastError::InvalidInput(format!("event body is not JSON: {}", e))
            })?,
            None => event,
        };

        let context = match request.get("context") {
            Some(Value::String(context)) if context == SWEEP_CONTEXT => return Ok(Request::Sweep),
            Some(Value::String(context)) => context.parse::<Context>()?,
            Some(other) => return Err(ImgcastError::UnknownContext(other.to_string())),
            None => return Err(ImgcastError::UnknownContext(String::new())),
        };

        let raw: EnqueueFields = serde_json::from_value(request)
            .map_err(|e| ImgcastError::InvalidInput(format!("malformed request: {}", e)))?;

        Ok(Request::Enqueue(NewPost {
            context,
            posting_host: required(raw.posting_host, "postingHost")?,
            posting_token: raw.posting_token,
            caption: required(raw.caption, "caption")?,
            image_url: required(raw.image_url, "imageURL")?,
            posting_time: required(raw.posting_time, "postingTime")?.seconds()?,
        }))
    }
}

/// Handle one event against `engine`; `now` is the sweep clock in unix seconds
///
/// Never fails: every error is folded into the response status.
pub async fn handle_event(engine: &SchedulerEngine, event: Value, now: i64) -> Response {
    match route(engine, event, now).await {
        Ok(response) => response,
        Err(e) => {
            match e {
                ImgcastError::UnknownContext(ref context) => {
                    warn!(context = %context, "unknown context");
                }
                _ => error!(error = %e, "failed to run scheduler"),
            }
            Response::from_error(&e)
        }
    }
}

async fn route(engine: &SchedulerEngine, event: Value, now: i64) -> Result<Response> {
    match Request::from_event(event)? {
        Request::Enqueue(post) => {
            info!(context = %post.context, "scheduling status update");
            let id = engine.schedule(post).await?;
            Ok(Response::ok(json!({ "id": id }).to_string()))
        }
        Request::Sweep => {
            let result = engine.run_due(now).await?;
            info!(
                successful = result.successful_count,
                failed = result.failed_count,
                "update of schedules finished"
            );
            Ok(Response::ok(
                json!({
                    "successfulCount": result.successful_count,
                    "failedCount": result.failed_count,
                })
                .to_string(),
            ))
        }
    }
}
