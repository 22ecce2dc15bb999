//! imgcast-queue - Enqueue scheduled image posts
//!
//! Unix-style front end to the schedule: add posts, list the queue, or handle a
//! single request event read from stdin.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use libimgcast::scheduling::parse_posting_time;
use libimgcast::{
    handle_event, Config, Context, ImgcastError, NewPost, Response, ScheduledPost,
    SchedulerEngine,
};
use std::io::Read;

#[derive(Parser, Debug)]
#[command(name = "imgcast-queue")]
#[command(version)]
#[command(about = "Enqueue scheduled image posts")]
#[command(long_about = "\
imgcast-queue - Enqueue scheduled image posts

DESCRIPTION:
    imgcast-queue manages the imgcast schedule. Add image posts for Mastodon,
    Bluesky, Twitter or Instagram, list what is waiting, or handle one request
    event in the {context, postingHost, ...} format read from stdin.

COMMANDS:
    add         Schedule an image post
    list        List scheduled posts
    handle      Handle one request event from stdin

USAGE EXAMPLES:
    # Post to a Mastodon instance in 90 minutes
    imgcast-queue add --context mastodon --host https://mastodon.social \\
        --token $TOKEN --image https://example.com/cat.jpg \\
        --caption \"A cat. #cats #caturday\" --at 90m

    # Relay through an IFTTT webhook tomorrow afternoon
    imgcast-queue add --context instagram \\
        --host https://maker.ifttt.com/trigger/post/with/key/KEY \\
        --image https://example.com/cat.jpg --caption \"A cat.\" --at \"tomorrow 3pm\"

    # List queued posts in JSON format
    imgcast-queue list --format json

    # Run a sweep through the request interface
    echo '{\"context\":\"schedule\"}' | imgcast-queue handle

CONFIGURATION:
    Configuration file: ~/.config/imgcast/config.toml
    Database location: ~/.local/share/imgcast/schedule.db

    Override with environment variables:
        IMGCAST_CONFIG    - Path to config file
        IMGCAST_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Operation failed (handle: response status was not 200)
    2 - Database or configuration error
    3 - Invalid input (unknown context, bad time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schedule an image post
    Add {
        /// Target platform: mastodon, bluesky, twitter or instagram
        #[arg(short, long)]
        context: String,

        /// Instance URL, account handle, or webhook URL
        #[arg(long)]
        host: String,

        /// Bearer token or app password (not needed for webhooks)
        #[arg(long, env = "IMGCAST_POSTING_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Caption, including trailing hashtags
        #[arg(long)]
        caption: String,

        /// Public URL of the image to post
        #[arg(long)]
        image: String,

        /// When to post (e.g., "90m", "tomorrow 3pm", unix seconds)
        #[arg(long, default_value = "0s")]
        at: String,
    },

    /// List scheduled posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Filter by platform context
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Handle one request event read from stdin
    Handle,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libimgcast::logging::init_default(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = e
                .downcast_ref::<ImgcastError>()
                .map(ImgcastError::exit_code)
                .unwrap_or(1);
            std::process::exit(code);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = Config::load()?;

    match cli.command {
        Commands::Add {
            context,
            host,
            token,
            caption,
            image,
            at,
        } => {
            let post = NewPost {
                context: context.parse()?,
                posting_host: host,
                posting_token: token,
                caption,
                image_url: image,
                posting_time: parse_posting_time(&at, chrono::Utc::now())?,
            };
            let engine = SchedulerEngine::from_config(&config).await?;
            cmd_add(&engine, post).await?;
            Ok(0)
        }
        Commands::List { format, context } => {
            let context = context.map(|c| c.parse::<Context>()).transpose()?;
            let engine = SchedulerEngine::from_config(&config).await?;
            cmd_list(&engine, &format, context).await?;
            Ok(0)
        }
        Commands::Handle => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read event from stdin")?;

            let engine = SchedulerEngine::from_config(&config).await?;
            let response = cmd_handle(&engine, &input).await;

            println!("{}", serde_json::to_string(&response)?);
            Ok(if response.is_success() { 0 } else { 1 })
        }
    }
}

/// Schedule a post and print its id
async fn cmd_add(engine: &SchedulerEngine, post: NewPost) -> Result<()> {
    let id = engine.schedule(post).await?;
    println!("{}", id);
    Ok(())
}

/// Run one event through the router
///
/// Input that is not JSON is answered like any other malformed request.
async fn cmd_handle(engine: &SchedulerEngine, input: &str) -> Response {
    match serde_json::from_str(input) {
        Ok(event) => handle_event(engine, event, chrono::Utc::now().timestamp()).await,
        Err(e) => {
            let error = ImgcastError::InvalidInput(format!("event is not JSON: {}", e));
            tracing::error!(error = %error, "failed to run scheduler");
            Response::from_error(&error)
        }
    }
}

/// List scheduled posts
async fn cmd_list(
    engine: &SchedulerEngine,
    format: &str,
    context: Option<Context>,
) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(ImgcastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        ))
        .into());
    }

    let posts = engine.pending(context).await?;

    if format == "json" {
        output_list_json(&posts)?;
    } else {
        output_list_text(&posts);
    }

    Ok(())
}

/// Output posts as JSON; posting tokens are never printed
fn output_list_json(posts: &[ScheduledPost]) -> Result<()> {
    let json: Vec<serde_json::Value> = posts
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "context": p.context,
                "postingHost": p.posting_host,
                "caption": p.caption,
                "imageURL": p.image_url,
                "postingTime": p.posting_time,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

/// Output posts as human-readable text
fn output_list_text(posts: &[ScheduledPost]) {
    let now = chrono::Utc::now().timestamp();

    for post in posts {
        println!(
            "{} | {} | {} | {}",
            post.id,
            post.context,
            truncate_caption(&post.caption, 50),
            format_time_until(now, post.posting_time)
        );
    }
}

/// Truncate caption to max characters with ellipsis, on one line
fn truncate_caption(caption: &str, max_chars: usize) -> String {
    let flat = caption.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: i64, scheduled_at: i64) -> String {
    let diff = scheduled_at - now;

    if diff < 0 {
        return "due".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}
