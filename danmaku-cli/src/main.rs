//! Danmaku CLI Tool
//!
//! Command-line interface for matching media files against the comment
//! service and previewing the overlay the player plugin would draw.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use danmaku_client::{fetch_danmaku, identify, ClientConfig, DandanplayClient};
use danmaku_core::{CommentTrack, FrameParams, Viewport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "danmaku")]
#[command(about = "Danmaku - scrolling comment overlays for local media files")]
#[command(version)]
struct Cli {
    /// Base URL of the comment service API
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the episode a media file belongs to
    Match {
        /// Media file path
        file: PathBuf,
    },

    /// List the comments of a media file in time order
    Comments {
        /// Media file path
        file: PathBuf,

        /// Print at most this many comments
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print the overlay markup for a single frame
    Preview {
        /// Media file path
        file: PathBuf,

        /// Playback position in seconds
        #[arg(long)]
        at: f64,

        /// Overlay width in pixels
        #[arg(long, default_value = "1920")]
        width: f64,

        /// Overlay height in pixels
        #[arg(long, default_value = "1080")]
        height: f64,

        /// Player font size before scaling
        #[arg(long, default_value = "55")]
        font_size: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = build_client(cli.api_url, cli.timeout)?;
    let token = CancellationToken::new();

    match cli.command {
        Commands::Match { file } => {
            let episode_id = identify(&token, &client, &file)
                .await
                .context("Failed to match media file")?;
            info!(episode_id, "matched");
            println!("{}: episode {episode_id}", file.display());
        }

        Commands::Comments { file, limit } => {
            let track = fetch_track(&token, &client, &file).await?;
            print_comments(&track, limit);
        }

        Commands::Preview {
            file,
            at,
            width,
            height,
            font_size,
        } => {
            let mut track = fetch_track(&token, &client, &file).await?;
            info!(position = at, comments = track.len(), "rendering preview frame");
            let frame = FrameParams {
                viewport: Viewport::new(width, height),
                position: at,
                font_size,
                speed: 1.0,
                elapsed: 0.0,
            };
            println!("{}", track.tick(&frame));
        }
    }

    Ok(())
}

fn build_client(api_url: Option<String>, timeout: Option<f64>) -> Result<DandanplayClient> {
    let mut config = ClientConfig::default();
    if let Some(url) = api_url {
        config.base_url = url;
    }
    if let Some(secs) = timeout {
        config.timeout = Duration::try_from_secs_f64(secs).context("Invalid timeout")?;
    }
    info!(api_url = %config.base_url, timeout = ?config.timeout, "using comment service");
    DandanplayClient::new(&config).context("Failed to create HTTP client")
}

async fn fetch_track(
    token: &CancellationToken,
    client: &DandanplayClient,
    file: &Path,
) -> Result<CommentTrack> {
    fetch_danmaku(token, client, file)
        .await
        .with_context(|| format!("Failed to load comments for {}", file.display()))
}

fn print_comments(track: &CommentTrack, limit: Option<usize>) {
    println!("{} comments", track.len());
    for comment in track.iter().take(limit.unwrap_or(usize::MAX)) {
        let minutes = (comment.time / 60.0).floor();
        let seconds = comment.time - minutes * 60.0;
        println!(
            "  [{:02}:{:06.3}] {} {}",
            minutes as u64,
            seconds,
            comment.color.to_ass(),
            comment.message
        );
    }
    if let Some(limit) = limit {
        if track.len() > limit {
            println!("  ... and {} more comments", track.len() - limit);
        }
    }
}
