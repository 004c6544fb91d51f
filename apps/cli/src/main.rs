//! Chunkcast host entry point.
//!
//! Reads bot commands from stdin, queues the downloads they ask for, and
//! delivers the parts to a directory outbox until stdin closes or Ctrl-C.

mod commands;
mod config;
mod outbox;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chunkcast_queue::{Deliverer, DeliveryLoop, DownloadQueue, RequestHandler, admission_reply};
use chunkcast_settings::{DownloadSettings, JsonFileSettings, SettingsSource};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{Fetchers, parse_line};
use crate::outbox::OutboxDeliverer;

/// Queue downloads and deliver them in parts.
#[derive(Parser)]
#[command(name = "chunkcast", version)]
struct Cli {
    /// Settings file (default: ~/.config/chunkcast/settings.json).
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Directory receiving delivered parts and replies.
    #[arg(short, long)]
    outbox: Option<PathBuf>,

    /// Directory for scratch files (default: system temp dir).
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Path to the yt-dlp executable.
    #[arg(long)]
    yt_dlp: Option<String>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Change a setting (part_size, max_size in bytes; delay in seconds).
    Set { key: String, value: String },

    /// Print the effective settings.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings_path = cli.settings.clone().unwrap_or_else(config::settings_path);

    match &cli.command {
        Some(Cmd::Set { key, value }) => {
            JsonFileSettings::new(&settings_path)
                .set(key, value)
                .with_context(|| format!("cannot update {}", settings_path.display()))?;
            println!("{key} = {value}");
            Ok(())
        }
        Some(Cmd::Show) => {
            let current = DownloadSettings::load(&JsonFileSettings::new(&settings_path));
            println!("# {}", settings_path.display());
            println!("part_size = {}", current.part_size);
            println!("max_size = {}", current.max_size);
            println!("delay = {}", current.delay.as_secs());
            Ok(())
        }
        None => run(&cli, settings_path).await,
    }
}

async fn run(cli: &Cli, settings_path: PathBuf) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting chunkcast");

    let settings: Arc<dyn SettingsSource> = Arc::new(JsonFileSettings::new(&settings_path));
    let current = DownloadSettings::load(settings.as_ref());
    info!(
        path = %settings_path.display(),
        part_size = current.part_size,
        max_size = current.max_size,
        delay_secs = current.delay.as_secs(),
        "settings loaded"
    );

    let work_dir = cli.work_dir.clone().unwrap_or_else(std::env::temp_dir);
    tokio::fs::create_dir_all(&work_dir)
        .await
        .with_context(|| format!("cannot create work dir {}", work_dir.display()))?;
    let outbox_dir = cli.outbox.clone().unwrap_or_else(config::default_outbox_dir);
    info!(outbox = %outbox_dir.display(), work_dir = %work_dir.display(), "delivering to outbox");

    let outbox = Arc::new(OutboxDeliverer::new(outbox_dir));
    let queue = Arc::new(DownloadQueue::new());
    info!(capacity = queue.capacity(), "download queue ready");
    let fetchers = Fetchers::new(cli.yt_dlp.as_deref())?;
    let handler = RequestHandler::new(Arc::clone(&queue), Arc::clone(&settings))
        .with_work_root(&work_dir);

    let cancel = CancellationToken::new();
    let delivery = DeliveryLoop::new(Arc::clone(&queue), outbox.clone(), settings)
        .spawn(cancel.clone());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(&handler, &fetchers, outbox.as_ref(), &line).await,
                Ok(None) => {
                    wait_for_drain(&queue).await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    }

    cancel.cancel();
    delivery.await.context("delivery loop panicked")?;
    if !queue.is_empty() {
        info!(queued = queue.len(), "discarding unfinished downloads");
    }
    Ok(())
}

/// Queues the download a command line asks for and replies to its sender.
async fn handle_line(
    handler: &RequestHandler,
    fetchers: &Fetchers,
    deliverer: &dyn Deliverer,
    line: &str,
) {
    let request = match parse_line(line) {
        Ok(Some(request)) => request,
        Ok(None) => return,
        Err(e) => {
            warn!(line, error = %e, "ignoring command");
            return;
        }
    };

    let result = handler.queue_download(
        &request.addr,
        &request.url,
        fetchers.for_command(request.command),
    );
    let reply = admission_reply(&result);
    if let Err(e) = deliverer.notify(&request.addr, &reply).await {
        warn!(to = %request.addr, error = %e, "reply not delivered");
    }
}

/// Waits until every queued download has been delivered, or Ctrl-C.
async fn wait_for_drain(queue: &DownloadQueue) {
    if queue.is_empty() {
        return;
    }
    info!(queued = queue.len(), "input closed, waiting for queued downloads");

    let mut tick = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return;
            }
            _ = tick.tick() => {
                if queue.is_empty() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcast_queue::QUEUED_REPLY;
    use chunkcast_settings::MemorySettings;

    #[test]
    fn cli_parses_flags_and_subcommands() {
        let cli = Cli::parse_from(["chunkcast", "--outbox", "/tmp/out", "-w", "/tmp/work"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.outbox, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.work_dir, Some(PathBuf::from("/tmp/work")));

        let cli = Cli::parse_from(["chunkcast", "set", "delay", "30", "--settings", "s.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("s.json")));
        match cli.command {
            Some(Cmd::Set { key, value }) => assert_eq!((key.as_str(), value.as_str()), ("delay", "30")),
            _ => panic!("expected set"),
        }
    }

    #[tokio::test]
    async fn command_lines_are_queued_and_answered() {
        let tmp = tempfile::tempdir().unwrap();
        let outbox = OutboxDeliverer::new(tmp.path());
        let queue = Arc::new(DownloadQueue::new());
        let handler = RequestHandler::new(
            Arc::clone(&queue),
            Arc::new(MemorySettings::with_defaults()),
        );
        let fetchers = Fetchers::new(None).unwrap();

        handle_line(&handler, &fetchers, &outbox, "alice /yt2audio https://youtu.be/a").await;
        handle_line(&handler, &fetchers, &outbox, "alice /download https://e.com/b").await;
        handle_line(&handler, &fetchers, &outbox, "bob /nope x").await;

        assert!(queue.contains("alice"));
        assert_eq!(queue.len(), 1);

        let log = std::fs::read_to_string(outbox.mailbox("alice").join("messages.log")).unwrap();
        assert_eq!(
            log,
            format!("{QUEUED_REPLY}\n❌ You already have a download in queue\n")
        );
        assert!(!outbox.mailbox("bob").exists());
    }
}
