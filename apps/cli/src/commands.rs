//! Parsing of bot command lines read from stdin.
//!
//! One command per line: `<addr> <command> <url>`, e.g.
//! `alice@example.org /yt2audio https://youtu.be/xyz`. Blank lines and lines
//! starting with `#` are ignored.

use std::sync::Arc;

use chunkcast_fetch::{Fetcher, HttpFetcher, YtDlpFetcher, YtDlpMode};

/// Bot commands that queue a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/download`: any file over HTTP(S).
    Download,
    /// `/yt2video`: best video under the size limit.
    Video,
    /// `/yt2audio`: best audio under the size limit.
    Audio,
}

impl Command {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "/download" => Some(Self::Download),
            "/yt2video" => Some(Self::Video),
            "/yt2audio" => Some(Self::Audio),
            _ => None,
        }
    }
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub addr: String,
    pub command: Command,
    pub url: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected `<addr> <command> <url>`")]
    Malformed,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing URL")]
    MissingUrl,
}

/// Parses one line. Returns `Ok(None)` for lines that carry no command.
pub fn parse_line(line: &str) -> Result<Option<Request>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (addr, rest) = line
        .split_once(char::is_whitespace)
        .ok_or(ParseError::Malformed)?;
    let rest = rest.trim_start();
    let (name, url) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let command =
        Command::from_name(name).ok_or_else(|| ParseError::UnknownCommand(name.to_string()))?;
    let url = url.trim();
    if url.is_empty() {
        return Err(ParseError::MissingUrl);
    }

    Ok(Some(Request {
        addr: addr.to_string(),
        command,
        url: url.to_string(),
    }))
}

/// One fetcher per command, shared by every request.
#[derive(Clone)]
pub struct Fetchers {
    http: Arc<dyn Fetcher>,
    video: Arc<dyn Fetcher>,
    audio: Arc<dyn Fetcher>,
}

impl Fetchers {
    /// Builds the real fetchers; `yt_dlp` overrides the program path.
    pub fn new(yt_dlp: Option<&str>) -> anyhow::Result<Self> {
        let video = YtDlpFetcher::new(YtDlpMode::Video);
        let audio = YtDlpFetcher::new(YtDlpMode::Audio);
        let (video, audio) = match yt_dlp {
            Some(program) => (video.with_program(program), audio.with_program(program)),
            None => (video, audio),
        };

        Ok(Self {
            http: Arc::new(HttpFetcher::new()?),
            video: Arc::new(video),
            audio: Arc::new(audio),
        })
    }

    pub fn for_command(&self, command: Command) -> Arc<dyn Fetcher> {
        match command {
            Command::Download => Arc::clone(&self.http),
            Command::Video => Arc::clone(&self.video),
            Command::Audio => Arc::clone(&self.audio),
        }
    }
}
