//! Replays JSON-lines log files into the in-memory transport.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use live_logs::{ChannelKind, MemoryTransport, RawLogRecord, SubscriptionKey};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// One file replayed onto one channel.
#[derive(Debug, Clone)]
pub struct FileFeed {
    pub kind: ChannelKind,
    pub path: PathBuf,
    /// Pause between published lines
    pub delay: Duration,
}

/// Parses one JSON line into a raw record.
pub fn parse_line(line: &str) -> serde_json::Result<RawLogRecord> {
    serde_json::from_str(line)
}

/// Publishes every parseable line of the feed. Returns how many were published.
pub async fn replay(
    feed: FileFeed,
    transport: Arc<MemoryTransport>,
    key: SubscriptionKey,
) -> Result<usize> {
    let file = File::open(&feed.path)
        .await
        .with_context(|| format!("opening {}", feed.path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut line_no = 0usize;
    let mut published = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("reading {}", feed.path.display()))?
    {
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = match parse_line(trimmed) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    path = %feed.path.display(),
                    line = line_no,
                    error = %e,
                    "skipping unparseable line"
                );
                continue;
            }
        };

        transport.publish(feed.kind, &key, record);
        published += 1;

        if !feed.delay.is_zero() {
            tokio::time::sleep(feed.delay).await;
        }
    }

    debug!(channel = %feed.kind, path = %feed.path.display(), published, "feed finished");
    Ok(published)
}
