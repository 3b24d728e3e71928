//! Feed Replay Binary
//!
//! Replays a recorded JSON-lines delivery file through the in-memory broker
//! and writes the resulting cache snapshot.
//!
//! Usage:
//!   ./feed_replay <deliveries.jsonl> [snapshot.json]
//!
//! Each line is `{"routing_key": "...", "body": {...}, "timestamp_in_ms": 123}`;
//! `body` may also be a string holding the raw payload. An existing snapshot
//! file is loaded before the replay starts.

use anyhow::{bail, Context, Result};
use oddsfeed_sdk::bin_common::{load_config_from_env, parse_args, BinaryRunner, ConfigType, RunConfig};
use oddsfeed_sdk::feedbus::{Delivery, InMemoryBroker};
use oddsfeed_sdk::oddsfeed::application::{init_logging_with_level, MessageInterest, OddsFeed, TIMESTAMP_HEADER};
use oddsfeed_sdk::oddsfeed::infrastructure::FeedConfig;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const REPLAY_QUEUE: &str = "feed-replay";
const DEFAULT_SNAPSHOT: &str = "feed_snapshot.json";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ReplayLine {
    routing_key: String,
    body: serde_json::Value,
    #[serde(default)]
    timestamp_in_ms: Option<i64>,
}

impl ReplayLine {
    fn into_delivery(self) -> Delivery {
        let body = match self.body {
            serde_json::Value::String(raw) => raw,
            other => other.to_string(),
        };
        let delivery = Delivery::new(self.routing_key, body);
        match self.timestamp_in_ms {
            Some(sent_at) => delivery.with_header(TIMESTAMP_HEADER, sent_at.to_string()),
            None => delivery,
        }
    }
}

struct FeedReplay {
    run_config: RunConfig,
    feed: OddsFeed,
    input: PathBuf,
    snapshot: PathBuf,
}

impl FeedReplay {
    async fn wait_until(&self, what: &str, mut done: impl FnMut() -> bool) -> bool {
        let started = Instant::now();
        while !done() {
            if started.elapsed() > DRAIN_TIMEOUT {
                warn!("Timed out waiting for {}", what);
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

impl BinaryRunner for FeedReplay {
    async fn run(&mut self) -> Result<String> {
        if self.snapshot.exists() {
            let loaded = self
                .feed
                .load_snapshot(&self.snapshot)
                .await
                .with_context(|| format!("Failed to load snapshot {:?}", self.snapshot))?;
            info!("Warm start: {} cache records loaded", loaded);
        }

        let broker = Arc::new(InMemoryBroker::new());
        let session = self
            .feed
            .open_session(broker.clone(), REPLAY_QUEUE, MessageInterest::AllMessages)
            .await?;
        if !self.wait_until("queue subscription", || broker.has_queue(REPLAY_QUEUE)).await {
            bail!("Replay queue was never subscribed");
        }

        let file = File::open(&self.input)
            .with_context(|| format!("Failed to open delivery file {:?}", self.input))?;
        let mut published = 0usize;
        let mut skipped = 0usize;
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {:?}", self.input))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ReplayLine>(&line) {
                Ok(entry) => {
                    broker.publish(entry.into_delivery());
                    published += 1;
                    if self.run_config.is_progress_tick(published) {
                        info!("Replayed {} deliveries", published);
                    }
                }
                Err(e) => {
                    warn!(line = index + 1, error = %e, "Skipping malformed replay line");
                    skipped += 1;
                }
            }
        }

        self.wait_until("consumer to drain the queue", || {
            session.metrics().deliveries_received >= published as u64
        })
        .await;
        let consumer = session.metrics();
        session.close().await?;

        let written = self
            .feed
            .save_snapshot(&self.snapshot)
            .with_context(|| format!("Failed to write snapshot {:?}", self.snapshot))?;
        let stats = self.feed.receiver_stats();

        Ok(format!(
            "Deliveries: {} published, {} skipped, {} parse errors | Messages: {} forwarded, {} dropped | Snapshot: {} records -> {:?}",
            published,
            skipped,
            consumer.parse_errors,
            stats.forwarded,
            stats.unknown_producer_drops + stats.inactive_producer_drops,
            written,
            self.snapshot
        ))
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let Some(input) = args.first() else {
        bail!("Usage: feed_replay <deliveries.jsonl> [snapshot.json]");
    };
    let snapshot = args.get(1).map(String::as_str).unwrap_or(DEFAULT_SNAPSHOT);

    let config_path = load_config_from_env(ConfigType::Feed);
    let mut config = FeedConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;
    config.replay = true;

    init_logging_with_level(&config.log_level);
    config.log();

    let mut replay = FeedReplay {
        run_config: RunConfig::new("Feed Replay"),
        feed: OddsFeed::with_http_provider(config)?,
        input: PathBuf::from(input),
        snapshot: PathBuf::from(snapshot),
    };
    replay.execute().await
}
