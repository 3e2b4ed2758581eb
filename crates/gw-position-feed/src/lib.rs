//! Position feed for the remote gateway bridge
//!
//! This crate provides the PositionFeed, which fans raw position samples out
//! to whoever listens on a channel key. Samples arrive as text from the
//! transport, are parsed here, and only well-formed integers are delivered.

use dashmap::DashMap;
use gw_core::PositionEvent;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

/// Default channel capacity for position subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors raised at the feed boundary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("invalid position '{raw}' on channel {key}: not an integer")]
    InvalidPosition { key: String, raw: String },

    #[error("channel key cannot be empty")]
    EmptyKey,
}

/// The position feed
///
/// Each channel key has its own broadcast sender, so samples for one gate
/// are delivered in arrival order and never reach another gate's listeners.
pub struct PositionFeed {
    /// Broadcast senders keyed by channel
    channels: DashMap<String, broadcast::Sender<PositionEvent>>,
    /// Channel capacity
    capacity: usize,
}

impl PositionFeed {
    /// Create a new position feed
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new position feed with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to samples on a channel
    pub fn subscribe(&self, key: &str) -> broadcast::Receiver<PositionEvent> {
        trace!(key = %key, "Subscribing to position channel");

        self.channels
            .entry(key.to_string())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Parse a raw text sample and publish it
    ///
    /// Non-numeric input is rejected and never delivered. Returns the parsed
    /// position on success.
    pub fn publish_raw(&self, key: &str, raw: &str) -> FeedResult<i64> {
        let position = parse_position(key, raw)?;
        self.publish(key, position)?;
        Ok(position)
    }

    /// Publish an already-parsed sample
    ///
    /// Returns the number of listeners the sample reached.
    pub fn publish(&self, key: &str, position: i64) -> FeedResult<usize> {
        if key.is_empty() {
            return Err(FeedError::EmptyKey);
        }

        debug!(key = %key, position, "Publishing position sample");

        let Some(sender) = self.channels.get(key) else {
            trace!(key = %key, "No listeners for position channel");
            return Ok(0);
        };

        // A send error only means nobody is listening right now
        Ok(sender.send(PositionEvent::new(key, position)).unwrap_or(0))
    }

    /// Number of channels that have been subscribed to
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for PositionFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a raw position sample as a base-10 integer
pub fn parse_position(key: &str, raw: &str) -> FeedResult<i64> {
    raw.trim().parse::<i64>().map_err(|_| {
        warn!(key = %key, raw = %raw, "Rejecting non-numeric position sample");
        FeedError::InvalidPosition {
            key: key.to_string(),
            raw: raw.to_string(),
        }
    })
}

/// Thread-safe wrapper for PositionFeed
pub type SharedPositionFeed = Arc<PositionFeed>;
