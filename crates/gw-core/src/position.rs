//! Position samples delivered by the position feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw position sample for a feed channel
///
/// The scale is defined by whatever sensor publishes on the channel
/// (typically 0-100). No range check is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEvent {
    /// Channel the sample arrived on
    pub key: String,
    pub position: i64,
    pub received_at: DateTime<Utc>,
}

impl PositionEvent {
    /// Create a sample stamped with the current time
    pub fn new(key: impl Into<String>, position: i64) -> Self {
        Self {
            key: key.into(),
            position,
            received_at: Utc::now(),
        }
    }
}
