//! In-memory publisher for tests

use gw_core::TriggerRequest;
use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;

use crate::TriggerPublisher;

/// A trigger captured by [`RecordingPublisher`]
#[derive(Debug, Clone)]
pub struct PublishedTrigger {
    pub request: TriggerRequest,
    /// Tokio clock reading at publish time, so paused-clock tests can check spacing
    pub at: Instant,
}

/// Publisher that records every trigger instead of sending it
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedTrigger>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All triggers published so far, oldest first
    pub fn published(&self) -> Vec<PublishedTrigger> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl TriggerPublisher for RecordingPublisher {
    fn publish(&self, request: &TriggerRequest) -> bool {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PublishedTrigger {
                request: request.clone(),
                at: Instant::now(),
            });
        true
    }
}
