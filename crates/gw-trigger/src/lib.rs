//! Relay triggers for the remote gateway bridge
//!
//! A trigger is one outbound HTTP call that simulates a button press on the
//! remote gateway. Publishing never blocks and never fails: the call runs as
//! a detached task, and transport errors end up in the log only.

use gw_core::{TriggerMethod, TriggerRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[cfg(any(test, feature = "testing"))]
mod recording;

#[cfg(any(test, feature = "testing"))]
pub use recording::{PublishedTrigger, RecordingPublisher};

/// Default timeout for a single relay call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends relay triggers
///
/// Implementations must return without waiting for delivery. The return
/// value is optimistic and only says the trigger was handed off.
pub trait TriggerPublisher: Send + Sync {
    fn publish(&self, request: &TriggerRequest) -> bool;
}

/// Shared handle to a publisher
pub type SharedPublisher = Arc<dyn TriggerPublisher>;

/// Publisher that issues real HTTP requests with reqwest
#[derive(Debug, Clone)]
pub struct HttpTriggerPublisher {
    client: reqwest::Client,
}

impl HttpTriggerPublisher {
    /// Create a publisher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Create a publisher around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl TriggerPublisher for HttpTriggerPublisher {
    fn publish(&self, request: &TriggerRequest) -> bool {
        debug!(url = %request.url, method = %request.method, "Publishing trigger");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(send_trigger(self.client.clone(), request.clone()));
            }
            Err(e) => {
                error!(url = %request.url, error = %e, "No runtime to send trigger on");
            }
        }

        true
    }
}

/// Perform one relay call, logging the outcome
async fn send_trigger(client: reqwest::Client, request: TriggerRequest) {
    let builder = match request.method {
        TriggerMethod::Post => client
            .post(&request.url)
            .body(request.payload.clone().unwrap_or_default()),
        TriggerMethod::Get => client.get(&request.url),
    };

    let response = match builder.send().await {
        Ok(response) => response,
        Err(e) => {
            error!(url = %request.url, error = %e, "Trigger request failed");
            return;
        }
    };

    let status = response.status();
    match response.text().await {
        Ok(body) if status.is_success() => {
            info!(url = %request.url, %status, body = %body, "Trigger sent");
        }
        Ok(body) => {
            warn!(url = %request.url, %status, body = %body, "Relay answered with an error status");
        }
        Err(e) => {
            error!(url = %request.url, %status, error = %e, "Failed to read relay response");
        }
    }
}
