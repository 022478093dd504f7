//! Change event delivery to the remote collector.
//!
//! Delivery is fire-and-forget: one attempt per change event, no queue and no
//! retry. An event that cannot be sent when it is raised is dropped; the next
//! genuine transition is the next delivery opportunity.

use crate::link::ConnectivitySupervisor;
use crate::occupancy::ChangeEvent;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod http;
pub mod mock;

pub const DEFAULT_PARKING_PATH: &str = "/pt/parking";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("link not usable")]
    LinkDown,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("dns error: {0}")]
    Dns(String),
    #[error("connect error: {0}")]
    Connect(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("payload encoding failed: {0}")]
    Encode(String),
}

/// Network collaborator used by the dispatcher.
pub trait CollectorTransport {
    /// POST a JSON body and return the response status code.
    fn post_json(&self, url: &str, body: &str) -> Result<u16, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent(u16),
    Rejected(u16),
    TransportError(TransportError),
}

/// Wire payload for one change event.
#[derive(Debug, Serialize)]
pub struct ParkingUpdate<'a> {
    pub spot: &'a str,
    pub taken: bool,
}

impl<'a> From<&'a ChangeEvent> for ParkingUpdate<'a> {
    fn from(event: &'a ChangeEvent) -> Self {
        Self {
            spot: &event.slot_id,
            taken: event.occupied,
        }
    }
}

pub struct UpdateDispatcher<T> {
    transport: T,
    link: Arc<ConnectivitySupervisor>,
    url: String,
}

impl<T> UpdateDispatcher<T>
where
    T: CollectorTransport,
{
    pub fn new(
        transport: T,
        link: Arc<ConnectivitySupervisor>,
        base_url: &str,
        parking_path: &str,
    ) -> Self {
        Self {
            transport,
            link,
            url: join_url(base_url, parking_path),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dispatch(&self, event: &ChangeEvent) -> DispatchOutcome {
        if !self.link.is_usable() {
            warn!(
                slot = %event.slot_id,
                state = self.link.state().label(),
                "Link not usable; dropping update"
            );
            return DispatchOutcome::TransportError(TransportError::LinkDown);
        }

        let body = match serde_json::to_string(&ParkingUpdate::from(event)) {
            Ok(body) => body,
            Err(err) => {
                return DispatchOutcome::TransportError(TransportError::Encode(err.to_string()));
            }
        };
        debug!(url = %self.url, body = %body, "Sending parking update");

        match self.transport.post_json(&self.url, &body) {
            Ok(status) if (200..300).contains(&status) => {
                info!(
                    slot = %event.slot_id,
                    taken = event.occupied,
                    status,
                    "Server update successful"
                );
                DispatchOutcome::Sent(status)
            }
            Ok(status) => {
                warn!(slot = %event.slot_id, status, "Server rejected update");
                DispatchOutcome::Rejected(status)
            }
            Err(err) => {
                warn!(slot = %event.slot_id, error = %err, "Failed to update server");
                DispatchOutcome::TransportError(err)
            }
        }
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
