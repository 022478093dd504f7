use crate::link::{LinkAction, LinkEvent};
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_RETRY: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
    /// Retry budget exhausted; terminal for the session.
    Failed(u32),
}

impl ConnectivityState {
    /// Connected or permanently failed: nothing left to wait for.
    pub fn is_settled(self) -> bool {
        matches!(self, ConnectivityState::Connected | ConnectivityState::Failed(_))
    }

    pub fn label(self) -> &'static str {
        match self {
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Connected => "connected",
            ConnectivityState::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub state: ConnectivityState,
    pub retry_count: u32,
    pub address: Option<IpAddr>,
}

impl Default for LinkSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            retry_count: 0,
            address: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    Ready,
    PermanentFailure,
    TimedOut,
}

/// Bounded-retry connectivity state machine.
///
/// The link event source writes through [`ConnectivitySupervisor::handle_event`]
/// from its own thread; the state lives in a `watch` channel so the monitor
/// thread and startup waiters always see the latest transition.
#[derive(Debug)]
pub struct ConnectivitySupervisor {
    max_retry: u32,
    state_tx: watch::Sender<LinkSnapshot>,
}

impl ConnectivitySupervisor {
    pub fn new(max_retry: u32) -> Self {
        let (state_tx, _state_rx) = watch::channel(LinkSnapshot::default());
        Self {
            max_retry,
            state_tx,
        }
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        *self.state_tx.borrow()
    }

    pub fn state(&self) -> ConnectivityState {
        self.state_tx.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkSnapshot> {
        self.state_tx.subscribe()
    }

    /// Non-blocking check used before every dispatch.
    pub fn is_usable(&self) -> bool {
        matches!(self.state(), ConnectivityState::Connected)
    }

    /// Apply one link event and report what the link layer should do next.
    pub fn handle_event(&self, event: LinkEvent) -> LinkAction {
        let mut action = LinkAction::Idle;
        let mut before = LinkSnapshot::default();
        let mut after = LinkSnapshot::default();
        self.state_tx.send_modify(|snapshot| {
            before = *snapshot;
            action = transition(snapshot, event, self.max_retry);
            after = *snapshot;
        });

        match (before.state, after.state) {
            (_, ConnectivityState::Connected) if before.state != after.state => {
                info!(address = ?after.address, "Link connected");
            }
            (ConnectivityState::Failed(_), _) => {
                debug!(event = ?event, "Ignoring link event after permanent failure");
            }
            (_, ConnectivityState::Failed(retries)) => {
                warn!(
                    retries,
                    max_retry = self.max_retry,
                    "Link retry budget exhausted; dispatch disabled until restart"
                );
            }
            (_, ConnectivityState::Connecting) if matches!(event, LinkEvent::Disconnected) => {
                info!(
                    retry = after.retry_count,
                    max_retry = self.max_retry,
                    "Link lost, retrying"
                );
            }
            _ => debug!(event = ?event, state = after.state.label(), "Link event handled"),
        }

        action
    }

    /// Wait until the link is connected or has permanently failed.
    ///
    /// Timing out only drops the local subscription; the state machine keeps
    /// running and later sends fail fast through [`Self::is_usable`].
    pub async fn await_ready(&self, timeout: Duration) -> ReadyOutcome {
        let mut state_rx = self.subscribe();
        let waited =
            tokio::time::timeout(timeout, state_rx.wait_for(|snapshot| snapshot.state.is_settled()))
                .await;
        match waited {
            Ok(Ok(snapshot)) => match snapshot.state {
                ConnectivityState::Connected => ReadyOutcome::Ready,
                _ => ReadyOutcome::PermanentFailure,
            },
            // The sender lives in `self`, so the channel cannot close while we wait.
            Ok(Err(_)) => ReadyOutcome::PermanentFailure,
            Err(_) => ReadyOutcome::TimedOut,
        }
    }
}

fn transition(snapshot: &mut LinkSnapshot, event: LinkEvent, max_retry: u32) -> LinkAction {
    match event {
        LinkEvent::AddressAcquired(address) => {
            snapshot.state = ConnectivityState::Connected;
            snapshot.retry_count = 0;
            snapshot.address = Some(address);
            LinkAction::Idle
        }
        _ if matches!(snapshot.state, ConnectivityState::Failed(_)) => LinkAction::Idle,
        LinkEvent::Start => {
            snapshot.state = ConnectivityState::Connecting;
            LinkAction::Connect
        }
        LinkEvent::Disconnected => {
            snapshot.address = None;
            snapshot.retry_count = snapshot.retry_count.saturating_add(1);
            if snapshot.retry_count >= max_retry {
                snapshot.state = ConnectivityState::Failed(snapshot.retry_count);
                LinkAction::Idle
            } else {
                snapshot.state = ConnectivityState::Connecting;
                LinkAction::Connect
            }
        }
    }
}
