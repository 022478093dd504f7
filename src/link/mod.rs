//! Wireless link supervision.
//!
//! The link layer runs on its own thread and reports events to the
//! [`ConnectivitySupervisor`], which answers with the next action to take.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod probe;
pub mod supervisor;

pub use supervisor::{ConnectivityState, ConnectivitySupervisor, LinkSnapshot, ReadyOutcome};

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Start,
    Disconnected,
    AddressAcquired(IpAddr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Attempt (or re-attempt) association.
    Connect,
    Idle,
}

/// Link-layer collaborator: one association attempt per call.
pub trait Link {
    /// Returns the acquired local address, or `None` when the attempt failed.
    fn attempt(&mut self) -> Option<IpAddr>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// Pause between a failed attempt and the next one.
    pub retry_delay: Duration,
    /// How often an established link is re-checked.
    pub health_check_interval: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
        }
    }
}

/// Drive the link until it fails permanently or `stop` is raised.
pub fn run_link<L>(
    link: &mut L,
    supervisor: &ConnectivitySupervisor,
    timing: LinkTiming,
    stop: &AtomicBool,
) where
    L: Link + ?Sized,
{
    let mut action = supervisor.handle_event(LinkEvent::Start);

    while !stop.load(Ordering::Relaxed) {
        match action {
            LinkAction::Connect => {
                action = match link.attempt() {
                    Some(address) => supervisor.handle_event(LinkEvent::AddressAcquired(address)),
                    None => {
                        let next = supervisor.handle_event(LinkEvent::Disconnected);
                        if next == LinkAction::Connect {
                            sleep_with_stop(timing.retry_delay, stop);
                        }
                        next
                    }
                };
            }
            LinkAction::Idle => {
                if matches!(supervisor.state(), ConnectivityState::Failed(_)) {
                    warn!("Link permanently failed; no further connection attempts");
                    return;
                }
                sleep_with_stop(timing.health_check_interval, stop);
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                if link.attempt().is_none() {
                    action = supervisor.handle_event(LinkEvent::Disconnected);
                } else {
                    debug!("Link health check passed");
                }
            }
        }
    }

    info!("Link thread stopping");
}

pub fn spawn_link_thread<L>(
    mut link: L,
    supervisor: Arc<ConnectivitySupervisor>,
    timing: LinkTiming,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()>
where
    L: Link + Send + 'static,
{
    std::thread::spawn(move || run_link(&mut link, &supervisor, timing, &stop))
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool) {
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < duration {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let chunk = step.min(duration - slept);
        std::thread::sleep(chunk);
        slept += chunk;
    }
}
