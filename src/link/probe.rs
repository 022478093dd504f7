use crate::dispatch::http::parse_http_url;
use crate::error::AppError;
use crate::link::Link;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Link check based on the host routing table.
///
/// An attempt succeeds when the host has a local address with a route to the
/// collector. Connecting a UDP socket only selects a route; no packet is sent.
#[derive(Debug, Clone)]
pub struct RouteProbe {
    host: String,
    port: u16,
}

impl RouteProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn for_collector(base_url: &str) -> Result<Self, AppError> {
        let parsed = parse_http_url(base_url)
            .map_err(|err| AppError::Link(format!("{base_url}: {err}")))?;
        Ok(Self::new(parsed.host, parsed.port))
    }

    fn resolve(&self) -> Option<SocketAddr> {
        match (self.host.as_str(), self.port).to_socket_addrs() {
            Ok(mut addrs) => addrs.next(),
            Err(err) => {
                debug!(host = %self.host, error = %err, "Collector host did not resolve");
                None
            }
        }
    }
}

impl Link for RouteProbe {
    fn attempt(&mut self) -> Option<IpAddr> {
        let target = self.resolve()?;
        let bind_addr = match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = UdpSocket::bind(bind_addr).ok()?;
        if let Err(err) = socket.connect(target) {
            debug!(target = %target, error = %err, "No route to collector");
            return None;
        }
        let local = socket.local_addr().ok()?.ip();
        if local.is_unspecified() {
            None
        } else {
            Some(local)
        }
    }
}
