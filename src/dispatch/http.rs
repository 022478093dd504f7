use crate::dispatch::{CollectorTransport, TransportError};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_RESPONSE_HEAD: usize = 16 * 1024;

/// Minimal HTTP/1.1 client: one POST per connection, status code only.
///
/// Host names are resolved once and cached. The system resolver has no
/// timeout of its own, so a lookup is not covered by the request deadline;
/// call [`HttpTransport::prime`] at startup to keep it off the monitor thread.
#[derive(Debug)]
pub struct HttpTransport {
    timeout: Duration,
    connect_timeout: Duration,
    resolved: Mutex<HashMap<(String, u16), SocketAddr>>,
}

impl HttpTransport {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout: connect_timeout.min(timeout),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve and cache the address of `url`'s host.
    pub fn prime(&self, url: &str) -> Result<SocketAddr, TransportError> {
        let parsed = parse_http_url(url)?;
        self.resolve(&parsed)
    }

    fn resolve(&self, parsed: &ParsedUrl) -> Result<SocketAddr, TransportError> {
        let key = (parsed.host.clone(), parsed.port);
        if let Ok(cache) = self.resolved.lock()
            && let Some(addr) = cache.get(&key)
        {
            return Ok(*addr);
        }

        let addr = lookup(&parsed.host, parsed.port)?;
        debug!(host = %parsed.host, %addr, "Collector address resolved");
        if let Ok(mut cache) = self.resolved.lock() {
            cache.insert(key, addr);
        }
        Ok(addr)
    }
}

fn lookup(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .map_err(|err| TransportError::Dns(err.to_string()))?
        .next()
        .ok_or_else(|| TransportError::Dns("no addresses resolved".to_string()))
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }
}

impl CollectorTransport for HttpTransport {
    fn post_json(&self, url: &str, body: &str) -> Result<u16, TransportError> {
        let parsed = parse_http_url(url)?;
        let addr = self.resolve(&parsed)?;
        let deadline = Instant::now() + self.timeout;

        let connect_timeout = self.connect_timeout.min(remaining(deadline)?);
        let mut stream = TcpStream::connect_timeout(&addr, connect_timeout)
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let request = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {length}\r\n\
             Connection: close\r\n\r\n{body}",
            path = parsed.path,
            host = parsed.host_header(),
            length = body.len(),
        );
        stream
            .set_write_timeout(Some(remaining(deadline)?))
            .map_err(io_error)?;
        stream.write_all(request.as_bytes()).map_err(io_error)?;

        let head = read_response_head(&mut stream, deadline)?;
        parse_status_code(&head)
    }
}

/// Read until the end of the response headers, the peer closing, or the deadline.
fn read_response_head(stream: &mut TcpStream, deadline: Instant) -> Result<String, TransportError> {
    let mut head = Vec::new();
    let mut buf = [0u8; 512];
    loop {
        stream
            .set_read_timeout(Some(remaining(deadline)?))
            .map_err(io_error)?;
        let read = stream.read(&mut buf).map_err(io_error)?;
        if read == 0 {
            break;
        }
        head.extend_from_slice(&buf[..read]);
        if head.windows(4).any(|window| window == b"\r\n\r\n") || head.len() > MAX_RESPONSE_HEAD {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

fn parse_status_code(response: &str) -> Result<u16, TransportError> {
    let status_line = response
        .lines()
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| TransportError::MalformedResponse("missing status line".to_string()))?;
    let mut parts = status_line.split_whitespace();
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => {
            return Err(TransportError::MalformedResponse(format!(
                "unexpected status line: {status_line}"
            )));
        }
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            TransportError::MalformedResponse(format!("invalid status line: {status_line}"))
        })
}

fn remaining(deadline: Instant) -> Result<Duration, TransportError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(TransportError::Timeout)
    } else {
        Ok(left)
    }
}

fn io_error(err: std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => TransportError::Timeout,
        _ => TransportError::Io(err.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    /// Host name or IP literal, without IPv6 brackets.
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl ParsedUrl {
    fn host_header(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == 80 {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }
}

/// Split an `http://host[:port][/path]` URL. IPv6 hosts must be bracketed.
pub fn parse_http_url(endpoint: &str) -> Result<ParsedUrl, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidUrl(format!("{endpoint}: {reason}"));
    let rest = endpoint
        .strip_prefix("http://")
        .ok_or_else(|| invalid("only http:// supported"))?;

    let (authority, path) = match rest.find('/') {
        Some(index) => (&rest[..index], &rest[index..]),
        None => (rest, "/"),
    };

    let (host, port) = match authority.strip_prefix('[') {
        Some(bracketed) => {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| invalid("unterminated IPv6 host"))?;
            if host.parse::<std::net::Ipv6Addr>().is_err() {
                return Err(invalid("invalid IPv6 host"));
            }
            let port = match after {
                "" => None,
                other => Some(
                    other
                        .strip_prefix(':')
                        .ok_or_else(|| invalid("unexpected text after IPv6 host"))?,
                ),
            };
            (host, port)
        }
        None => match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        },
    };
    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    let port = match port {
        Some(port) if !port.is_empty() => {
            port.parse::<u16>().map_err(|_| invalid("invalid port"))?
        }
        _ => 80,
    };

    Ok(ParsedUrl {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}
