// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./collector_test.rs"]
mod collector_test;

/// The standard syslog port, used when a collector is given without one.
pub const DEFAULT_SYSLOG_PORT: u16 = 514;

/// A remote syslog endpoint, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSpec {
    spec: String,
    host: String,
    port: u16,
}

impl CollectorSpec {
    /// The original `host[:port]` string.
    pub fn as_str(&self) -> &str {
        &self.spec
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Look up the collector address.
    ///
    /// This happens exactly once for the lifetime of the mount, the
    /// first address returned by the resolver is used.
    pub fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| Error::ResolveCollector {
                spec: self.spec.clone(),
                source,
            })?;
        addrs.next().ok_or_else(|| Error::ResolveCollector {
            spec: self.spec.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "host resolved to no addresses",
            ),
        })
    }
}

impl std::fmt::Display for CollectorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.spec)
    }
}

impl std::str::FromStr for CollectorSpec {
    type Err = Error;

    /// Parse `host`, `host:port`, `[v6addr]` or `[v6addr]:port`.
    ///
    /// A bare IPv6 address (more than one colon, no brackets) is taken
    /// as a host without a port.
    fn from_str(spec: &str) -> Result<Self> {
        let invalid = || Error::InvalidCollector(spec.to_string());
        let (host, port) = if let Some(rest) = spec.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
            match rest {
                "" => (host, None),
                _ => (host, Some(rest.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match spec.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, Some(port)),
                _ => (spec, None),
            }
        };
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let port = match port {
            None => DEFAULT_SYSLOG_PORT,
            Some(port) => match port.parse::<u16>() {
                Ok(0) | Err(_) => return Err(invalid()),
                Ok(port) => port,
            },
        };
        Ok(Self {
            spec: spec.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

/// Sends finished datagrams to the collector.
///
/// The socket is unconnected and bound once, and the destination is
/// the address resolved at startup. Neither changes afterwards, so the
/// emitter can be shared freely between request threads.
#[derive(Debug)]
pub struct Emitter {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl Emitter {
    /// Open a datagram socket suitable for reaching the given address.
    pub fn open(destination: SocketAddr) -> Result<Self> {
        let local: SocketAddr = match destination {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).map_err(Error::OpenSocket)?;
        Ok(Self {
            socket,
            destination,
        })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Send a single datagram, returning the number of bytes sent.
    pub fn send(&self, datagram: &[u8]) -> std::io::Result<usize> {
        self.socket.send_to(datagram, self.destination)
    }
}
