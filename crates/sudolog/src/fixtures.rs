// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Helpers for testing code that talks to a collector.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use data_encoding::BASE64;

use crate::syslog::LOG_PACKET_LENGTH;

/// A loopback UDP endpoint that stands in for a remote syslog server.
pub struct TestCollector {
    socket: UdpSocket,
}

impl TestCollector {
    pub fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").expect("bind loopback collector");
        Self { socket }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().expect("collector has an address")
    }

    /// Receive exactly `count` datagrams, failing the test on timeout.
    pub fn expect(&self, count: usize) -> Vec<Datagram> {
        self.socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("set collector timeout");
        (0..count)
            .map(|i| {
                let mut buf = vec![0; LOG_PACKET_LENGTH * 2];
                let len = self
                    .socket
                    .recv(&mut buf)
                    .unwrap_or_else(|err| panic!("expected datagram #{i}: {err}"));
                buf.truncate(len);
                Datagram(buf)
            })
            .collect()
    }

    /// Collect whatever arrives until the line goes quiet.
    pub fn drain(&self) -> Vec<Datagram> {
        self.socket
            .set_read_timeout(Some(Duration::from_millis(250)))
            .expect("set collector timeout");
        let mut received = Vec::new();
        let mut buf = vec![0; LOG_PACKET_LENGTH * 2];
        while let Ok(len) = self.socket.recv(&mut buf) {
            received.push(Datagram(buf[..len].to_vec()));
        }
        received
    }
}

/// One received record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram(pub Vec<u8>);

impl Datagram {
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("datagrams are ascii")
    }

    fn fields(&self) -> (&str, u32, &str) {
        let text = self.as_str();
        let (before, after) = text
            .split_once(":00000000 ")
            .expect("datagram has a reserved field");
        let (seq, rest) = after.split_at(8);
        let seq = u32::from_str_radix(seq, 16).expect("sequence is hex");
        (before, seq, &rest[1..])
    }

    /// The path field, as written by the sender.
    pub fn path(&self) -> &str {
        let (before, _, _) = self.fields();
        before.rsplit_once(' ').map(|(_, path)| path).unwrap_or(before)
    }

    pub fn sequence(&self) -> u32 {
        self.fields().1
    }

    /// The `LEN@OFFSET` prefix, present only on the first datagram of a write.
    pub fn prefix(&self) -> Option<(usize, u64)> {
        let (_, _, rest) = self.fields();
        let (prefix, _) = rest.split_once(' ')?;
        let (len, offset) = prefix.split_once('@')?;
        Some((
            usize::from_str_radix(len, 16).ok()?,
            u64::from_str_radix(offset, 16).ok()?,
        ))
    }

    /// The base64 text carried by this datagram.
    pub fn payload(&self) -> &str {
        let (_, _, rest) = self.fields();
        match rest.split_once(' ') {
            Some((_, payload)) => payload,
            None => rest,
        }
    }
}

/// Decode the concatenated payloads of a run of datagrams.
pub fn reassemble(datagrams: &[Datagram]) -> Vec<u8> {
    let mut ordered = datagrams.to_vec();
    ordered.sort_by_key(Datagram::sequence);
    let encoded: String = ordered.iter().map(Datagram::payload).collect();
    BASE64
        .decode(encoded.as_bytes())
        .expect("payloads reassemble to valid base64")
}
