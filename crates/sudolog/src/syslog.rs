// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Framing of written data into syslog datagrams.
//!
//! Every write is rendered as one or more single-line records:
//!
//! ```text
//! <PRIO>MMM DD HH:MM:SS HOST PATH:00000000 SSSSSSSS [LEN@OFFSET ]PAYLOAD
//! ```
//!
//! The payload is the base64 form of the written bytes, split across
//! as many datagrams as needed to keep each one within
//! [`LOG_PACKET_LENGTH`]. Only the first datagram of a write carries
//! the `LEN@OFFSET` prefix. A receiver rebuilds the written bytes by
//! concatenating the payloads of a run in sequence order and decoding.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use chrono::{DateTime, Utc};
use data_encoding::BASE64;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./syslog_test.rs"]
mod syslog_test;

/// The largest datagram that will ever be emitted.
pub const LOG_PACKET_LENGTH: usize = 1024;
/// The smallest payload capacity worth sending a datagram for.
pub const MIN_BUF_SPACE: usize = 128;

/// The `log_audit` facility.
pub const FACILITY_AUDIT: u8 = 13;
/// The `notice` severity.
pub const SEVERITY_NOTICE: u8 = 5;
/// The syslog priority value of every record.
pub const PRIORITY: u8 = (FACILITY_AUDIT << 3) | SEVERITY_NOTICE;

/// Month abbreviation, space-padded day and 24 hour time, always in UTC.
pub const TIMESTAMP_FORMAT: &str = "%b %e %T";

/// Reserved field following the path, kept for receiver compatibility.
const RESERVED_FIELD: &[u8] = b":00000000 ";
/// Width of the hexadecimal sequence field, excluding its trailing space.
const SEQUENCE_WIDTH: usize = 8;

/// The per-handle counter that orders datagrams.
///
/// Counting starts at zero and the counter is advanced before each
/// datagram is stamped, so the first datagram on a new handle carries
/// sequence 1. After 2^32 datagrams it wraps back to zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sequence(u32);

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value carried by the most recently stamped datagram.
    pub fn current(&self) -> u32 {
        self.0
    }

    /// Advance the counter, returning the value to stamp.
    pub fn advance(&mut self) -> u32 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }
}

impl From<u32> for Sequence {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// One successful write, as seen at the mount.
#[derive(Debug, Clone, Copy)]
pub struct WriteRecord<'a> {
    /// The virtual path that was written, verbatim.
    pub path: &'a OsStr,
    /// The bytes that were handed to the write.
    pub data: &'a [u8],
    /// The file offset of the write.
    pub offset: u64,
}

/// Render a write into its datagrams, advancing `seq` once per datagram.
///
/// Fails without touching `seq` when the header leaves no usable room
/// for payload in a datagram.
pub fn frame_write(
    hostname: &str,
    timestamp: &DateTime<Utc>,
    record: &WriteRecord<'_>,
    seq: &mut Sequence,
) -> Result<Vec<Vec<u8>>> {
    let prefix = format!(
        "<{PRIORITY}>{} {hostname} ",
        timestamp.format(TIMESTAMP_FORMAT)
    );
    let mut header = Vec::with_capacity(LOG_PACKET_LENGTH);
    header.extend_from_slice(prefix.as_bytes());
    header.extend_from_slice(record.path.as_bytes());
    header.extend_from_slice(RESERVED_FIELD);
    let sequence_at = header.len();
    header.extend_from_slice(b"00000000 ");
    let header_len = header.len();

    if header_len >= LOG_PACKET_LENGTH - 1 {
        return Err(Error::FilenameTooLong {
            path: record.path.to_string_lossy().into_owned(),
            limit: LOG_PACKET_LENGTH,
        });
    }
    let chunk = LOG_PACKET_LENGTH - 1 - header_len;
    if chunk < MIN_BUF_SPACE {
        return Err(Error::InsufficientPacketSpace {
            available: chunk,
            required: MIN_BUF_SPACE,
        });
    }

    let first_prefix = format!("{:x}@{:x} ", record.data.len(), record.offset);
    let encoded = BASE64.encode(record.data);

    let mut datagrams = Vec::with_capacity(encoded.len() / chunk + 1);
    let mut prefix: &[u8] = first_prefix.as_bytes();
    let mut remaining = encoded.as_bytes();
    loop {
        let take = remaining.len().min(chunk - prefix.len());
        let (payload, rest) = remaining.split_at(take);

        let mut datagram = Vec::with_capacity(header_len + prefix.len() + take);
        datagram.extend_from_slice(&header);
        let stamp = format!("{:08x}", seq.advance());
        datagram[sequence_at..sequence_at + SEQUENCE_WIDTH].copy_from_slice(stamp.as_bytes());
        datagram.extend_from_slice(prefix);
        datagram.extend_from_slice(payload);
        datagrams.push(datagram);

        prefix = &b""[..];
        remaining = rest;
        if remaining.is_empty() {
            break;
        }
    }
    Ok(datagrams)
}
