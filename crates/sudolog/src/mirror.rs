// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use chrono::Utc;

use crate::collector::Emitter;
use crate::syslog::{Sequence, WriteRecord, frame_write};
use crate::Result;

#[cfg(test)]
#[path = "./mirror_test.rs"]
mod mirror_test;

/// Ships the content of writes to the remote collector.
#[derive(Debug)]
pub struct Mirror {
    hostname: String,
    emitter: Emitter,
}

impl Mirror {
    pub fn new(hostname: String, emitter: Emitter) -> Self {
        Self { hostname, emitter }
    }

    /// The source hostname stamped into every record.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Frame and send one write, returning how many datagrams were sent.
    ///
    /// Delivery is best effort: send failures are logged and the
    /// remaining datagrams are still attempted. If the write cannot be
    /// framed at all, nothing is sent and the error is logged and
    /// returned. Callers must not let either outcome affect the write
    /// itself, which has already happened.
    pub fn log_write(&self, record: &WriteRecord<'_>, seq: &mut Sequence) -> Result<usize> {
        let timestamp = Utc::now();
        let datagrams = match frame_write(&self.hostname, &timestamp, record, seq) {
            Ok(datagrams) => datagrams,
            Err(err) => {
                tracing::error!(
                    path = ?record.path,
                    len = record.data.len(),
                    offset = record.offset,
                    "dropping log of write: {err}"
                );
                return Err(err);
            }
        };

        let mut sent = 0;
        for datagram in datagrams.iter() {
            tracing::trace!(
                "sendto {}: {}",
                self.emitter.destination(),
                String::from_utf8_lossy(datagram)
            );
            match self.emitter.send(datagram) {
                Ok(_) => sent += 1,
                Err(err) => {
                    tracing::error!(
                        destination = %self.emitter.destination(),
                        "failed to send log datagram: {err}"
                    );
                }
            }
        }
        Ok(sent)
    }
}
