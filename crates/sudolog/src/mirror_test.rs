// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::ffi::OsStr;

use chrono::{DateTime, Utc};
use rstest::rstest;

use super::Mirror;
use crate::collector::Emitter;
use crate::fixtures::{TestCollector, reassemble};
use crate::syslog::{Sequence, TIMESTAMP_FORMAT, WriteRecord};
use crate::Error;

fn mirror_for(collector: &TestCollector) -> Mirror {
    Mirror::new(
        "auditbox".into(),
        Emitter::open(collector.addr()).unwrap(),
    )
}

#[rstest]
fn test_log_write_delivers_record() {
    let collector = TestCollector::bind();
    let mirror = mirror_for(&collector);
    let mut seq = Sequence::new();
    let record = WriteRecord {
        path: OsStr::new("/a.log"),
        data: b"hello\n",
        offset: 0,
    };

    let sent = mirror.log_write(&record, &mut seq).expect("should send");
    assert_eq!(sent, 1);

    let received = collector.expect(1);
    assert!(
        received[0]
            .as_str()
            .ends_with(" auditbox /a.log:00000000 00000001 6@0 aGVsbG8K"),
        "{}",
        received[0].as_str()
    );
}

#[rstest]
fn test_log_write_timestamp_is_utc() {
    let collector = TestCollector::bind();
    let mirror = mirror_for(&collector);
    let before = Utc::now().timestamp();
    let mut seq = Sequence::new();
    let record = WriteRecord {
        path: OsStr::new("/t"),
        data: b"x",
        offset: 0,
    };
    mirror.log_write(&record, &mut seq).unwrap();
    let after = Utc::now().timestamp();

    let received = collector.expect(1);
    let text = received[0].as_str();
    let stamp = &text["<109>".len().."<109>".len() + 15];
    let candidates: Vec<_> = (before..=after)
        .filter_map(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .collect();
    assert!(
        candidates.iter().any(|c| c == stamp),
        "{stamp:?} not in {candidates:?}"
    );
}

#[rstest]
fn test_log_write_large_buffer_round_trips() {
    let collector = TestCollector::bind();
    let mirror = mirror_for(&collector);
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    let mut seq = Sequence::new();
    let record = WriteRecord {
        path: OsStr::new("/ttyout"),
        data: &data,
        offset: 4096,
    };

    let sent = mirror.log_write(&record, &mut seq).unwrap();
    let received = collector.expect(sent);
    assert_eq!(received[0].prefix(), Some((5000, 4096)));
    assert!(received[1..].iter().all(|d| d.prefix().is_none()));
    assert_eq!(reassemble(&received), data);
}

#[rstest]
fn test_log_write_unframeable_sends_nothing() {
    let collector = TestCollector::bind();
    let mirror = mirror_for(&collector);
    let path = format!("/{}", "p".repeat(2000));
    let mut seq = Sequence::new();
    let record = WriteRecord {
        path: OsStr::new(&path),
        data: b"lost",
        offset: 0,
    };

    let err = mirror
        .log_write(&record, &mut seq)
        .expect_err("should refuse to frame");
    assert!(matches!(err, Error::FilenameTooLong { .. }));
    assert!(collector.drain().is_empty());
}
