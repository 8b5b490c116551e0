// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::ffi::OsStr;

use chrono::{DateTime, TimeZone, Utc};
use data_encoding::BASE64;
use rstest::{fixture, rstest};

use super::{LOG_PACKET_LENGTH, PRIORITY, Sequence, WriteRecord, frame_write};
use crate::Error;

const HOST: &str = "auditbox";

#[fixture]
fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 3, 5, 7, 8, 9).unwrap()
}

fn record<'a>(path: &'a str, data: &'a [u8], offset: u64) -> WriteRecord<'a> {
    WriteRecord {
        path: OsStr::new(path),
        data,
        offset,
    }
}

/// Split a datagram into its sequence number and everything after it
fn split_datagram(datagram: &[u8]) -> (u32, &[u8]) {
    let marker = b":00000000 ";
    let at = datagram
        .windows(marker.len())
        .position(|w| w == marker)
        .expect("datagram should have a reserved field")
        + marker.len();
    let seq = std::str::from_utf8(&datagram[at..at + 8]).unwrap();
    assert_eq!(datagram[at + 8], b' ');
    (u32::from_str_radix(seq, 16).unwrap(), &datagram[at + 9..])
}

/// Reassemble the written bytes from a run of datagrams
fn reassemble(datagrams: &[Vec<u8>]) -> (String, Vec<u8>) {
    let mut prefix = String::new();
    let mut encoded = Vec::new();
    for (i, datagram) in datagrams.iter().enumerate() {
        let (_, mut rest) = split_datagram(datagram);
        if i == 0 {
            let space = rest.iter().position(|b| *b == b' ').unwrap();
            prefix = String::from_utf8(rest[..space].to_vec()).unwrap();
            rest = &rest[space + 1..];
        }
        encoded.extend_from_slice(rest);
    }
    (prefix, BASE64.decode(&encoded).unwrap())
}

#[rstest]
fn test_priority_is_audit_notice() {
    assert_eq!(PRIORITY, 109);
}

#[rstest]
fn test_single_small_write(timestamp: DateTime<Utc>) {
    let mut seq = Sequence::new();
    let datagrams = frame_write(HOST, &timestamp, &record("/a.log", b"hello\n", 0), &mut seq)
        .expect("should frame");
    assert_eq!(datagrams.len(), 1);
    assert_eq!(
        String::from_utf8(datagrams[0].clone()).unwrap(),
        "<109>Mar  5 07:08:09 auditbox /a.log:00000000 00000001 6@0 aGVsbG8K"
    );
    assert_eq!(seq.current(), 1);
}

#[rstest]
fn test_multi_chunk_write(timestamp: DateTime<Utc>) {
    let data = vec![b'A'; 2048];
    let mut seq = Sequence::new();
    let datagrams =
        frame_write(HOST, &timestamp, &record("/big", &data, 0), &mut seq).expect("should frame");

    assert!(datagrams.len() >= 2);
    for (i, datagram) in datagrams.iter().enumerate() {
        assert!(datagram.len() <= LOG_PACKET_LENGTH);
        let (number, rest) = split_datagram(datagram);
        assert_eq!(number as usize, i + 1, "sequence should have no gaps");
        assert_eq!(
            rest.starts_with(b"800@0 "),
            i == 0,
            "only the first datagram carries the length prefix"
        );
    }
    let (prefix, decoded) = reassemble(&datagrams);
    assert_eq!(prefix, "800@0");
    assert_eq!(decoded, data);
    assert_eq!(seq.current() as usize, datagrams.len());
}

#[rstest]
fn test_offset_is_hex(timestamp: DateTime<Utc>) {
    let mut seq = Sequence::new();
    let datagrams = frame_write(
        HOST,
        &timestamp,
        &record("/ttyout", b"0123456789abcdef0123", 0x1f40),
        &mut seq,
    )
    .unwrap();
    let (_, rest) = split_datagram(&datagrams[0]);
    assert!(rest.starts_with(b"14@1f40 "));
}

#[rstest]
fn test_empty_write_emits_one_datagram(timestamp: DateTime<Utc>) {
    let mut seq = Sequence::new();
    let datagrams = frame_write(HOST, &timestamp, &record("/a.log", b"", 31), &mut seq).unwrap();
    assert_eq!(datagrams.len(), 1);
    let (number, rest) = split_datagram(&datagrams[0]);
    assert_eq!(number, 1);
    assert_eq!(rest, b"0@1f ");
}

#[rstest]
// 720 bytes encode to 960 characters, which fits in the first datagram
// alongside its prefix, 723 bytes do not
#[case(720, 1)]
#[case(723, 2)]
fn test_first_chunk_boundary(
    timestamp: DateTime<Utc>,
    #[case] size: usize,
    #[case] expected: usize,
) {
    let data = vec![0xa5; size];
    let mut seq = Sequence::new();
    let datagrams = frame_write(HOST, &timestamp, &record("/a.log", &data, 0), &mut seq).unwrap();
    assert_eq!(datagrams.len(), expected);
    assert!(datagrams.iter().all(|d| d.len() < LOG_PACKET_LENGTH));
    assert_eq!(reassemble(&datagrams).1, data);
}

#[rstest]
fn test_sequence_continues_across_writes(timestamp: DateTime<Utc>) {
    let mut seq = Sequence::new();
    let first = frame_write(HOST, &timestamp, &record("/b", &[1; 1500], 0), &mut seq).unwrap();
    let second = frame_write(HOST, &timestamp, &record("/b", b"xyz", 1500), &mut seq).unwrap();
    let numbers: Vec<_> = first
        .iter()
        .chain(second.iter())
        .map(|d| split_datagram(d).0)
        .collect();
    let expected: Vec<_> = (1..=numbers.len() as u32).collect();
    assert_eq!(numbers, expected);
    let (_, rest) = split_datagram(&second[0]);
    assert!(rest.starts_with(b"3@5dc "));
}

#[rstest]
fn test_filename_too_long(timestamp: DateTime<Utc>) {
    let path = format!("/{}", "n".repeat(999));
    let mut seq = Sequence::new();
    let err = frame_write(HOST, &timestamp, &record(&path, b"data", 0), &mut seq)
        .expect_err("header cannot fit");
    assert!(matches!(err, Error::FilenameTooLong { .. }), "{err:?}");
    assert_eq!(seq.current(), 0, "no sequence numbers should be consumed");
}

#[rstest]
fn test_insufficient_packet_space(timestamp: DateTime<Utc>) {
    // leaves 124 bytes of room, just under the minimum
    let path = format!("/{}", "n".repeat(849));
    let mut seq = Sequence::new();
    let err = frame_write(HOST, &timestamp, &record(&path, b"", 0), &mut seq)
        .expect_err("too little room for payload");
    assert!(
        matches!(err, Error::InsufficientPacketSpace { available: 124, .. }),
        "{err:?}"
    );
    assert_eq!(seq.current(), 0);
}

#[rstest]
fn test_minimum_packet_space_is_accepted(timestamp: DateTime<Utc>) {
    // leaves exactly 128 bytes of room
    let path = format!("/{}", "n".repeat(845));
    let data = vec![b'z'; 300];
    let mut seq = Sequence::new();
    let datagrams = frame_write(HOST, &timestamp, &record(&path, &data, 0), &mut seq).unwrap();
    assert!(datagrams.len() > 1);
    assert!(datagrams.iter().all(|d| d.len() <= LOG_PACKET_LENGTH - 1));
    assert_eq!(reassemble(&datagrams).1, data);
}

#[rstest]
fn test_day_of_month_is_space_padded() {
    let timestamp = Utc.with_ymd_and_hms(2024, 12, 25, 23, 59, 1).unwrap();
    let mut seq = Sequence::new();
    let datagrams = frame_write(HOST, &timestamp, &record("/a", b"", 0), &mut seq).unwrap();
    assert!(datagrams[0].starts_with(b"<109>Dec 25 23:59:01 auditbox /a:"));
}

#[rstest]
fn test_sequence_wraps_to_zero() {
    let mut seq = Sequence::from(u32::MAX - 1);
    assert_eq!(seq.advance(), u32::MAX);
    assert_eq!(seq.advance(), 0);
    assert_eq!(seq.advance(), 1);
}
