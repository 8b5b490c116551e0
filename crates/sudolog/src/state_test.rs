// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use rstest::rstest;

use super::{MountOptions, MountState, node_hostname, validate_hostname};
use crate::fixtures::TestCollector;
use crate::Error;

fn options(root: &std::path::Path, collector: &TestCollector) -> MountOptions {
    MountOptions {
        root: root.to_owned(),
        mountpoint: "/var/log/sudo-io".into(),
        collector: collector.addr().to_string().parse().unwrap(),
        hostname: None,
    }
}

#[rstest]
#[case("db01")]
#[case("db01.example.com")]
#[case("10.1.2.3")]
fn test_validate_hostname(#[case] name: &str) {
    assert_eq!(validate_hostname(name).unwrap(), name);
}

#[rstest]
#[case("")]
#[case("db 01")]
#[case("db01\n")]
#[case("\tdb01")]
fn test_validate_hostname_rejects(#[case] name: &str) {
    let err = validate_hostname(name).expect_err("should be refused");
    assert!(matches!(err, Error::InvalidHostname(_)));
}

#[rstest]
fn test_node_hostname_is_usable() {
    let name = node_hostname().expect("host should have a node name");
    assert!(!name.is_empty());
}

#[rstest]
fn test_open_mount_state() {
    let tmpdir = tempfile::tempdir().unwrap();
    let collector = TestCollector::bind();
    let mut opts = options(tmpdir.path(), &collector);
    opts.hostname = Some("auditbox".into());

    let state = MountState::open(opts).expect("should open");
    assert_eq!(state.root().path(), tmpdir.path().canonicalize().unwrap());
    assert_eq!(state.mirror().hostname(), "auditbox");
    assert_eq!(state.mirror().emitter().destination(), collector.addr());
    assert_eq!(state.mountpoint(), std::path::Path::new("/var/log/sudo-io"));
}

#[rstest]
fn test_open_derives_hostname() {
    let tmpdir = tempfile::tempdir().unwrap();
    let collector = TestCollector::bind();
    let state = MountState::open(options(tmpdir.path(), &collector)).unwrap();
    assert_eq!(state.mirror().hostname(), node_hostname().unwrap());
}

#[rstest]
fn test_open_rejects_bad_hostname() {
    let tmpdir = tempfile::tempdir().unwrap();
    let collector = TestCollector::bind();
    let mut opts = options(tmpdir.path(), &collector);
    opts.hostname = Some("two words".into());
    let err = MountState::open(opts).expect_err("should refuse the hostname");
    assert!(matches!(err, Error::InvalidHostname(_)));
}

#[rstest]
fn test_open_rejects_missing_root() {
    let tmpdir = tempfile::tempdir().unwrap();
    let collector = TestCollector::bind();
    let err = MountState::open(options(&tmpdir.path().join("nope"), &collector))
        .expect_err("root must exist");
    assert!(matches!(err, Error::InvalidRoot { .. }));
}
