// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::path::PathBuf;

use rstest::rstest;
use sudolog::OsError;

use super::{HandleTable, OpenDir, OpenFile};

fn scratch_file() -> (tempfile::TempDir, OpenFile) {
    let tmpdir = tempfile::tempdir().unwrap();
    let file = std::fs::File::create(tmpdir.path().join("f")).unwrap();
    (tmpdir, OpenFile::new(file, PathBuf::from("/f")))
}

#[rstest]
fn test_handles_are_never_zero_or_reused() {
    let table = HandleTable::new();
    let (_tmpdir, first) = scratch_file();
    let (_tmpdir2, second) = scratch_file();
    let a = table.insert_file(first);
    let b = table.insert_file(second);
    let c = table.insert_dir(OpenDir::new("/".into(), Vec::new()));
    assert_ne!(a, 0);
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_eq!(table.len(), 3);
}

#[rstest]
fn test_kind_mismatch_is_reported() {
    let table = HandleTable::new();
    let (_tmpdir, file) = scratch_file();
    let fh = table.insert_file(file);
    let dh = table.insert_dir(OpenDir::new("/".into(), Vec::new()));

    let err = table.dir(fh).expect_err("a file is not a directory");
    assert_eq!(err.os_error(), Some(libc::ENOTDIR));
    let err = table.file(dh).expect_err("a directory is not a file");
    assert_eq!(err.os_error(), Some(libc::EISDIR));
    assert!(table.remove_dir(fh).is_err());
    assert_eq!(table.len(), 2, "mismatched removals leave handles open");
}

#[rstest]
fn test_remove_releases_exactly_once() {
    let table = HandleTable::new();
    let (_tmpdir, file) = scratch_file();
    let fh = table.insert_file(file);

    table.remove_file(fh).expect("first release succeeds");
    let err = table.remove_file(fh).expect_err("second release fails");
    assert_eq!(err.os_error(), Some(libc::EBADF));
    assert_eq!(table.len(), 0);
}

#[rstest]
fn test_sequence_starts_fresh_per_handle() {
    let table = HandleTable::new();
    let (_tmpdir, file) = scratch_file();
    let fh = table.insert_file(file);
    let handle = table.file(fh).unwrap();
    assert_eq!(handle.sequence().advance(), 1);
    assert_eq!(handle.sequence().advance(), 2);

    let (_tmpdir2, file) = scratch_file();
    let other = table.file(table.insert_file(file)).unwrap();
    assert_eq!(other.sequence().current(), 0);
}
