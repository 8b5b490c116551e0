// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use rstest::rstest;

use super::{Error, OsError};

#[rstest]
#[case(Error::PermissionDenied { uid: 1000 }, Some(libc::EACCES))]
#[case(Error::UnsupportedRenameFlags(1), Some(libc::EINVAL))]
#[case(Error::IO(std::io::Error::from_raw_os_error(libc::ENOENT)), Some(libc::ENOENT))]
#[case(Error::Nix(nix::errno::Errno::EEXIST), Some(libc::EEXIST))]
#[case(Error::InsufficientPacketSpace { available: 1, required: 128 }, None)]
#[case(Error::InvalidHostname("bad host".into()), None)]
fn test_os_error_mapping(#[case] err: Error, #[case] expected: Option<i32>) {
    assert_eq!(err.os_error(), expected);
}

#[rstest]
fn test_errno_keeps_source_error() {
    let err = Error::Errno(
        "lgetxattr".into(),
        std::io::Error::from_raw_os_error(libc::ENODATA),
    );
    assert_eq!(err.os_error(), Some(libc::ENODATA));
    assert!(err.to_string().starts_with("lgetxattr: "));
}
