// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::fs::{File, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./sanitize_test.rs"]
mod sanitize_test;

const SETID_BITS: u32 = libc::S_ISUID | libc::S_ISGID;
const PERMISSION_BITS: u32 = 0o7777;

/// Drop the set-user-ID and set-group-ID bits from a backing file.
///
/// Must run before any change to a file's content or ownership, the way
/// the kernel does for its own filesystems. Files without either bit are
/// left untouched. A failure to stat the file is returned so that the
/// triggering operation is not attempted.
///
/// Symlinks are not followed. A link has no set-id bits of its own and
/// its target is not the file being changed.
pub fn clear_setid_bits(path: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(path)
        .map_err(|err| Error::Errno(format!("lstat {path:?}"), err))?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mode = meta.permissions().mode();
    if mode & SETID_BITS == 0 {
        return Ok(());
    }
    let cleared = mode & PERMISSION_BITS & !SETID_BITS;
    tracing::debug!("clearing setid bits on {path:?}: {mode:o} -> {cleared:o}");
    std::fs::set_permissions(path, Permissions::from_mode(cleared))
        .map_err(|err| Error::Errno(format!("chmod {path:?}"), err))
}

/// Drop the set-user-ID and set-group-ID bits through an open descriptor.
///
/// Behaves like [`clear_setid_bits`], but keeps working for files that
/// were renamed or unlinked after being opened.
pub fn clear_setid_bits_fd(file: &File) -> Result<()> {
    let mode = file
        .metadata()
        .map_err(|err| Error::Errno("fstat".into(), err))?
        .permissions()
        .mode();
    if mode & SETID_BITS == 0 {
        return Ok(());
    }
    let cleared = mode & PERMISSION_BITS & !SETID_BITS;
    tracing::debug!("clearing setid bits on open file: {mode:o} -> {cleared:o}");
    file.set_permissions(Permissions::from_mode(cleared))
        .map_err(|err| Error::Errno("fchmod".into(), err))
}
