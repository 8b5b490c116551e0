// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Host primitives that are not covered by std.
//!
//! Extended attributes are always handled without following symlinks.

use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use nix::sys::stat::UtimensatFlags;
use nix::sys::time::TimeSpec;
use sudolog::Error;

use crate::Result;

#[cfg(test)]
#[path = "./host_test.rs"]
mod host_test;

fn c_path(path: &Path) -> Result<CString> {
    c_string(path.as_os_str())
}

fn c_string(value: &OsStr) -> Result<CString> {
    CString::new(value.as_bytes())
        .map_err(|_| Error::from(std::io::Error::from_raw_os_error(libc::EINVAL)).into())
}

/// A time to apply with [`utimens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTime {
    /// Leave the current value alone
    Omit,
    /// Use the current time of the host
    Now,
    Specific(SystemTime),
}

impl From<SetTime> for TimeSpec {
    fn from(time: SetTime) -> Self {
        match time {
            SetTime::Omit => TimeSpec::UTIME_OMIT,
            SetTime::Now => TimeSpec::UTIME_NOW,
            SetTime::Specific(time) => match time.duration_since(UNIX_EPOCH) {
                Ok(since) => TimeSpec::from(since),
                Err(err) => -TimeSpec::from(err.duration()),
            },
        }
    }
}

/// Change the access and modification times of a file.
pub fn utimens(path: &Path, atime: SetTime, mtime: SetTime) -> Result<()> {
    nix::sys::stat::utimensat(
        None,
        path,
        &TimeSpec::from(atime),
        &TimeSpec::from(mtime),
        UtimensatFlags::FollowSymlink,
    )
    .map_err(|errno| Error::Errno("utimensat".into(), errno.into()).into())
}

/// Rename with `RENAME_EXCHANGE`/`RENAME_NOREPLACE` style flags.
///
/// Flags the host does not know, or hosts without a flagged rename,
/// fail with [`Error::UnsupportedRenameFlags`].
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub fn rename_with_flags(from: &Path, to: &Path, flags: u32) -> Result<()> {
    use nix::errno::Errno;
    use nix::fcntl::RenameFlags;

    let Some(rename_flags) = RenameFlags::from_bits(flags) else {
        return Err(Error::UnsupportedRenameFlags(flags).into());
    };
    match nix::fcntl::renameat2(None, from, None, to, rename_flags) {
        Ok(()) => Ok(()),
        Err(Errno::ENOSYS) => Err(Error::UnsupportedRenameFlags(flags).into()),
        Err(errno) => Err(Error::Errno("renameat2".into(), errno.into()).into()),
    }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
pub fn rename_with_flags(_from: &Path, _to: &Path, flags: u32) -> Result<()> {
    Err(Error::UnsupportedRenameFlags(flags).into())
}

/// Run an xattr call that fills a buffer, returning the used length.
///
/// An empty buffer asks the host for the size that would be needed.
fn xattr_read<F>(name: &str, buf: &mut [u8], call: F) -> Result<usize>
where
    F: FnOnce(*mut libc::c_void, libc::size_t) -> libc::ssize_t,
{
    let ptr = if buf.is_empty() {
        std::ptr::null_mut()
    } else {
        buf.as_mut_ptr() as *mut libc::c_void
    };
    let res = call(ptr, buf.len());
    if res < 0 {
        return Err(Error::last_os_error(name).into());
    }
    Ok(res as usize)
}

pub fn lgetxattr(path: &Path, name: &OsStr, buf: &mut [u8]) -> Result<usize> {
    let path = c_path(path)?;
    let name = c_string(name)?;
    xattr_read("lgetxattr", buf, |value, size| {
        // Safety: strings are nul-terminated and value is either null
        // or points to a writable buffer of at least size bytes
        unsafe { libc::lgetxattr(path.as_ptr(), name.as_ptr(), value, size) }
    })
}

pub fn llistxattr(path: &Path, buf: &mut [u8]) -> Result<usize> {
    let path = c_path(path)?;
    xattr_read("llistxattr", buf, |list, size| {
        // Safety: path is nul-terminated and list is either null
        // or points to a writable buffer of at least size bytes
        unsafe { libc::llistxattr(path.as_ptr(), list as *mut libc::c_char, size) }
    })
}

pub fn lsetxattr(path: &Path, name: &OsStr, value: &[u8], flags: i32) -> Result<()> {
    let path = c_path(path)?;
    let name = c_string(name)?;
    // Safety: strings are nul-terminated and value is a live buffer
    // of exactly value.len() bytes
    let res = unsafe {
        libc::lsetxattr(
            path.as_ptr(),
            name.as_ptr(),
            value.as_ptr() as *const libc::c_void,
            value.len(),
            flags,
        )
    };
    if res < 0 {
        return Err(Error::last_os_error("lsetxattr").into());
    }
    Ok(())
}

pub fn lremovexattr(path: &Path, name: &OsStr) -> Result<()> {
    let path = c_path(path)?;
    let name = c_string(name)?;
    // Safety: both strings are nul-terminated and live for the call
    let res = unsafe { libc::lremovexattr(path.as_ptr(), name.as_ptr()) };
    if res < 0 {
        return Err(Error::last_os_error("lremovexattr").into());
    }
    Ok(())
}
