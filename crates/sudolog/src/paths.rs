// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./paths_test.rs"]
mod paths_test;

/// The longest backing path that will be produced, including the
/// space that the host reserves for a terminating nul.
pub const MAX_BACKING_PATH: usize = libc::PATH_MAX as usize;

/// The backing directory that the mount exposes.
///
/// Virtual paths handed over by the kernel are always absolute
/// (starting with `/`) and relative to the mountpoint. They are
/// mapped onto the backing directory by simple concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    path: PathBuf,
}

impl Root {
    /// Resolve the given directory to its canonical absolute form.
    ///
    /// Fails if the path cannot be resolved or is not a directory.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical = canonicalize_root(path)?;
        let meta = std::fs::metadata(&canonical).map_err(|source| Error::InvalidRoot {
            path: canonical.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(Error::InvalidRoot {
                path: canonical,
                source: std::io::Error::from_raw_os_error(libc::ENOTDIR),
            });
        }
        Ok(Self { path: canonical })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Produce the backing path for a virtual path.
    ///
    /// Results that would exceed [`MAX_BACKING_PATH`] are truncated
    /// silently. Whatever syscall then uses the path reports the problem
    /// (usually as not-found or name-too-long), which is acceptable for
    /// the short, well-known names this filesystem is meant to hold.
    pub fn translate<P: AsRef<OsStr>>(&self, virtual_path: P) -> PathBuf {
        let root = self.path.as_os_str().as_bytes();
        let rest = virtual_path.as_ref().as_bytes();
        let limit = MAX_BACKING_PATH - 1;
        let mut full = Vec::with_capacity((root.len() + rest.len()).min(limit));
        full.extend_from_slice(&root[..root.len().min(limit)]);
        let room = limit - full.len();
        full.extend_from_slice(&rest[..rest.len().min(room)]);
        PathBuf::from(OsStr::from_bytes(&full))
    }
}

fn canonicalize_root(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|source| Error::InvalidRoot {
        path: path.to_owned(),
        source,
    })
}
