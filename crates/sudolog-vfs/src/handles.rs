// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use sudolog::Sequence;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./handles_test.rs"]
mod handles_test;

/// A file opened on behalf of the kernel.
#[derive(Debug)]
pub struct OpenFile {
    file: File,
    path: PathBuf,
    seq: Mutex<Sequence>,
}

impl OpenFile {
    /// Wrap a backing file opened for the given virtual path.
    pub fn new(file: File, path: PathBuf) -> Self {
        Self {
            file,
            path,
            seq: Mutex::new(Sequence::new()),
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// The virtual path this file was opened through.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take exclusive ownership of the write sequence.
    ///
    /// The guard must be held across the backing write and the
    /// emission of its log datagrams so that no other write on this
    /// handle can interleave its sequence numbers.
    pub fn sequence(&self) -> MutexGuard<'_, Sequence> {
        self.seq.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: std::fs::FileType,
    pub ino: u64,
}

/// A snapshot of a directory taken when it was opened.
#[derive(Debug)]
pub struct OpenDir {
    path: PathBuf,
    entries: Vec<DirEntry>,
}

impl OpenDir {
    pub fn new(path: PathBuf, entries: Vec<DirEntry>) -> Self {
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone)]
enum Handle {
    File(Arc<OpenFile>),
    Dir(Arc<OpenDir>),
}

/// The open handles of a mount, keyed by the number given to the kernel.
///
/// Handles are stored once at open and removed once at release, which
/// drops the backing descriptor.
#[derive(Debug)]
pub struct HandleTable {
    next_handle: AtomicU64,
    handles: DashMap<u64, Handle>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            // we do not allocate handle 0, so skip it for now
            next_handle: AtomicU64::new(1),
            handles: Default::default(),
        }
    }

    fn allocate_handle_no(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn allocate(&self, data: Handle) -> u64 {
        loop {
            let id = self.allocate_handle_no();
            if id == 0 {
                // the 'empty/zero' handle value is never allocated
                continue;
            }
            match self.handles.entry(id) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(v) => {
                    v.insert(data);
                    break id;
                }
            }
        }
    }

    pub fn insert_file(&self, file: OpenFile) -> u64 {
        self.allocate(Handle::File(Arc::new(file)))
    }

    pub fn insert_dir(&self, dir: OpenDir) -> u64 {
        self.allocate(Handle::Dir(Arc::new(dir)))
    }

    pub fn file(&self, fh: u64) -> Result<Arc<OpenFile>> {
        match self.handles.get(&fh).map(|h| h.value().clone()) {
            Some(Handle::File(file)) => Ok(file),
            Some(Handle::Dir(_)) => Err(Error::WrongHandleKind(fh, "file")),
            None => Err(Error::UnknownHandle(fh)),
        }
    }

    pub fn dir(&self, fh: u64) -> Result<Arc<OpenDir>> {
        match self.handles.get(&fh).map(|h| h.value().clone()) {
            Some(Handle::Dir(dir)) => Ok(dir),
            Some(Handle::File(_)) => Err(Error::WrongHandleKind(fh, "directory")),
            None => Err(Error::UnknownHandle(fh)),
        }
    }

    /// Forget a file handle, closing it once no request is using it.
    pub fn remove_file(&self, fh: u64) -> Result<()> {
        self.file(fh)?;
        self.handles
            .remove(&fh)
            .map(|_| ())
            .ok_or(Error::UnknownHandle(fh))
    }

    /// Forget a directory handle.
    pub fn remove_dir(&self, fh: u64) -> Result<()> {
        self.dir(fh)?;
        self.handles
            .remove(&fh)
            .map(|_| ())
            .ok_or(Error::UnknownHandle(fh))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }
}
