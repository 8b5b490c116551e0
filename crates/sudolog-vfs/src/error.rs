// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use sudolog::OsError;
use thiserror::Error;

/// Errors specific to fuse operations.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum Error {
    /// The kernel referred to an inode that is not known.
    #[error("Unknown inode {0}")]
    UnknownInode(u64),

    /// The kernel referred to a handle that is not open.
    #[error("Unknown handle {0}")]
    UnknownHandle(u64),

    /// A file handle was used as a directory or the other way around.
    #[error("Handle {0} is not a {1}")]
    WrongHandleKind(u64, &'static str),

    /// A negative offset was given for positional io.
    #[error("Invalid offset {0}")]
    InvalidOffset(i64),

    /// The kernel reply buffer could not hold a single entry.
    #[error("Reply buffer is full")]
    BufferFull,

    /// A failure from the backing filesystem or the access policy.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sudolog(#[from] sudolog::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Sudolog(err.into())
    }
}

impl From<nix::errno::Errno> for Error {
    fn from(err: nix::errno::Errno) -> Self {
        Error::Sudolog(err.into())
    }
}

impl OsError for Error {
    fn os_error(&self) -> Option<i32> {
        match self {
            Error::UnknownInode(_) => Some(libc::ENOENT),
            Error::UnknownHandle(_) => Some(libc::EBADF),
            Error::WrongHandleKind(_, "directory") => Some(libc::ENOTDIR),
            Error::WrongHandleKind(_, _) => Some(libc::EISDIR),
            Error::InvalidOffset(_) => Some(libc::EINVAL),
            Error::BufferFull => Some(libc::ENOMEM),
            Error::Sudolog(err) => err.os_error(),
        }
    }
}

impl Error {
    /// True if this is a refusal by the access gate.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Error::Sudolog(sudolog::Error::PermissionDenied { .. })
        )
    }
}

/// A result whose error is a filesystem error.
pub type Result<T> = std::result::Result<T, Error>;
