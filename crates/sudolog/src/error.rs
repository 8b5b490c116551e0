// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[cfg(test)]
#[path = "./error_test.rs"]
mod error_test;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://spkenv.dev/error_codes#{}",
        self.code().unwrap_or_else(|| Box::new("sudolog::generic"))
    )
)]
pub enum Error {
    #[error("Permission denied for uid {uid}, only the superuser may use this filesystem")]
    PermissionDenied { uid: u32 },

    #[error("{0}: {1}")]
    Errno(String, #[source] io::Error),
    #[error(transparent)]
    #[diagnostic(code("sudolog::io"))]
    IO(#[from] io::Error),
    #[error(transparent)]
    #[diagnostic(code("sudolog::nix"))]
    Nix(#[from] nix::Error),

    #[error("Rename flags {0:#x} are not supported on this host")]
    UnsupportedRenameFlags(u32),

    #[error("Filename too long to fit a log datagram: {path}")]
    #[diagnostic(
        code("sudolog::filename_too_long"),
        help("Log datagrams are limited in size, including the header")
    )]
    FilenameTooLong { path: String, limit: usize },
    #[error("Not enough room for log payload in datagram: {available} < {required} bytes")]
    #[diagnostic(code("sudolog::insufficient_packet_space"))]
    InsufficientPacketSpace { available: usize, required: usize },

    #[error("Invalid collector specification '{0}'")]
    #[diagnostic(
        code("sudolog::invalid_collector"),
        help("Collectors are given as host[:port], eg: loghost.example.com:514")
    )]
    InvalidCollector(String),
    #[error("Failed to resolve collector '{spec}'")]
    #[diagnostic(code("sudolog::unresolved_collector"))]
    ResolveCollector {
        spec: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to open log socket")]
    OpenSocket(#[source] io::Error),

    #[error("Invalid source hostname '{0}'")]
    #[diagnostic(
        code("sudolog::invalid_hostname"),
        help("The hostname must be non-empty and must not contain whitespace")
    )]
    InvalidHostname(String),

    #[error("Backing root directory is not usable: {path:?}")]
    #[diagnostic(code("sudolog::invalid_root"))]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code("sudolog::config"))]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// Wrap the current value of `errno` with a message.
    pub fn last_os_error<S: Into<String>>(message: S) -> Self {
        Error::Errno(message.into(), io::Error::last_os_error())
    }
}

/// Get the underlying os error code, if any, for an error.
///
/// Filesystem adapters use this to pick the errno they reply with.
pub trait OsError {
    /// The errno value for this error, if one is known.
    fn os_error(&self) -> Option<i32>;
}

impl OsError for Error {
    fn os_error(&self) -> Option<i32> {
        match self {
            Error::PermissionDenied { .. } => Some(libc::EACCES),
            Error::Errno(_, err) => err.os_error(),
            Error::IO(err) => err.os_error(),
            Error::Nix(err) => err.os_error(),
            Error::UnsupportedRenameFlags(_) => Some(libc::EINVAL),
            Error::FilenameTooLong { .. } => Some(libc::ENAMETOOLONG),
            Error::InvalidRoot { source, .. } => source.os_error(),
            Error::ResolveCollector { source, .. } | Error::OpenSocket(source) => {
                source.os_error()
            }
            _ => None,
        }
    }
}

impl OsError for io::Error {
    fn os_error(&self) -> Option<i32> {
        self.raw_os_error()
    }
}

impl OsError for nix::errno::Errno {
    fn os_error(&self) -> Option<i32> {
        Some(*self as i32)
    }
}
