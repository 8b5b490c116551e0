// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Pass-through filesystem that mirrors writes to a syslog collector
//!
//! Every request is checked against the access policy before being
//! delegated to the backing directory of the mount.

#![deny(missing_docs)]

mod error;
pub use error::{Error, Result};

#[cfg(all(unix, feature = "fuse-backend"))]
mod fuse;
#[cfg(all(unix, feature = "fuse-backend"))]
mod handles;
#[cfg(all(unix, feature = "fuse-backend"))]
mod host;
#[cfg(all(unix, feature = "fuse-backend"))]
mod inodes;

#[cfg(all(unix, feature = "fuse-backend"))]
pub use fuse::{Config, Session};
