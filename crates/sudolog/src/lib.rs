// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Write mirroring for audited directories.
//!
//! Provides the pieces behind `sudologfs`: translation of mounted paths
//! onto a backing directory, the superuser-only access policy, clearing
//! of set-id bits on mutation, and the framing and delivery of every
//! write to a remote syslog collector over UDP.

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub mod collector;
pub mod config;
mod error;
pub mod gate;
pub mod mirror;
pub mod paths;
pub mod sanitize;
pub mod state;
pub mod syslog;

pub use collector::{CollectorSpec, Emitter};
pub use config::{Config, load_config};
pub use error::{Error, OsError, Result};
pub use gate::check_caller;
pub use mirror::Mirror;
pub use paths::Root;
pub use sanitize::{clear_setid_bits, clear_setid_bits_fd};
pub use state::{MountOptions, MountState};
pub use syslog::{Sequence, WriteRecord};
