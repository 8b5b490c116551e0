// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::path::{Path, PathBuf};

use crate::collector::{CollectorSpec, Emitter};
use crate::mirror::Mirror;
use crate::paths::Root;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./state_test.rs"]
mod state_test;

/// Everything needed to bring up a mount.
#[derive(Debug, Clone)]
pub struct MountOptions {
    /// The backing directory, need not be canonical yet
    pub root: PathBuf,
    /// Where the view will be mounted
    pub mountpoint: PathBuf,
    /// The remote syslog collector
    pub collector: CollectorSpec,
    /// Source hostname override, the node name is used when unset
    pub hostname: Option<String>,
}

/// Process-wide state shared by every filesystem request.
///
/// Created once before mounting and read-only afterwards, so it
/// can be shared between request threads without locking.
#[derive(Debug)]
pub struct MountState {
    root: Root,
    mountpoint: PathBuf,
    collector: CollectorSpec,
    mirror: Mirror,
}

impl MountState {
    /// Resolve and open everything the mount needs.
    ///
    /// The collector is resolved here and never again.
    pub fn open(opts: MountOptions) -> Result<Self> {
        let root = Root::new(&opts.root)?;
        let destination = opts.collector.resolve()?;
        tracing::debug!("collector {} resolved to {destination}", opts.collector);
        let emitter = Emitter::open(destination)?;
        let hostname = match opts.hostname {
            Some(name) => validate_hostname(&name)?,
            None => node_hostname()?,
        };
        Ok(Self {
            root,
            mountpoint: opts.mountpoint,
            collector: opts.collector,
            mirror: Mirror::new(hostname, emitter),
        })
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn collector(&self) -> &CollectorSpec {
        &self.collector
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }
}

/// Check that a name can be placed in the hostname field of a record.
pub fn validate_hostname(name: &str) -> Result<String> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidHostname(name.to_string()));
    }
    Ok(name.to_string())
}

/// The node name of this host.
pub fn node_hostname() -> Result<String> {
    let name = nix::unistd::gethostname()?;
    let name = name
        .into_string()
        .map_err(|name| Error::InvalidHostname(name.to_string_lossy().into_owned()))?;
    validate_hostname(&name)
}
