// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::path::Path;

use config::{Config as ConfigBase, Environment, File, FileFormat};
use serde::Deserialize;

use crate::collector::CollectorSpec;
use crate::Result;

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// The optional system-wide settings file.
pub static SYSTEM_CONFIG: &str = "/etc/sudologfs.conf";
/// Prefix for settings taken from the environment.
pub static ENV_PREFIX: &str = "SUDOLOGFS";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Collector {
    /// Default collector, as `host[:port]`
    pub address: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Source {
    /// Default source hostname for log records
    pub hostname: Option<String>,
}

/// Site defaults for mounts.
///
/// Everything here can be overridden on the command line, these
/// values are only used when a mount does not provide its own.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub collector: Collector,
    pub source: Source,
}

impl Config {
    pub fn load_string<S: AsRef<str>>(conf: S) -> Result<Self> {
        let config = ConfigBase::builder()
            .add_source(File::from_str(conf.as_ref(), FileFormat::Ini))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// The configured default collector, if any.
    pub fn collector(&self) -> Result<Option<CollectorSpec>> {
        self.collector
            .address
            .as_deref()
            .map(str::parse)
            .transpose()
    }
}

/// Load the configuration from the system file and the environment.
pub fn load_config() -> Result<Config> {
    load_config_from(Path::new(SYSTEM_CONFIG))
}

/// Load the configuration from the given file, if it exists,
/// and the environment.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let config = ConfigBase::builder()
        .add_source(
            File::from(path)
                .format(FileFormat::Ini)
                .required(false),
        )
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("_"))
        .build()?;
    Ok(config.try_deserialize()?)
}
