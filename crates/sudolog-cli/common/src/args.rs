// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use anyhow::Error;
use tracing_subscriber::prelude::*;

#[cfg(test)]
#[path = "./args_test.rs"]
mod args_test;

const SUDOLOGFS_LOG: &str = "SUDOLOGFS_LOG";

/// Command line flags for configuring logging output
#[derive(Debug, Clone, clap::Args)]
pub struct Logging {
    /// Make output more verbose, can be specified more than once
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Send logs to the local syslog instead of stderr
    #[clap(skip)]
    pub syslog: bool,
}

impl Logging {
    /// Install the global subscriber described by these flags.
    pub fn configure(&self) {
        configure_logging(self.verbose as usize, self.syslog)
    }
}

/// The filter for a verbosity level, before environment overrides.
///
/// With no extra verbosity an existing `SUDOLOGFS_LOG` value is used
/// as is. Anything in `RUST_LOG` is always appended.
pub fn filter_directives(
    verbosity: usize,
    existing: Option<String>,
    overrides: Option<String>,
) -> String {
    let mut config = match verbosity {
        0 => existing.unwrap_or_else(|| "sudolog=info,sudolog_vfs=info,warn".to_string()),
        1 => "sudolog=debug,sudolog_vfs=debug,info".to_string(),
        2 => "sudolog=trace,sudolog_vfs=trace,info".to_string(),
        3 => "sudolog=trace,sudolog_vfs=trace,debug".to_string(),
        _ => "trace".to_string(),
    };
    if let Some(overrides) = overrides {
        config.push(',');
        config.push_str(&overrides);
    }
    config
}

pub fn configure_logging(verbosity: usize, syslog: bool) {
    let config = filter_directives(
        verbosity,
        std::env::var(SUDOLOGFS_LOG).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let env_filter = tracing_subscriber::filter::EnvFilter::new(config);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(verbosity > 2);

    let syslog_writer = if syslog {
        let writer = syslog_tracing::Syslog::new(
            c"sudologfs",
            syslog_tracing::Options::LOG_PID,
            syslog_tracing::Facility::Daemon,
        );
        if writer.is_none() {
            eprintln!("WARNING: syslog is already in use, logging to stderr instead");
        }
        writer
    } else {
        None
    };

    let installed = match syslog_writer {
        Some(writer) => {
            let sub = tracing_subscriber::registry()
                .with(fmt_layer.with_ansi(false).with_writer(writer).with_filter(env_filter));
            tracing::subscriber::set_global_default(sub)
        }
        None => {
            let sub = tracing_subscriber::registry()
                .with(fmt_layer.with_writer(std::io::stderr).with_filter(env_filter));
            tracing::subscriber::set_global_default(sub)
        }
    };
    if installed.is_err() {
        tracing::debug!("logging was already configured");
    }
}

/// Log a command failure, with any help that the error carries.
pub fn report_error(err: &Error) {
    tracing::error!("{err:#}");
    let help = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<sudolog::Error>())
        .and_then(miette::Diagnostic::help);
    if let Some(help) = help {
        tracing::info!(" > {help}");
    }
}

#[macro_export]
macro_rules! handle_result {
    ($result:ident) => {{
        match $result {
            Err(err) => {
                $crate::report_error(&err);
                1
            }
            Ok(code) => code,
        }
    }};
}
