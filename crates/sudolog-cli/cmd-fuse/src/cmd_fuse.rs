// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use fuser::MountOption;
use sudolog::{CollectorSpec, MountOptions, MountState};
use sudolog_cli_common as cli;
use sudolog_vfs::{Config, Session};
use tokio::signal::unix::{SignalKind, signal};

#[cfg(test)]
#[path = "./cmd_fuse_test.rs"]
mod cmd_fuse_test;

/// The name reported for the mount when none is given
const DEFAULT_FSNAME: &str = "sudologfs";

fn main() {
    // because this function exits right away it does not
    // properly handle destruction of data, so we put the actual
    // logic into a separate function/scope
    std::process::exit(main2())
}

fn main2() -> i32 {
    let mut opt = match CmdFuse::try_parse() {
        Ok(opt) => opt,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() { 1 } else { 0 };
        }
    };
    // once daemonized, the only place left for logs is the local syslog
    opt.logging.syslog = !opt.foreground && !opt.log_foreground;
    opt.logging.configure();

    let config = match sudolog::load_config() {
        Err(err) => {
            tracing::error!(err = ?err, "failed to load config");
            return 1;
        }
        Ok(config) => config,
    };
    let result = opt.run(&config);

    sudolog_cli_common::handle_result!(result)
}

/// Mount a directory so that every write into it is mirrored to a remote
/// syslog collector
#[derive(Debug, Parser)]
#[clap(name = "sudologfs", version)]
pub struct CmdFuse {
    #[clap(flatten)]
    logging: cli::Logging,

    /// Do not daemonize the filesystem, run it in the foreground instead
    #[clap(long, short)]
    foreground: bool,

    /// Do not disconnect the filesystem logs from stderr
    ///
    /// Although the filesystem will still daemonize, the logs will
    /// still appear in the stderr of the calling process/shell
    #[clap(long, short, env = "SUDOLOGFS_LOG_FOREGROUND")]
    log_foreground: bool,

    /// Options for the mount in the form opt1,opt2=value
    ///
    /// In addition to all existing fuse mount options, the following custom
    /// options are also supported:
    ///
    ///  syslog   - the collector to send records to, as host[:port], takes
    ///             precedence over the COLLECTOR argument
    ///  hostname - the source hostname to put in every record, defaults to
    ///             the node name of this host
    ///
    /// The allow_other option is always added.
    #[clap(long, short, value_delimiter = ',')]
    options: Vec<String>,

    /// The directory whose contents are exposed through the mount
    #[clap(name = "ROOT")]
    root: PathBuf,

    /// The location where to mount the filesystem
    #[clap(name = "MOUNTPOINT")]
    mountpoint: PathBuf,

    /// The syslog collector that receives every write, as host[:port]
    ///
    /// Defaults to the collector address in /etc/sudologfs.conf
    /// or the SUDOLOGFS_COLLECTOR_ADDRESS environment variable
    #[clap(name = "COLLECTOR")]
    collector: Option<String>,
}

impl CmdFuse {
    /// Work out the filesystem and mount settings from the command line,
    /// using the configuration to fill any gaps.
    fn mount_plan(&self, config: &sudolog::Config) -> Result<(Config, MountOptions)> {
        let mut opts = Config::default();
        let mut syslog = None;
        let mut hostname = None;

        for option in parse_options_from_args(&self.options) {
            match option {
                MountOption::CUSTOM(opt) => match opt.split_once('=') {
                    Some(("syslog", spec)) => syslog = Some(spec.to_owned()),
                    Some(("hostname", name)) => hostname = Some(name.to_owned()),
                    _ => {
                        opts.mount_options.insert(MountOption::CUSTOM(opt));
                    }
                },
                _ => {
                    opts.mount_options.insert(option);
                }
            }
        }

        // the kernel must route requests from all users to the filesystem
        // so that it can refuse them itself
        opts.mount_options.insert(MountOption::AllowOther);
        if !opts
            .mount_options
            .iter()
            .any(|o| matches!(o, MountOption::FSName(_)))
        {
            opts.mount_options
                .insert(MountOption::FSName(DEFAULT_FSNAME.into()));
        }

        let collector = match syslog.or_else(|| self.collector.clone()) {
            Some(spec) => spec.parse::<CollectorSpec>()?,
            None => config.collector()?.ok_or_else(|| {
                anyhow!("A collector is required, give one as an argument or with -o syslog=host[:port]")
            })?,
        };
        let hostname = hostname.or_else(|| config.source.hostname.clone());

        let mount = MountOptions {
            root: self.root.clone(),
            mountpoint: self.mountpoint.clone(),
            collector,
            hostname,
        };
        Ok((opts, mount))
    }

    pub fn run(&mut self, config: &sudolog::Config) -> Result<i32> {
        let (opts, mut mount) = self.mount_plan(config)?;
        tracing::debug!("FUSE Config: {opts:#?}");

        mount.mountpoint = mount
            .mountpoint
            .canonicalize()
            .context("Invalid mount point")?;

        // the kernel has already applied the umask of the caller
        // to any mode that it sends
        nix::sys::stat::umask(nix::sys::stat::Mode::empty());

        let state = MountState::open(mount).context("Failed to prepare mount")?;
        tracing::info!(
            "Mirroring writes under {} to {} as {}",
            state.root().path().display(),
            state.collector(),
            state.mirror().hostname(),
        );
        let mountpoint = state.mountpoint().to_owned();

        tracing::debug!("Establishing fuse session...");
        let mount_opts = opts.mount_options.iter().cloned().collect::<Vec<_>>();
        let mut session = fuser::Session::new(
            Session::new(Arc::new(state), opts),
            &mountpoint,
            &mount_opts,
        )
        .context("Failed to create a FUSE session")?;
        let mut unmounter = session.unmount_callable();

        if !self.foreground {
            tracing::debug!("Moving into background...");
            // We cannot daemonize until the session is established above,
            // otherwise initial use of the filesystem may not show any mount
            // at all.
            nix::unistd::daemon(false, self.log_foreground)?;
        }

        // We also cannot go multi-thread until the daemonization process above
        // is complete, otherwise we can end up with deadlocks.
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to establish runtime")?;

        let result = rt.block_on(async move {
            let mut interrupt =
                signal(SignalKind::interrupt()).context("interrupt signal handler")?;
            let mut quit = signal(SignalKind::quit()).context("quit signal handler")?;
            let mut terminate =
                signal(SignalKind::terminate()).context("terminate signal handler")?;

            tracing::info!("Starting FUSE filesystem");
            // every request is run on the blocking pool of this runtime, so
            // the session loop itself also lives there
            let mut fut = tokio::task::spawn_blocking(move || session.run());
            let received = tokio::select! {
                res = &mut fut => {
                    tracing::info!("Filesystem shutting down");
                    return res.context("FUSE session failed");
                }
                _ = terminate.recv() => "Terminate",
                _ = interrupt.recv() => "Interrupt",
                _ = quit.recv() => "Quit",
            };
            tracing::info!("{received} signal received, filesystem shutting down");
            unmounter.unmount().context("Failed to unmount filesystem")?;
            fut.await.context("FUSE session failed")
        });

        // requests that are still running against the unmounted
        // filesystem are abandoned rather than waited on forever
        rt.shutdown_timeout(std::time::Duration::from_secs(2));
        result??;
        Ok(0)
    }
}

/// Copies from the private [`fuser::MountOption::from_str`]
fn parse_options_from_args(args: &[String]) -> Vec<MountOption> {
    args.iter()
        .map(|s| match s.as_str() {
            "auto_unmount" => MountOption::AutoUnmount,
            "allow_other" => MountOption::AllowOther,
            "allow_root" => MountOption::AllowRoot,
            "default_permissions" => MountOption::DefaultPermissions,
            "dev" => MountOption::Dev,
            "nodev" => MountOption::NoDev,
            "suid" => MountOption::Suid,
            "nosuid" => MountOption::NoSuid,
            "ro" => MountOption::RO,
            "rw" => MountOption::RW,
            "exec" => MountOption::Exec,
            "noexec" => MountOption::NoExec,
            "atime" => MountOption::Atime,
            "noatime" => MountOption::NoAtime,
            "dirsync" => MountOption::DirSync,
            "sync" => MountOption::Sync,
            "async" => MountOption::Async,
            x if x.starts_with("fsname=") => MountOption::FSName(x[7..].into()),
            x if x.starts_with("subtype=") => MountOption::Subtype(x[8..].into()),
            x => MountOption::CUSTOM(x.into()),
        })
        .collect()
}
