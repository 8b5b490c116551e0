// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use clap::Parser;
use fuser::MountOption;
use rstest::rstest;

use super::{CmdFuse, parse_options_from_args};

fn plan(args: &[&str], conf: &str) -> anyhow::Result<(sudolog_vfs::Config, sudolog::MountOptions)> {
    let cmd = CmdFuse::try_parse_from(args).expect("valid arguments");
    let config = sudolog::Config::load_string(conf).expect("valid config");
    cmd.mount_plan(&config)
}

#[rstest]
fn test_parse_known_and_custom_options() {
    let args = ["ro", "fsname=audit", "syslog=loghost:1514"].map(String::from);
    let parsed = parse_options_from_args(&args);
    assert_eq!(parsed, vec![
        MountOption::RO,
        MountOption::FSName("audit".into()),
        MountOption::CUSTOM("syslog=loghost:1514".into()),
    ]);
}

#[rstest]
fn test_positional_collector() {
    let (opts, mount) = plan(&["sudologfs", "/srv/logs", "/mnt/logs", "loghost"], "").unwrap();
    assert_eq!(mount.collector.host(), "loghost");
    assert_eq!(mount.collector.port(), 514);
    assert_eq!(mount.hostname, None);
    assert!(opts.mount_options.contains(&MountOption::AllowOther));
    assert!(
        opts.mount_options
            .contains(&MountOption::FSName("sudologfs".into()))
    );
}

#[rstest]
fn test_syslog_option_wins() {
    let (opts, mount) = plan(
        &[
            "sudologfs",
            "-o",
            "syslog=primary:1514,hostname=auditbox,fsname=mine",
            "/srv/logs",
            "/mnt/logs",
            "secondary",
        ],
        "[collector]\naddress = fallback\n[source]\nhostname = confbox\n",
    )
    .unwrap();
    assert_eq!(mount.collector.as_str(), "primary:1514");
    assert_eq!(mount.hostname.as_deref(), Some("auditbox"));
    assert!(opts.mount_options.contains(&MountOption::FSName("mine".into())));
    assert!(
        !opts
            .mount_options
            .iter()
            .any(|o| matches!(o, MountOption::CUSTOM(c) if c.starts_with("syslog") || c.starts_with("hostname"))),
        "sudolog options are not passed to the kernel"
    );
}

#[rstest]
fn test_configured_defaults() {
    let (_, mount) = plan(
        &["sudologfs", "/srv/logs", "/mnt/logs"],
        "[collector]\naddress = fallback:999\n[source]\nhostname = confbox\n",
    )
    .unwrap();
    assert_eq!(mount.collector.as_str(), "fallback:999");
    assert_eq!(mount.hostname.as_deref(), Some("confbox"));
}

#[rstest]
fn test_missing_collector_is_an_error() {
    plan(&["sudologfs", "/srv/logs", "/mnt/logs"], "").expect_err("no collector anywhere");
}

#[rstest]
fn test_invalid_collector_is_an_error() {
    plan(&["sudologfs", "/srv/logs", "/mnt/logs", "host:notaport"], "")
        .expect_err("bad port");
}

#[rstest]
fn test_mountpoint_is_required() {
    CmdFuse::try_parse_from(["sudologfs", "/srv/logs"]).expect_err("missing mountpoint");
}
