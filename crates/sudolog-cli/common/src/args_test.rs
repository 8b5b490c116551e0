// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use rstest::rstest;

use super::filter_directives;

#[rstest]
#[case(0, None, None, "sudolog=info,sudolog_vfs=info,warn")]
#[case(0, Some("sudolog=error"), None, "sudolog=error")]
#[case(1, Some("sudolog=error"), None, "sudolog=debug,sudolog_vfs=debug,info")]
#[case(2, None, Some("fuser=debug"), "sudolog=trace,sudolog_vfs=trace,info,fuser=debug")]
#[case(9, None, None, "trace")]
fn test_filter_directives(
    #[case] verbosity: usize,
    #[case] existing: Option<&str>,
    #[case] overrides: Option<&str>,
    #[case] expected: &str,
) {
    let actual = filter_directives(
        verbosity,
        existing.map(String::from),
        overrides.map(String::from),
    );
    assert_eq!(actual, expected);
}

#[rstest]
fn test_handle_result_maps_exit_codes() {
    let ok: anyhow::Result<i32> = Ok(0);
    assert_eq!(crate::handle_result!(ok), 0);
    let failed: anyhow::Result<i32> = Err(sudolog::Error::InvalidHostname("a b".into()).into());
    assert_eq!(crate::handle_result!(failed), 1);
}
