// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use crate::{Error, Result};

#[cfg(test)]
#[path = "./gate_test.rs"]
mod gate_test;

/// The only user id that may operate on the mounted view.
pub const SUPERUSER: u32 = 0;

/// Refuse any request that does not come from the superuser.
///
/// The mount is always exposed with `allow_other` so that all processes
/// share one coherent kernel cache, which means the kernel forwards
/// requests from every user. This check is what keeps everyone but root
/// away from the audit files. It must run before any path is translated
/// or any backing syscall is made.
pub fn check_caller(uid: u32) -> Result<()> {
    if uid != SUPERUSER {
        return Err(Error::PermissionDenied { uid });
    }
    Ok(())
}
