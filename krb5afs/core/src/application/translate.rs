// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Kerberos 4 translation, run once at authentication time.

use tracing::{debug, info, warn};

use crate::domain::config::Krb5AfsConfig;
use crate::domain::error::SessionError;
use crate::domain::kdc::KdcClient;
use crate::domain::stash::Stash;

/// Convert the stashed v5 credential to v4 when `krb4_convert` is on.
///
/// Returns whether a v4 credential is now stashed. Errors are logged and
/// surfaced for inspection, but map to a non-fatal host code.
pub fn translate_v4(
    stash: &mut Stash,
    kdc: &dyn KdcClient,
    config: &Krb5AfsConfig,
) -> Result<bool, SessionError> {
    if !config.krb4_convert {
        return Ok(false);
    }
    let Some(creds) = stash.v5() else {
        debug!("No v5 credential to translate");
        return Ok(false);
    };

    let client = creds.client.to_string();
    match kdc.convert_to_v4(creds) {
        Ok(v4) => {
            stash.set_v4(v4)?;
            info!(principal = %client, "Obtained v4 credential through 524 translation");
            Ok(true)
        }
        Err(e) => {
            warn!(principal = %client, error = %e, "v4 translation failed; no ticket file will be written");
            Err(e.into())
        }
    }
}
