// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! EXTERNAL (RFC 4422 appendix A): authentication by the TLS client
//! certificate the link already verified. The optional client message
//! carries an authorization identity.

use tracing::{debug, warn};

use crate::mechanism::{MechContext, SaslMechanism, StepOutput};

pub struct External;

impl SaslMechanism for External {
    fn name(&self) -> &'static str {
        "EXTERNAL"
    }

    // Default `start`: the client follows up with an authzid or a bare '+'.

    fn step(&self, ctx: &mut MechContext<'_>, input: Option<&[u8]>) -> StepOutput {
        let Some(certfp) = ctx.session.certfp.clone() else {
            // The broker refuses EXTERNAL without a fingerprint before the
            // mechanism is ever invoked.
            warn!("EXTERNAL: session has no fingerprint (BUG)");
            return StepOutput::error();
        };

        let Some(account) = ctx.directory.find_by_certfp(&certfp) else {
            debug!("EXTERNAL: no account matches fingerprint");
            return StepOutput::fail();
        };

        if ctx.authcid_can_login(&account.name).is_none() {
            return StepOutput::fail();
        }

        if let Some(authzid) = input.filter(|b| !b.is_empty()) {
            let Ok(authzid) = std::str::from_utf8(authzid) else {
                debug!("EXTERNAL: authzid is not valid UTF-8");
                return StepOutput::error();
            };
            if ctx.authzid_can_login(authzid).is_none() {
                return StepOutput::fail();
            }
        }

        StepOutput::done()
    }
}
