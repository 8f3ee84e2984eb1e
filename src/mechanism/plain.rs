// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PLAIN (RFC 4616): `[authzid] NUL authcid NUL passwd` in a single round.

use tracing::debug;

use crate::mechanism::{MechContext, SaslMechanism, StepOutput};

pub struct Plain;

impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    // Default `start`: no challenge, wait for the client message.

    fn step(&self, ctx: &mut MechContext<'_>, input: Option<&[u8]>) -> StepOutput {
        let Some(input) = input else {
            // PLAIN is single-round; a bare '+' here means the client never
            // sent its message.
            return StepOutput::fail();
        };

        let mut fields = input.split(|&b| b == 0);
        let (Some(authzid), Some(authcid), Some(passwd), None) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            debug!("PLAIN: malformed message (expected 3 NUL-separated fields)");
            return StepOutput::error();
        };

        if authcid.is_empty() || passwd.is_empty() {
            debug!("PLAIN: empty authcid or passwd");
            return StepOutput::error();
        }

        let (Ok(authzid), Ok(authcid)) =
            (std::str::from_utf8(authzid), std::str::from_utf8(authcid))
        else {
            debug!("PLAIN: identities are not valid UTF-8");
            return StepOutput::error();
        };

        if !authzid.is_empty() && ctx.authzid_can_login(authzid).is_none() {
            return StepOutput::fail();
        }

        let Some(account) = ctx.authcid_can_login(authcid) else {
            return StepOutput::fail();
        };

        if !ctx.directory.verify_password(&account, passwd) {
            return StepOutput::fail();
        }

        StepOutput::done()
    }
}
