// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The mechanism contract and the implementations shipped in-tree.
//!
//! A mechanism drives the cryptographic (or trivially non-cryptographic)
//! part of an exchange through three callbacks: `start` when the client
//! selects it, `step` for every round of client data, and `finish` when the
//! session is torn down. Identity resolution goes through [`MechContext`],
//! which enforces the login-eligibility hooks; mechanisms never touch the
//! account database directly for that.

use std::sync::Arc;

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::{
    broker::hooks::Hooks,
    directory::{AccountRef, Directory},
    session::session::Session,
};

/// The EXTERNAL mechanism (TLS client certificate).
pub mod external;
/// The PLAIN mechanism (cleartext credentials over the encoded carriage).
pub mod plain;
/// The set of mechanisms available to offer.
pub mod registry;

/// What a `start`/`step` round concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechStatus {
    /// Expect another round of client data.
    More,
    /// Authentication succeeded; hand over to the login finalizer.
    Done,
    /// Authentication failed (bad credentials).
    Fail,
    /// Protocol or internal error; abort the session.
    Error,
}

/// Reply bytes plus round status. Replies may carry key material, so they
/// live in wiping buffers.
#[derive(Debug)]
pub struct StepOutput {
    pub reply: Option<Zeroizing<Vec<u8>>>,
    pub status: MechStatus,
}

impl StepOutput {
    pub fn more() -> Self {
        Self {
            reply: None,
            status: MechStatus::More,
        }
    }

    pub fn more_with(reply: Zeroizing<Vec<u8>>) -> Self {
        Self {
            reply: Some(reply),
            status: MechStatus::More,
        }
    }

    pub fn done() -> Self {
        Self {
            reply: None,
            status: MechStatus::Done,
        }
    }

    pub fn fail() -> Self {
        Self {
            reply: None,
            status: MechStatus::Fail,
        }
    }

    pub fn error() -> Self {
        Self {
            reply: None,
            status: MechStatus::Error,
        }
    }
}

/// Which of the two identity slots an operation resolves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdentityKind {
    Authentication,
    Authorization,
}

/// Capability surface handed to a mechanism for one round.
pub struct MechContext<'a> {
    pub session: &'a mut Session,
    pub directory: &'a dyn Directory,
    pub hooks: &'a dyn Hooks,
}

impl MechContext<'_> {
    /// Resolves the authentication identity and records it on the session.
    /// Returns the account when the name exists and the pre-login hook does
    /// not veto it.
    pub fn authcid_can_login(&mut self, name: &str) -> Option<AccountRef> {
        self.authxid_can_login(name, IdentityKind::Authentication)
    }

    /// Symmetric to [`Self::authcid_can_login`] for the authorization
    /// identity.
    pub fn authzid_can_login(&mut self, name: &str) -> Option<AccountRef> {
        self.authxid_can_login(name, IdentityKind::Authorization)
    }

    fn authxid_can_login(
        &mut self,
        name: &str,
        kind: IdentityKind,
    ) -> Option<AccountRef> {
        let Some(account) = self.directory.find_by_nick(name) else {
            debug!("authxid_can_login: account '{name}' does not exist");
            return None;
        };

        // The eid of the opposite slot; if both identities resolve to the
        // same entity the hook has already run once for it.
        let other_eid = match kind {
            IdentityKind::Authentication => self.session.authzeid.clone(),
            IdentityKind::Authorization => self.session.authceid.clone(),
        };

        match kind {
            IdentityKind::Authentication => {
                self.session.authcid = Some(account.name.clone());
                self.session.authceid = Some(account.eid.clone());
            },
            IdentityKind::Authorization => {
                self.session.authzid = Some(account.name.clone());
                self.session.authzeid = Some(account.eid.clone());
            },
        }

        if other_eid.as_deref() == Some(account.eid.as_str()) {
            return Some(account);
        }

        if !self.hooks.user_can_login(&self.session.source, &account) {
            info!(
                source = %self.session.source,
                "failed LOGIN to {} (denied by hook)", account.name
            );
            return None;
        }

        Some(account)
    }
}

/// A registered SASL mechanism.
///
/// Callbacks are synchronous and must not block; the broker invokes them
/// from its single execution context. Any per-session state belongs in
/// `Session::mech_state` and is released by `finish`.
pub trait SaslMechanism: Send + Sync {
    /// Mechanism name as advertised, ASCII, case-sensitive (RFC 4422).
    fn name(&self) -> &'static str;

    /// Called once when the client selects this mechanism. The default asks
    /// for client data without sending a challenge.
    fn start(&self, ctx: &mut MechContext<'_>) -> StepOutput {
        let _ = ctx;
        StepOutput::more()
    }

    /// Called for every decoded round of client data. `None` means the
    /// client sent a bare `+` (no response).
    fn step(&self, ctx: &mut MechContext<'_>, input: Option<&[u8]>) -> StepOutput;

    /// Called exactly once when the session is destroyed.
    fn finish(&self, session: &mut Session) {
        session.mech_state = None;
    }
}

/// Looks up an in-tree mechanism by its advertised name.
pub fn builtin(name: &str) -> Option<Arc<dyn SaslMechanism>> {
    match name {
        "PLAIN" => Some(Arc::new(plain::Plain)),
        "EXTERNAL" => Some(Arc::new(external::External)),
        _ => None,
    }
}
