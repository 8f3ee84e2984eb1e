// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{directory::AccountRef, session::source::SourceInfo};

/// Policy hooks the surrounding services framework may install.
///
/// Defaults are neutral: logins are allowed, impersonation beyond the
/// privilege checks is not, bad-password events go nowhere.
pub trait Hooks: Send + Sync {
    /// Veto point evaluated once per resolved identity before login.
    fn user_can_login(&self, source: &SourceInfo, account: &AccountRef) -> bool {
        let _ = (source, account);
        true
    }

    /// Last-resort impersonation check, consulted only after all privilege
    /// keys declined.
    fn sasl_may_impersonate(&self, source: &AccountRef, target: &AccountRef) -> bool {
        let _ = (source, target);
        false
    }

    /// Notification that an exchange failed against a known account.
    fn bad_password(&self, source: &SourceInfo, account: &AccountRef) {
        let _ = (source, account);
    }
}

/// The no-op hook set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl Hooks for DefaultHooks {}
