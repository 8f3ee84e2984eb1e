// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Login eligibility and impersonation policy, evaluated when a mechanism
//! reports success.

use tracing::info;

use crate::{
    broker::Broker,
    directory::{AccountRef, METADATA_FREEZER, Privilege},
    session::session::{Session, SessionFlags},
};

impl Broker {
    /// Decides whether the session may log in and returns the target
    /// account.
    ///
    /// The source account is the one whose credentials were verified
    /// (authcid); the target is the one that will be logged in (authzid).
    /// When no authorization identity was set, the target defaults to the
    /// source and both names are copied across.
    pub(crate) fn login_user(&self, sess: &mut Session) -> Option<AccountRef> {
        let source_eid = sess.authceid.clone()?;
        let source = self.directory.find_by_eid(&source_eid)?;

        let target = match sess.authzeid.clone() {
            None => {
                sess.authzid = sess.authcid.clone();
                sess.authzeid = sess.authceid.clone();
                source.clone()
            },
            Some(zeid) => self.directory.find_by_eid(&zeid)?,
        };

        if self
            .directory
            .metadata(&source.eid, METADATA_FREEZER)
            .is_some()
        {
            info!(source = %sess.source, "failed LOGIN to {} (frozen)", source.name);
            return None;
        }

        if target.eid != source.eid {
            if !self.may_impersonate(&source, &target) {
                info!(
                    source = %sess.source,
                    "denied IMPERSONATE by {} to {}", source.name, target.name
                );
                return None;
            }

            if self
                .directory
                .metadata(&target.eid, METADATA_FREEZER)
                .is_some()
            {
                info!(source = %sess.source, "failed LOGIN to {} (frozen)", target.name);
                return None;
            }
        }

        if self.directory.login_count(&target.eid)
            >= self.cfg.limits.max_logins as usize
        {
            info!(
                source = %sess.source,
                "failed LOGIN to {} (too many logins)", target.name
            );
            return None;
        }

        // The login log line is still owed; the finalizer or the reaper
        // settles it.
        sess.flags.insert(SessionFlags::NEED_LOG);

        /* IRCds without unique pre-login UIDs burst the login data right
         * after the user introduction; flag the account so the core treats
         * that burst as this login rather than a stale one.
         */
        if self.cfg.ircd.uses_prelogin_uid {
            self.directory.mark_pending_login(&target.eid);
        }

        if target.eid != source.eid {
            info!(
                source = %sess.source,
                "allowed IMPERSONATE by {} to {}", source.name, target.name
            );
        }

        Some(target)
    }

    /// Impersonation is allowed by the wildcard privilege, a privilege
    /// scoped to the target's operator class (or `user`), a privilege
    /// naming the target account, or as a last resort by the
    /// `sasl_may_impersonate` hook.
    fn may_impersonate(&self, source: &AccountRef, target: &AccountRef) -> bool {
        if source.eid == target.eid {
            return true;
        }

        if self.directory.has_priv(&source.eid, &Privilege::ImpersonateAny) {
            return true;
        }

        let class = self
            .directory
            .operclass(&target.eid)
            .unwrap_or_else(|| "user".to_owned());
        if self
            .directory
            .has_priv(&source.eid, &Privilege::ImpersonateClass(class))
        {
            return true;
        }

        if self.directory.has_priv(
            &source.eid,
            &Privilege::ImpersonateEntity(target.name.clone()),
        ) {
            return true;
        }

        self.hooks.sasl_may_impersonate(source, target)
    }
}
