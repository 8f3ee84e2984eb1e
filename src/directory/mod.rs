// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Abstraction over the account database the broker authenticates against.
//!
//! The broker never owns account records; it resolves names and entity-IDs,
//! queries metadata and privileges, and asks the directory to attach a login
//! once a user has been introduced to the network. Everything behind this
//! trait belongs to the surrounding services framework.

use core::fmt;
use std::str::FromStr;

use thiserror::Error;

/// In-memory directory used by tests and the demo binary.
pub mod memory;

/// Metadata key marking a frozen (suspended) account.
pub const METADATA_FREEZER: &str = "private:freeze:freezer";
/// Metadata key holding the hostname cloak applied on login.
pub const METADATA_USERCLOAK: &str = "private:usercloak";

/// A resolved account: display name plus its stable entity-ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub name: String,
    pub eid: String,
}

/// A live user on the network, as introduced by the IRC link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: String,
    pub nick: String,
}

/// Impersonation privileges, typed. The textual forms
/// (`impersonate:any`, `impersonate:class:<class>`,
/// `impersonate:entity:<name>`) exist only at the config boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Privilege {
    ImpersonateAny,
    ImpersonateClass(String),
    ImpersonateEntity(String),
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::ImpersonateAny => f.write_str("impersonate:any"),
            Privilege::ImpersonateClass(class) => {
                write!(f, "impersonate:class:{class}")
            },
            Privilege::ImpersonateEntity(name) => {
                write!(f, "impersonate:entity:{name}")
            },
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown privilege '{0}'")]
pub struct UnknownPrivilege(String);

impl FromStr for Privilege {
    type Err = UnknownPrivilege;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "impersonate:any" {
            return Ok(Privilege::ImpersonateAny);
        }
        if let Some(class) = s.strip_prefix("impersonate:class:")
            && !class.is_empty()
        {
            return Ok(Privilege::ImpersonateClass(class.to_owned()));
        }
        if let Some(name) = s.strip_prefix("impersonate:entity:")
            && !name.is_empty()
        {
            return Ok(Privilege::ImpersonateEntity(name.to_owned()));
        }
        Err(UnknownPrivilege(s.to_owned()))
    }
}

/// Lookup and login operations the account database exposes to the broker.
pub trait Directory: Send + Sync {
    fn find_by_nick(&self, nick: &str) -> Option<AccountRef>;

    fn find_by_eid(&self, eid: &str) -> Option<AccountRef>;

    /// Account whose certificate fingerprint list contains `certfp`
    /// (lowercase hex).
    fn find_by_certfp(&self, certfp: &str) -> Option<AccountRef>;

    /// Verifies a cleartext credential against the stored one.
    fn verify_password(&self, account: &AccountRef, password: &[u8]) -> bool;

    fn metadata(&self, eid: &str, key: &str) -> Option<String>;

    /// Number of live logins currently attached to the account.
    fn login_count(&self, eid: &str) -> usize;

    fn has_priv(&self, eid: &str, privilege: &Privilege) -> bool;

    /// Operator class of the account, if it is a services operator.
    fn operclass(&self, eid: &str) -> Option<String>;

    /// Whether the account still awaits email verification.
    fn waitauth(&self, eid: &str) -> bool;

    /// Flags the account so the IRCd's burst login for a pre-allocated UID
    /// is not treated as a fresh login.
    fn mark_pending_login(&self, eid: &str);

    /// Binds the account to a live user after introduction.
    fn attach_login(&self, user: &UserInfo, account: &AccountRef);
}
