// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A self-contained [`Directory`] backed by process memory.
//!
//! Production deployments sit on the services account database; this
//! implementation exists for the demo binary and the test suite.

use std::{
    collections::HashMap,
    str::FromStr,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::{
    cfg::config::Config,
    directory::{AccountRef, Directory, Privilege, UserInfo},
};

/// One seeded account.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccount {
    pub name: String,
    pub password: Option<String>,
    pub certfps: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub privileges: Vec<Privilege>,
    pub operclass: Option<String>,
    pub waitauth: bool,
}

impl MemoryAccount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Adds a certificate fingerprint (normalized to lowercase hex).
    pub fn certfp(mut self, fp: impl AsRef<str>) -> Self {
        self.certfps.push(fp.as_ref().to_ascii_lowercase());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn privilege(mut self, privilege: Privilege) -> Self {
        self.privileges.push(privilege);
        self
    }

    pub fn operclass(mut self, class: impl Into<String>) -> Self {
        self.operclass = Some(class.into());
        self
    }

    pub fn waitauth(mut self) -> Self {
        self.waitauth = true;
        self
    }
}

#[derive(Debug)]
struct Record {
    eid: String,
    account: MemoryAccount,
    logins: Vec<String>,
    pending_login: bool,
}

/// Mutable state lives behind one mutex; the broker calls in from a single
/// task, so contention is not a concern here.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    records: Mutex<Vec<Record>>,
    eid_seq: AtomicU64,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a directory from the `accounts` section of a validated config.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let dir = Self::new();

        for seed in &cfg.accounts {
            let mut account = MemoryAccount::new(seed.name.as_str());
            account.password = seed.password.clone();
            account.certfps = seed.certfps.clone();
            account.operclass = seed.operclass.clone();
            account.metadata = seed.metadata.clone();
            for p in &seed.privileges {
                account.privileges.push(Privilege::from_str(p)?);
            }
            dir.add_account(account);
        }

        Ok(dir)
    }

    /// Seeds an account and returns its assigned entity-ID.
    pub fn add_account(&self, account: MemoryAccount) -> String {
        let seq = self.eid_seq.fetch_add(1, Ordering::Relaxed);
        let eid = format!("AAA{seq:06}");

        self.lock().push(Record {
            eid: eid.clone(),
            account,
            logins: Vec::new(),
            pending_login: false,
        });

        eid
    }

    /// Drops an account, as an expired registration would.
    pub fn drop_account(&self, eid: &str) {
        self.lock().retain(|r| r.eid != eid);
    }

    pub fn logins_of(&self, eid: &str) -> Vec<String> {
        self.lock()
            .iter()
            .find(|r| r.eid == eid)
            .map(|r| r.logins.clone())
            .unwrap_or_default()
    }

    pub fn pending_login(&self, eid: &str) -> bool {
        self.lock()
            .iter()
            .find(|r| r.eid == eid)
            .is_some_and(|r| r.pending_login)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve<T>(&self, eid: &str, f: impl FnOnce(&Record) -> T) -> Option<T> {
        self.lock().iter().find(|r| r.eid == eid).map(f)
    }
}

impl Directory for MemoryDirectory {
    fn find_by_nick(&self, nick: &str) -> Option<AccountRef> {
        self.lock()
            .iter()
            .find(|r| r.account.name.eq_ignore_ascii_case(nick))
            .map(|r| AccountRef {
                name: r.account.name.clone(),
                eid: r.eid.clone(),
            })
    }

    fn find_by_eid(&self, eid: &str) -> Option<AccountRef> {
        self.resolve(eid, |r| AccountRef {
            name: r.account.name.clone(),
            eid: r.eid.clone(),
        })
    }

    fn find_by_certfp(&self, certfp: &str) -> Option<AccountRef> {
        self.lock()
            .iter()
            .find(|r| r.account.certfps.iter().any(|fp| fp == certfp))
            .map(|r| AccountRef {
                name: r.account.name.clone(),
                eid: r.eid.clone(),
            })
    }

    fn verify_password(&self, account: &AccountRef, password: &[u8]) -> bool {
        self.resolve(&account.eid, |r| match &r.account.password {
            Some(stored) => stored.as_bytes().ct_eq(password).into(),
            None => false,
        })
        .unwrap_or(false)
    }

    fn metadata(&self, eid: &str, key: &str) -> Option<String> {
        self.resolve(eid, |r| r.account.metadata.get(key).cloned())?
    }

    fn login_count(&self, eid: &str) -> usize {
        self.resolve(eid, |r| r.logins.len()).unwrap_or(0)
    }

    fn has_priv(&self, eid: &str, privilege: &Privilege) -> bool {
        self.resolve(eid, |r| r.account.privileges.contains(privilege))
            .unwrap_or(false)
    }

    fn operclass(&self, eid: &str) -> Option<String> {
        self.resolve(eid, |r| r.account.operclass.clone())?
    }

    fn waitauth(&self, eid: &str) -> bool {
        self.resolve(eid, |r| r.account.waitauth).unwrap_or(false)
    }

    fn mark_pending_login(&self, eid: &str) {
        if let Some(r) = self.lock().iter_mut().find(|r| r.eid == eid) {
            r.pending_login = true;
        }
    }

    fn attach_login(&self, user: &UserInfo, account: &AccountRef) {
        let mut records = self.lock();
        let Some(r) = records.iter_mut().find(|r| r.eid == account.eid) else {
            debug!("attach_login: account {} vanished", account.name);
            return;
        };
        r.pending_login = false;
        r.logins.push(user.uid.clone());
    }
}
