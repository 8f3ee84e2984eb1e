// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, fs, path::Path, str::FromStr, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::directory::Privilege;

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Service identity and presentation.
    pub service: ServiceConfig,
    /// Global login limits.
    pub limits: Limits,
    /// Reaper timing.
    pub timing: Timing,
    /// Behavioral quirks of the linked IRCd dialect.
    pub ircd: IrcdConfig,
    /// Which mechanisms to register at startup.
    pub mechanisms: Mechanisms,
    /// Accounts seeded into the in-memory directory. Only meaningful for
    /// the demo binary and tests; production sits on a real database.
    pub accounts: Vec<AccountSeed>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    #[serde(rename = "Nick")]
    /// Nick the service appears as.
    pub nick: String,

    #[serde(rename = "HideServerNames")]
    /// Suppress originating server names in synthesized source strings.
    pub hide_server_names: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nick: "SaslServ".to_owned(),
            hide_server_names: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Limits {
    #[serde(rename = "MaxLogins")]
    /// Maximum number of simultaneous logins per account.
    pub max_logins: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_logins: 5 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Timing {
    #[serde(rename = "ReapInterval", with = "serde_secs")]
    /// Period of the stale-session sweep. A session survives one to two
    /// intervals of inactivity.
    pub reap_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reap_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct IrcdConfig {
    #[serde(rename = "UsesPreloginUid")]
    /// Whether the dialect identifies users by persistent UIDs before the
    /// login burst. Gates the pending-login flag and the timed-out log.
    pub uses_prelogin_uid: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Mechanisms {
    #[serde(rename = "Enabled")]
    /// Mechanism names to register at startup, in advertisement order.
    pub enabled: Vec<String>,
}

impl Default for Mechanisms {
    fn default() -> Self {
        Self {
            enabled: vec!["PLAIN".to_owned(), "EXTERNAL".to_owned()],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AccountSeed {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Password")]
    pub password: Option<String>,
    #[serde(rename = "CertFp")]
    /// TLS certificate fingerprints, hex.
    pub certfps: Vec<String>,
    #[serde(rename = "Operclass")]
    pub operclass: Option<String>,
    #[serde(rename = "Privileges")]
    /// Textual privilege keys, e.g. `impersonate:class:user`.
    pub privileges: Vec<String>,
    #[serde(rename = "Metadata")]
    pub metadata: HashMap<String, String>,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.service.nick.is_empty(), "Nick must not be empty");
        ensure!(self.limits.max_logins >= 1, "MaxLogins must be >= 1");
        ensure!(
            self.timing.reap_interval >= Duration::from_secs(1),
            "ReapInterval must be >= 1 second"
        );

        ensure!(
            !self.mechanisms.enabled.is_empty(),
            "at least one mechanism must be enabled"
        );
        for (i, name) in self.mechanisms.enabled.iter().enumerate() {
            ensure!(
                !self.mechanisms.enabled[..i].contains(name),
                "mechanism '{name}' enabled twice"
            );
        }

        for (i, seed) in self.accounts.iter_mut().enumerate() {
            ensure!(!seed.name.is_empty(), "account #{i} has an empty Name");

            // Fingerprints live as lowercase hex everywhere downstream.
            for fp in &mut seed.certfps {
                let raw = hex::decode(fp.as_str())
                    .with_context(|| format!("account '{}': bad CertFp", seed.name))?;
                *fp = hex::encode(raw);
            }

            for p in &seed.privileges {
                Privilege::from_str(p).with_context(|| {
                    format!("account '{}': bad privilege", seed.name)
                })?;
            }
        }

        let mut names: Vec<&str> =
            self.accounts.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        ensure!(
            names.len() == self.accounts.len(),
            "account names must be unique"
        );

        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
