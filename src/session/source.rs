// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

/// Attribution descriptor for a session.
///
/// Downstream consumers (log lines, policy hooks) receive this instead of
/// the session itself. It is recreated, not mutated, whenever
/// identity-affecting state changes, so holders never observe a session
/// mid-update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    uid: String,
    host: Option<String>,
    ip: Option<String>,
    server: Option<String>,
    hide_server_names: bool,
}

impl SourceInfo {
    pub fn new(
        uid: impl Into<String>,
        host: Option<&str>,
        ip: Option<&str>,
        server: Option<&str>,
        hide_server_names: bool,
    ) -> Self {
        Self {
            uid: uid.into(),
            host: host.map(str::to_owned),
            ip: ip.map(str::to_owned),
            server: server.map(str::to_owned),
            hide_server_names,
        }
    }

    /// Full attribution, e.g. `SASL/042AAAAAB:host.example[1.2.3.4]:irc.example.net`.
    pub fn format_full(&self) -> String {
        format!(
            "SASL/{}:{}[{}]:{}",
            self.uid,
            self.host.as_deref().unwrap_or("?"),
            self.ip.as_deref().unwrap_or("?"),
            self.server.as_deref().unwrap_or("?"),
        )
    }

    /// Brief attribution, e.g. `SASL(host.example)`.
    pub fn format_brief(&self) -> String {
        format!("SASL({})", self.host.as_deref().unwrap_or("?"))
    }

    /// Human-readable source description for notices.
    pub fn source_name(&self) -> String {
        let description = match &self.server {
            Some(server) if !self.hide_server_names => {
                format!("Unknown user on {server} (via SASL)")
            },
            _ => "Unknown user (via SASL)".to_owned(),
        };

        match &self.host {
            Some(host) => format!("<{description}:{host}>"),
            None => format!("<{description}>"),
        }
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_full())
    }
}
