// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tracing::debug;

use crate::{frames::chunk::MAX_ATONCE_B64, mechanism::SaslMechanism};

/// The mechanisms currently available to offer, in registration order,
/// together with the advertised mechlist string.
///
/// Pure bookkeeping: pushing the rebuilt list to the uplink and destroying
/// the sessions of an unregistered mechanism are the broker's business.
#[derive(Default)]
pub struct MechRegistry {
    mechanisms: Vec<Arc<dyn SaslMechanism>>,
    mechlist: String,
}

impl MechRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mechanism. Returns false (and changes nothing) when one with
    /// the same name is already registered.
    pub fn register(&mut self, mech: Arc<dyn SaslMechanism>) -> bool {
        if self.find(mech.name()).is_some() {
            debug!("registry: mechanism {} already registered", mech.name());
            return false;
        }

        debug!("registry: registering {}", mech.name());
        self.mechanisms.push(mech);
        self.rebuild();
        true
    }

    /// Removes a mechanism by name. Returns false when it was not present.
    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(idx) = self.mechanisms.iter().position(|m| m.name() == name) else {
            return false;
        };

        debug!("registry: unregistering {name}");
        self.mechanisms.remove(idx);
        self.rebuild();
        true
    }

    /// Exact-name lookup (RFC 4422 names are case-sensitive).
    pub fn find(&self, name: &str) -> Option<Arc<dyn SaslMechanism>> {
        self.mechanisms
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    /// The advertised comma-separated mechanism list.
    pub fn mechlist(&self) -> &str {
        &self.mechlist
    }

    pub fn is_empty(&self) -> bool {
        self.mechanisms.is_empty()
    }

    /// Rebuilds the advertised string. Names are appended in registration
    /// order until the next one would no longer fit in a single frame; the
    /// remainder is silently omitted.
    fn rebuild(&mut self) {
        self.mechlist.clear();

        for mech in &self.mechanisms {
            let name = mech.name();
            let extra = if self.mechlist.is_empty() {
                name.len()
            } else {
                name.len() + 1
            };

            if self.mechlist.len() + extra >= MAX_ATONCE_B64 {
                break;
            }

            if !self.mechlist.is_empty() {
                self.mechlist.push(',');
            }
            self.mechlist.push_str(name);
        }
    }
}
