// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;
use std::{any::Any, sync::Arc};

use bitflags::bitflags;

use crate::{
    frames::chunk::ChunkAssembler, mechanism::SaslMechanism, session::source::SourceInfo,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SessionFlags: u32 {
        /// The finalizer must still emit a login log line for this session.
        const NEED_LOG = 1 << 0;
        /// Set by one reaper tick, collected by the next.
        const MARKED_FOR_DELETION = 1 << 1;
    }
}

/// Where the exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Session exists, no mechanism selected yet.
    New,
    /// Mechanism selected, rounds in flight.
    InProgress,
    /// Mechanism succeeded; waiting for the IRC link to introduce the user.
    AwaitingUserAdd,
}

/// One in-flight SASL exchange, keyed by the server-assigned `uid`.
pub struct Session {
    pub uid: String,
    /// Name of the originating server. Lookup only, never ownership.
    pub server: Option<String>,

    pub host: Option<String>,
    pub ip: Option<String>,
    pub tls: bool,
    /// TLS client certificate fingerprint, lowercase hex.
    pub certfp: Option<String>,

    pub mech: Option<Arc<dyn SaslMechanism>>,
    /// Opaque per-session state owned by the mechanism. Created on `S`,
    /// released by the mechanism's `finish`.
    pub mech_state: Option<Box<dyn Any + Send>>,

    /// Buffers partial base64 runs between `C` frames.
    pub assembler: ChunkAssembler,

    /// Authentication identity: who proved credentials.
    pub authcid: Option<String>,
    pub authceid: Option<String>,
    /// Authorization identity: who will be logged in. Defaults to the
    /// authentication identity when still unset at success.
    pub authzid: Option<String>,
    pub authzeid: Option<String>,

    pub flags: SessionFlags,
    pub phase: SessionPhase,

    pub source: SourceInfo,
}

impl Session {
    pub fn new(uid: impl Into<String>, server: Option<&str>, hide_server_names: bool) -> Self {
        let uid = uid.into();
        let source =
            SourceInfo::new(uid.as_str(), None, None, server, hide_server_names);

        Self {
            uid,
            server: server.map(str::to_owned),
            host: None,
            ip: None,
            tls: false,
            certfp: None,
            mech: None,
            mech_state: None,
            assembler: ChunkAssembler::default(),
            authcid: None,
            authceid: None,
            authzid: None,
            authzeid: None,
            flags: SessionFlags::empty(),
            phase: SessionPhase::New,
            source,
        }
    }

    /// Rebuilds the attribution descriptor from the current session state.
    pub fn recreate_source(&mut self, hide_server_names: bool) {
        self.source = SourceInfo::new(
            self.uid.as_str(),
            self.host.as_deref(),
            self.ip.as_deref(),
            self.server.as_deref(),
            hide_server_names,
        );
    }

    /// Name of the selected mechanism, `"?"` before selection.
    pub fn mech_name(&self) -> &str {
        self.mech.as_deref().map_or("?", |m| m.name())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("server", &self.server)
            .field("mech", &self.mech_name())
            .field("phase", &self.phase)
            .field("flags", &self.flags)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}
