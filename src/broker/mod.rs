// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The broker proper: session store, per-frame state machine, login
//! finalization and the stale-session reaper.
//!
//! All state is owned by one [`Broker`] value and mutated from a single
//! execution context (see [`runner`]); every inbound frame, hook call and
//! reaper tick runs to completion before the next one starts.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::{
    cfg::config::Config,
    directory::{Directory, METADATA_USERCLOAK, UserInfo},
    frames::{
        chunk::{self, Assembly},
        message::{SaslMessage, SaslMode},
    },
    mechanism::{self, MechContext, MechStatus, SaslMechanism, StepOutput, registry::MechRegistry},
    session::session::{Session, SessionFlags, SessionPhase},
};

use crate::broker::{hooks::Hooks, uplink::Uplink};

/// Policy hook surface.
pub mod hooks;
/// Login eligibility and impersonation policy.
mod policy;
/// The event loop driving a broker.
pub mod runner;
/// Outbound link surface.
pub mod uplink;

/// Rejection sent to anyone who messages the service directly.
const NO_PUBLIC_INTERFACE: &str = "This service exists to identify connecting clients \
                                   to the network. It has no public interface.";

pub struct Broker {
    cfg: Config,
    uplink: Arc<dyn Uplink>,
    directory: Arc<dyn Directory>,
    hooks: Arc<dyn Hooks>,
    registry: MechRegistry,
    sessions: HashMap<String, Session>,
}

impl Broker {
    /// Builds a broker and registers the mechanisms enabled in the config.
    pub fn new(
        cfg: Config,
        uplink: Arc<dyn Uplink>,
        directory: Arc<dyn Directory>,
        hooks: Arc<dyn Hooks>,
    ) -> Result<Self> {
        let enabled = cfg.mechanisms.enabled.clone();

        let mut broker = Self {
            cfg,
            uplink,
            directory,
            hooks,
            registry: MechRegistry::new(),
            sessions: HashMap::new(),
        };

        for name in &enabled {
            let mech = mechanism::builtin(name)
                .with_context(|| format!("unknown mechanism '{name}' in config"))?;
            broker.register_mechanism(mech);
        }

        Ok(broker)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn reap_interval(&self) -> Duration {
        self.cfg.timing.reap_interval
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, uid: &str) -> bool {
        self.sessions.contains_key(uid)
    }

    pub fn mechlist(&self) -> &str {
        self.registry.mechlist()
    }

    // ── inbound frames ──────────────────────────────────────────────────

    /// Entry point for the `sasl_input` hook: one frame from the link.
    pub fn handle_input(&mut self, msg: &SaslMessage) {
        if msg.mode == SaslMode::MechList {
            debug!("ignoring inbound M frame for {}", msg.uid);
            return;
        }

        let mut sess = self.sessions.remove(&msg.uid).unwrap_or_else(|| {
            Session::new(
                msg.uid.as_str(),
                msg.server.as_deref(),
                self.cfg.service.hide_server_names,
            )
        });

        let keep = match msg.mode {
            SaslMode::Host => {
                Self::input_hostinfo(&mut sess, &msg.parv);
                true
            },
            SaslMode::Start => self.input_startauth(&mut sess, &msg.parv),
            SaslMode::Client => match msg.parv.first() {
                Some(chunk) => self.input_clientdata(&mut sess, chunk),
                None => false,
            },
            SaslMode::Done => {
                // Client-side end or abort; nothing further to send.
                self.destroy_session(sess);
                return;
            },
            SaslMode::MechList => return,
        };

        if keep {
            self.sessions.insert(sess.uid.clone(), sess);
        } else {
            self.abort_session(sess);
        }
    }

    fn input_hostinfo(sess: &mut Session, parv: &[String]) {
        sess.host = parv.first().cloned();
        sess.ip = parv.get(1).cloned();

        if parv.get(2).is_some_and(|p| p != "P") {
            sess.tls = true;
        }

        // Counts as progress for the reaper, like any other frame.
        sess.flags.remove(SessionFlags::MARKED_FOR_DELETION);
    }

    fn input_startauth(&mut self, sess: &mut Session, parv: &[String]) -> bool {
        let Some(mechname) = parv.first() else {
            return false;
        };

        if sess.phase != SessionPhase::New {
            debug!(
                "client {} restarted authentication mid-exchange",
                sess.uid
            );
            return false;
        }

        if mechname == "EXTERNAL" {
            let Some(fingerprint) = parv.get(1) else {
                debug!(
                    "client {} starting EXTERNAL authentication without a fingerprint",
                    sess.uid
                );
                return false;
            };

            let Ok(raw) = hex::decode(fingerprint) else {
                debug!("client {} sent a malformed fingerprint", sess.uid);
                return false;
            };

            sess.certfp = Some(hex::encode(raw));
            sess.tls = true;
        }

        self.packet_start(sess, mechname)
    }

    fn input_clientdata(&mut self, sess: &mut Session, chunk: &str) -> bool {
        if sess.phase == SessionPhase::AwaitingUserAdd {
            debug!("client {} sent data after completion", sess.uid);
            return false;
        }

        sess.flags.remove(SessionFlags::MARKED_FOR_DELETION);

        match sess.assembler.push(chunk) {
            Ok(Assembly::Abort) => false,
            Ok(Assembly::Buffering) => true,
            Ok(Assembly::PassThrough) => self.packet_step(sess, None),
            Ok(Assembly::Ready(b64)) => self.packet_step(sess, Some(&b64)),
            Err(e) => {
                debug!("client {}: {e}", sess.uid);
                false
            },
        }
    }

    // ── the per-round engine ────────────────────────────────────────────

    fn packet_start(&mut self, sess: &mut Session, mechname: &str) -> bool {
        sess.recreate_source(self.cfg.service.hide_server_names);

        let Some(mech) = self.registry.find(mechname) else {
            debug!("cannot find mechanism '{mechname}'");
            self.uplink
                .sasl_sts(&sess.uid, 'M', self.registry.mechlist());
            // The advertisement counts as progress; the client gets a fresh
            // window to retry with a known mechanism.
            sess.flags.remove(SessionFlags::MARKED_FOR_DELETION);
            return true;
        };

        sess.mech = Some(mech.clone());
        sess.phase = SessionPhase::InProgress;

        let out = {
            let mut ctx = MechContext {
                session: sess,
                directory: self.directory.as_ref(),
                hooks: self.hooks.as_ref(),
            };
            mech.start(&mut ctx)
        };

        self.finish_round(sess, out)
    }

    fn packet_step(&mut self, sess: &mut Session, b64: Option<&str>) -> bool {
        let Some(mech) = sess.mech.clone() else {
            error!("session {} has no mechanism (BUG)", sess.uid);
            return false;
        };

        let decoded = match b64 {
            None => None,
            Some(b64) => match chunk::decode_payload(b64) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    debug!("session {}: {e:#}", sess.uid);
                    return false;
                },
            },
        };

        let out = {
            let mut ctx = MechContext {
                session: sess,
                directory: self.directory.as_ref(),
                hooks: self.hooks.as_ref(),
            };
            mech.step(&mut ctx, decoded.as_ref().map(|d| d.as_slice()))
        };

        self.finish_round(sess, out)
    }

    /// Emits the round's reply and applies the status rules. Returns whether
    /// the session survives.
    fn finish_round(&mut self, sess: &mut Session, out: StepOutput) -> bool {
        // Progress was made; give the session a fresh reaper window.
        sess.flags.remove(SessionFlags::MARKED_FOR_DELETION);

        let mut have_written = false;
        if let Some(reply) = &out.reply
            && !reply.is_empty()
        {
            let encoded = chunk::encode_payload(reply);
            for piece in chunk::split_reply(&encoded) {
                self.uplink.sasl_sts(&sess.uid, 'C', &piece);
            }
            have_written = true;
        }

        match out.status {
            MechStatus::More => {
                if !have_written {
                    // Nothing of our own to send; an empty chunk keeps the
                    // dialogue moving.
                    self.uplink.sasl_sts(&sess.uid, 'C', "+");
                }
                true
            },
            MechStatus::Done => self.finalize_login(sess),
            MechStatus::Fail => {
                self.report_bad_password(sess);
                false
            },
            MechStatus::Error => false,
        }
    }

    /// Runs the eligibility policy and, on success, parks the session until
    /// the IRC link introduces the user.
    fn finalize_login(&mut self, sess: &mut Session) -> bool {
        let Some(account) = self.login_user(sess) else {
            return false;
        };

        let cloak = self
            .directory
            .metadata(&account.eid, METADATA_USERCLOAK)
            .unwrap_or_else(|| "*".to_owned());

        if !self.directory.waitauth(&account.eid) {
            self.uplink
                .svslogin_sts(&sess.uid, "*", "*", &cloak, &account);
        }

        self.uplink.sasl_sts(&sess.uid, 'D', "S");

        sess.phase = SessionPhase::AwaitingUserAdd;
        true
    }

    fn report_bad_password(&self, sess: &mut Session) {
        let Some(ceid) = sess.authceid.clone() else {
            return;
        };
        let Some(account) = self.directory.find_by_eid(&ceid) else {
            return;
        };

        sess.recreate_source(self.cfg.service.hide_server_names);

        info!(
            source = %sess.source,
            "failed LOGIN ({}) to {} (bad password)", sess.mech_name(), account.name
        );
        self.hooks.bad_password(&sess.source, &account);
    }

    // ── hooks from the surrounding framework ────────────────────────────

    /// `user_add` hook: the IRC link introduced a user. Completes a parked
    /// login, or cancels it when the account vanished in between.
    pub fn handle_user_add(&mut self, user: &UserInfo) {
        let Some(mut sess) = self.sessions.remove(&user.uid) else {
            return;
        };

        // The login is logged here, not by destroy_session.
        sess.flags.remove(SessionFlags::NEED_LOG);

        let account = sess
            .authzeid
            .as_deref()
            .and_then(|eid| self.directory.find_by_eid(eid));

        let Some(account) = account else {
            let dropped = sess.authzid.as_deref().unwrap_or("???");
            self.uplink.notice(
                &self.cfg.service.nick,
                &user.nick,
                &format!("Account {dropped} dropped, login cancelled"),
            );
            self.destroy_session(sess);
            return;
        };

        let mech = sess.mech_name().to_owned();
        self.destroy_session(sess);

        self.directory.attach_login(user, &account);
        info!(user = %user.nick, account = %account.name, "LOGIN ({mech})");
    }

    /// `server_eob` hook: a server finished bursting; advertise mechanisms.
    pub fn handle_server_eob(&mut self) {
        self.uplink.mechlist_sts(self.registry.mechlist());
    }

    /// Anything said directly to the service gets the same brush-off.
    pub fn handle_service_message(&self, from_nick: &str) {
        self.uplink
            .notice(&self.cfg.service.nick, from_nick, NO_PUBLIC_INTERFACE);
    }

    // ── mechanism lifecycle ─────────────────────────────────────────────

    pub fn register_mechanism(&mut self, mech: Arc<dyn SaslMechanism>) {
        if self.registry.register(mech) {
            self.push_mechlist();
        }
    }

    /// Removes a mechanism, destroying every session still bound to it.
    pub fn unregister_mechanism(&mut self, name: &str) {
        let affected: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.mech.as_deref().is_some_and(|m| m.name() == name))
            .map(|s| s.uid.clone())
            .collect();

        for uid in affected {
            if let Some(sess) = self.sessions.remove(&uid) {
                debug!("unregister {name}: destroying session {uid}");
                self.destroy_session(sess);
            }
        }

        if self.registry.unregister(name) {
            self.push_mechlist();
        }
    }

    fn push_mechlist(&self) {
        if self.uplink.connected() {
            self.uplink.mechlist_sts(self.registry.mechlist());
        }
    }

    // ── reaper and teardown ─────────────────────────────────────────────

    /// One reaper tick: collect sessions marked on the previous tick, mark
    /// the rest. Any forward progress clears the mark, so a session gets
    /// one to two full intervals of idleness before collection.
    pub fn reap_stale(&mut self) {
        let expired: Vec<String> = self
            .sessions
            .values_mut()
            .filter_map(|sess| {
                if sess.flags.contains(SessionFlags::MARKED_FOR_DELETION) {
                    Some(sess.uid.clone())
                } else {
                    sess.flags.insert(SessionFlags::MARKED_FOR_DELETION);
                    None
                }
            })
            .collect();

        for uid in expired {
            if let Some(sess) = self.sessions.remove(&uid) {
                debug!("reaper: destroying stale session {uid}");
                self.destroy_session(sess);
            }
        }
    }

    /// Protocol failure: tell the link, then tear down.
    fn abort_session(&self, sess: Session) {
        self.uplink.sasl_sts(&sess.uid, 'D', "F");
        self.destroy_session(sess);
    }

    fn destroy_session(&self, mut sess: Session) {
        if sess.flags.contains(SessionFlags::NEED_LOG)
            && let Some(ceid) = sess.authceid.clone()
            && self.directory.find_by_eid(&ceid).is_some()
            && !self.cfg.ircd.uses_prelogin_uid
        {
            info!(source = %sess.source, "LOGIN (session timed out)");
        }

        if let Some(mech) = sess.mech.clone() {
            mech.finish(&mut sess);
        }

        // The assembler and any decoded buffers wipe themselves on drop.
    }
}
