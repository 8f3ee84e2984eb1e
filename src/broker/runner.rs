// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The event loop that owns a [`Broker`].
//!
//! Everything the surrounding framework can deliver (SASL frames, user
//! introductions, end-of-burst) arrives as a [`BrokerEvent`] on one channel,
//! so frames of a session are processed strictly in arrival order and no two
//! events ever interleave.

use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{broker::Broker, directory::UserInfo, frames::message::SaslMessage};

/// One externally visible broker operation.
#[derive(Debug)]
pub enum BrokerEvent {
    /// A SASL S2S frame from the link (`sasl_input` hook).
    SaslInput(SaslMessage),
    /// A user was introduced to the network (`user_add` hook).
    UserAdd(UserInfo),
    /// A server finished bursting (`server_eob` hook).
    ServerEob,
    /// Someone messaged the service directly.
    ServiceMessage { from_nick: String },
}

impl Broker {
    pub fn dispatch(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::SaslInput(msg) => self.handle_input(&msg),
            BrokerEvent::UserAdd(user) => self.handle_user_add(&user),
            BrokerEvent::ServerEob => self.handle_server_eob(),
            BrokerEvent::ServiceMessage { from_nick } => {
                self.handle_service_message(&from_nick)
            },
        }
    }
}

/// Drives the broker until the channel closes or `cancel` fires.
pub async fn run_broker(
    mut broker: Broker,
    mut events: mpsc::Receiver<BrokerEvent>,
    cancel: CancellationToken,
) {
    let period = broker.reap_interval();
    let mut reap_tick = interval_at(Instant::now() + period, period);
    reap_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("broker runner cancelled");
                break;
            },
            event = events.recv() => match event {
                Some(event) => broker.dispatch(event),
                None => {
                    debug!("broker event channel closed");
                    break;
                },
            },
            _ = reap_tick.tick() => broker.reap_stale(),
        }
    }

    if broker.session_count() != 0 {
        error!(
            "shutting down with {} live session(s); a mechanism did not \
             unregister itself (BUG)",
            broker.session_count()
        );
    }
}
