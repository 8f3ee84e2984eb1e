// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use sasl_broker_rs::{
    broker::runner::{BrokerEvent, run_broker},
    cfg::config::Config,
    directory::memory::{MemoryAccount, MemoryDirectory},
    frames::message::SaslMessage,
    mechanism::{MechContext, SaslMechanism, StepOutput},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::unit_tests::{broker_over, broker_with, feed};

/// Mechanism that never concludes; every round asks for more data.
struct NeverDone;

impl SaslMechanism for NeverDone {
    fn name(&self) -> &'static str {
        "NEVERDONE"
    }

    fn step(&self, _ctx: &mut MechContext<'_>, _input: Option<&[u8]>) -> StepOutput {
        StepOutput::more()
    }
}

fn alice_directory() -> Arc<MemoryDirectory> {
    let dir = MemoryDirectory::new();
    dir.add_account(MemoryAccount::new("alice").password("hunter2"));
    Arc::new(dir)
}

#[test]
fn idle_sessions_survive_one_tick_and_die_on_the_second() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u5 H host.example 1.2.3.4 P");
    feed(&mut broker, "u5 S PLAIN");
    let mechlist = broker.mechlist().to_owned();
    uplink.drain();

    broker.reap_stale();
    assert!(broker.has_session("u5"), "first tick only marks");

    broker.reap_stale();
    assert!(!broker.has_session("u5"), "second tick collects");

    // Expiry is silent towards the link, and the registry is untouched.
    assert_eq!(uplink.drain(), Vec::<String>::new());
    assert_eq!(broker.mechlist(), mechlist);
}

#[test]
fn any_frame_resets_the_reap_window() {
    let (mut broker, uplink) = broker_over(alice_directory());
    broker.register_mechanism(Arc::new(NeverDone));
    uplink.drain();

    feed(&mut broker, "u5 S NEVERDONE");

    broker.reap_stale();
    feed(&mut broker, "u5 C +");
    broker.reap_stale();
    assert!(broker.has_session("u5"), "progress must clear the mark");

    broker.reap_stale();
    feed(&mut broker, "u5 H host.example 1.2.3.4");
    broker.reap_stale();
    assert!(broker.has_session("u5"), "host info counts as progress too");

    broker.reap_stale();
    broker.reap_stale();
    assert!(!broker.has_session("u5"));
}

#[test]
fn session_parked_for_user_add_still_times_out() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u5 S PLAIN");
    feed(
        &mut broker,
        &format!("u5 C {}", crate::unit_tests::b64("\0alice\0hunter2")),
    );
    assert!(broker.has_session("u5"));
    uplink.drain();

    broker.reap_stale();
    broker.reap_stale();
    assert!(!broker.has_session("u5"));
    assert_eq!(uplink.drain(), Vec::<String>::new());
}

#[tokio::test(start_paused = true)]
async fn runner_ticks_the_reaper() {
    let mut cfg = Config::default();
    cfg.timing.reap_interval = Duration::from_secs(30);
    let (broker, uplink) = broker_with(cfg, alice_directory());
    uplink.drain();

    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let runner = tokio::spawn(run_broker(broker, rx, cancel.clone()));

    let msg = SaslMessage::parse("u5 S PLAIN").expect("parse failed");
    tx.send(BrokerEvent::SaslInput(msg)).await.expect("send failed");

    // Two full intervals of silence: mark, then collect.
    tokio::time::sleep(Duration::from_secs(65)).await;

    cancel.cancel();
    runner.await.expect("runner panicked");

    assert_eq!(uplink.drain(), ["u5 C +"]);
}
