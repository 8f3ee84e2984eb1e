// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use sasl_broker_rs::{
    directory::memory::{MemoryAccount, MemoryDirectory},
    mechanism::{MechContext, SaslMechanism, StepOutput},
};

use crate::unit_tests::{broker_over, feed};

struct Echo;

impl SaslMechanism for Echo {
    fn name(&self) -> &'static str {
        "ECHO"
    }

    fn step(&self, _ctx: &mut MechContext<'_>, _input: Option<&[u8]>) -> StepOutput {
        StepOutput::more()
    }
}

fn empty_directory() -> Arc<MemoryDirectory> {
    let dir = MemoryDirectory::new();
    dir.add_account(MemoryAccount::new("alice").password("hunter2"));
    Arc::new(dir)
}

#[test]
fn registration_pushes_the_mechlist() {
    let (mut broker, uplink) = broker_over(empty_directory());

    // Broker construction registers the configured mechanisms one by one.
    assert_eq!(
        uplink.drain(),
        ["MECHLIST PLAIN", "MECHLIST PLAIN,EXTERNAL"]
    );

    broker.register_mechanism(Arc::new(Echo));
    assert_eq!(uplink.drain(), ["MECHLIST PLAIN,EXTERNAL,ECHO"]);

    // Duplicate registration changes nothing and stays silent.
    broker.register_mechanism(Arc::new(Echo));
    assert_eq!(uplink.drain(), Vec::<String>::new());
}

#[test]
fn unregistering_destroys_bound_sessions() {
    let (mut broker, uplink) = broker_over(empty_directory());
    uplink.drain();

    feed(&mut broker, "u1 S PLAIN");
    feed(&mut broker, "u2 S EXTERNAL aa11");
    feed(&mut broker, "u3 S PLAIN");
    uplink.drain();

    broker.unregister_mechanism("PLAIN");
    assert!(!broker.has_session("u1"));
    assert!(!broker.has_session("u3"));
    assert!(broker.has_session("u2"), "other mechanisms are unaffected");

    // Teardown is silent; only the new advertisement goes out.
    assert_eq!(uplink.drain(), ["MECHLIST EXTERNAL"]);
    assert_eq!(broker.mechlist(), "EXTERNAL");
}

#[test]
fn unregistering_an_unknown_name_is_a_no_op() {
    let (mut broker, uplink) = broker_over(empty_directory());
    uplink.drain();

    broker.unregister_mechanism("SCRAM-SHA-256");
    assert_eq!(uplink.drain(), Vec::<String>::new());
    assert_eq!(broker.mechlist(), "PLAIN,EXTERNAL");
}

#[test]
fn register_then_unregister_restores_the_advertisement() {
    let (mut broker, uplink) = broker_over(empty_directory());
    uplink.drain();
    let before = broker.mechlist().to_owned();

    broker.register_mechanism(Arc::new(Echo));
    broker.unregister_mechanism("ECHO");
    assert_eq!(broker.mechlist(), before);
}

#[test]
fn server_eob_advertises() {
    let (mut broker, uplink) = broker_over(empty_directory());
    uplink.drain();

    broker.handle_server_eob();
    assert_eq!(uplink.drain(), ["MECHLIST PLAIN,EXTERNAL"]);
}
