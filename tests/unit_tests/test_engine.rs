// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use sasl_broker_rs::directory::{
    Directory, UserInfo,
    memory::{MemoryAccount, MemoryDirectory},
};

use crate::unit_tests::{b64, broker_over, feed};

fn alice_directory() -> Arc<MemoryDirectory> {
    let dir = MemoryDirectory::new();
    dir.add_account(MemoryAccount::new("alice").password("hunter2"));
    Arc::new(dir)
}

#[test]
fn plain_login_end_to_end() {
    let dir = alice_directory();
    let (mut broker, uplink) = broker_over(dir.clone());
    uplink.drain();

    feed(&mut broker, "u1 H host.example 1.2.3.4 P");
    feed(&mut broker, "u1 S PLAIN");
    // PLAIN sends no challenge; the broker keeps the dialogue moving.
    assert_eq!(uplink.drain(), ["u1 C +"]);

    feed(&mut broker, &format!("u1 C {}", b64("\0alice\0hunter2")));
    assert_eq!(
        uplink.drain(),
        ["SVSLOGIN u1 * * * alice", "u1 D S"]
    );
    assert!(broker.has_session("u1"), "session must wait for user_add");

    let eid = dir.find_by_nick("alice").expect("alice must exist").eid;
    broker.handle_user_add(&UserInfo {
        uid: "u1".to_owned(),
        nick: "alice`".to_owned(),
    });
    assert!(!broker.has_session("u1"));
    assert_eq!(dir.logins_of(&eid), ["u1"]);
}

#[test]
fn plain_login_applies_the_usercloak() {
    let dir = MemoryDirectory::new();
    dir.add_account(
        MemoryAccount::new("alice")
            .password("hunter2")
            .metadata("private:usercloak", "alice.users.example.net"),
    );
    let (mut broker, uplink) = broker_over(Arc::new(dir));
    uplink.drain();

    feed(&mut broker, "u1 S PLAIN");
    feed(&mut broker, &format!("u1 C {}", b64("\0alice\0hunter2")));
    assert_eq!(
        uplink.drain(),
        [
            "u1 C +",
            "SVSLOGIN u1 * * alice.users.example.net alice",
            "u1 D S"
        ]
    );
}

#[test]
fn plain_bad_password_fails_the_session() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u1 S PLAIN");
    feed(&mut broker, &format!("u1 C {}", b64("\0alice\0wrong")));
    assert_eq!(uplink.drain(), ["u1 C +", "u1 D F"]);
    assert!(!broker.has_session("u1"));
}

#[test]
fn external_without_fingerprint_aborts() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u2 H host.example 1.2.3.4 S");
    feed(&mut broker, "u2 S EXTERNAL");
    assert_eq!(uplink.drain(), ["u2 D F"]);
    assert!(!broker.has_session("u2"));
}

#[test]
fn external_login_by_fingerprint() {
    let dir = MemoryDirectory::new();
    dir.add_account(MemoryAccount::new("bob").certfp("a1b2c3d4"));
    let (mut broker, uplink) = broker_over(Arc::new(dir));
    uplink.drain();

    // Fingerprints arrive in whatever case the IRCd uses.
    feed(&mut broker, "u2 S EXTERNAL A1B2C3D4");
    assert_eq!(uplink.drain(), ["u2 C +"]);

    feed(&mut broker, "u2 C +");
    assert_eq!(uplink.drain(), ["SVSLOGIN u2 * * * bob", "u2 D S"]);
}

#[test]
fn oversized_client_data_aborts() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u3 H host.example 1.2.3.4 P");
    feed(&mut broker, "u3 S PLAIN");
    uplink.drain();

    let full = "A".repeat(400);
    feed(&mut broker, &format!("u3 C {full}"));
    feed(&mut broker, &format!("u3 C {full}"));
    assert_eq!(uplink.drain(), Vec::<String>::new(), "chunks must buffer silently");

    // 1200 bytes would exceed the 1024-byte cap.
    feed(&mut broker, &format!("u3 C {full}"));
    assert_eq!(uplink.drain(), ["u3 D F"]);
    assert!(!broker.has_session("u3"));
}

#[test]
fn unknown_mechanism_readvertises_and_session_survives() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u4 S FOOBAR");
    assert_eq!(uplink.drain(), ["u4 M PLAIN,EXTERNAL"]);
    assert!(broker.has_session("u4"));

    // The client retries with a supported mechanism.
    feed(&mut broker, "u4 S PLAIN");
    assert_eq!(uplink.drain(), ["u4 C +"]);
    feed(&mut broker, &format!("u4 C {}", b64("\0alice\0hunter2")));
    assert_eq!(uplink.drain(), ["SVSLOGIN u4 * * * alice", "u4 D S"]);
}

#[test]
fn undecodable_base64_aborts() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u5 S PLAIN");
    uplink.drain();
    feed(&mut broker, "u5 C !!!!");
    assert_eq!(uplink.drain(), ["u5 D F"]);
}

#[test]
fn client_data_after_success_aborts() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u1 S PLAIN");
    feed(&mut broker, &format!("u1 C {}", b64("\0alice\0hunter2")));
    uplink.drain();

    feed(&mut broker, &format!("u1 C {}", b64("\0alice\0hunter2")));
    assert_eq!(uplink.drain(), ["u1 D F"]);
    assert!(!broker.has_session("u1"));
}

#[test]
fn client_star_aborts_the_exchange() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u6 S PLAIN");
    uplink.drain();
    feed(&mut broker, "u6 C *");
    assert_eq!(uplink.drain(), ["u6 D F"]);
    assert!(!broker.has_session("u6"));
}

#[test]
fn inbound_done_destroys_quietly() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u7 S PLAIN");
    uplink.drain();
    feed(&mut broker, "u7 D");
    assert_eq!(uplink.drain(), Vec::<String>::new());
    assert!(!broker.has_session("u7"));
}

#[test]
fn restarting_mid_exchange_aborts() {
    let (mut broker, uplink) = broker_over(alice_directory());
    uplink.drain();

    feed(&mut broker, "u8 S PLAIN");
    uplink.drain();
    feed(&mut broker, "u8 S EXTERNAL AA");
    assert_eq!(uplink.drain(), ["u8 D F"]);
}
