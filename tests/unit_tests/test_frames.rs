// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use sasl_broker_rs::frames::message::{FrameError, SaslMessage, SaslMode};

#[test]
fn parses_the_four_inbound_modes() {
    let msg = SaslMessage::parse("042AAAAAB H host.example 1.2.3.4 P")
        .expect("H frame must parse");
    assert_eq!(msg.uid, "042AAAAAB");
    assert_eq!(msg.mode, SaslMode::Host);
    assert_eq!(msg.parv, ["host.example", "1.2.3.4", "P"]);
    assert_eq!(msg.server, None);

    let msg = SaslMessage::parse("u1 S EXTERNAL ABCD").expect("S frame must parse");
    assert_eq!(msg.mode, SaslMode::Start);
    assert_eq!(msg.parv, ["EXTERNAL", "ABCD"]);

    let msg = SaslMessage::parse("u1 C +").expect("C frame must parse");
    assert_eq!(msg.mode, SaslMode::Client);
    assert_eq!(msg.parv, ["+"]);

    let msg = SaslMessage::parse("u1 D").expect("bare D frame must parse");
    assert_eq!(msg.mode, SaslMode::Done);
    assert!(msg.parv.is_empty());
}

#[test]
fn display_round_trip() {
    for line in ["u1 H host ip P", "u1 S PLAIN", "u1 C Zm9v", "u1 D"] {
        let msg = SaslMessage::parse(line).expect("parse failed");
        assert_eq!(msg.to_string(), line);
        assert_eq!(SaslMessage::parse(&msg.to_string()), Ok(msg));
    }
}

#[test]
fn rejects_malformed_lines() {
    assert_eq!(SaslMessage::parse(""), Err(FrameError::Empty));
    assert_eq!(SaslMessage::parse("u1"), Err(FrameError::MissingMode));
    assert_eq!(SaslMessage::parse("u1 X foo"), Err(FrameError::UnknownMode('X')));
    assert_eq!(SaslMessage::parse("u1 CC foo"), Err(FrameError::UnknownMode('C')));
    assert_eq!(
        SaslMessage::parse("u1 H host"),
        Err(FrameError::MissingArgs {
            mode: 'H',
            want: 2,
            got: 1
        })
    );
    assert_eq!(
        SaslMessage::parse("u1 C"),
        Err(FrameError::MissingArgs {
            mode: 'C',
            want: 1,
            got: 0
        })
    );
}

#[test]
fn server_attachment() {
    let msg = SaslMessage::parse("u1 S PLAIN")
        .expect("parse failed")
        .with_server("irc.example.net");
    assert_eq!(msg.server.as_deref(), Some("irc.example.net"));
}
