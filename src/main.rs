// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Standalone debugging harness for the broker.
//!
//! Reads SASL S2S frames from stdin, one per line, and prints every
//! outbound frame through the logging layer. Two pseudo-lines drive the
//! surrounding hooks:
//!
//! ```text
//! USER <uid> <nick>    user_add: the IRCd introduced this user
//! EOB                  server_eob: advertise the mechanism list
//! MSG <nick>           someone messaged the service directly
//! ```
//!
//! Everything else is parsed as `<uid> <mode> <args…>`.

use std::sync::Arc;

use anyhow::{Context, Result};
use sasl_broker_rs::{
    broker::{
        Broker,
        hooks::DefaultHooks,
        runner::{BrokerEvent, run_broker},
        uplink::StdioUplink,
    },
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    directory::{UserInfo, memory::MemoryDirectory},
    frames::message::SaslMessage,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

fn parse_event(line: &str) -> Result<BrokerEvent> {
    let mut words = line.split_ascii_whitespace();

    match words.next() {
        Some("EOB") => return Ok(BrokerEvent::ServerEob),
        Some("USER") => {
            let uid = words.next().context("USER needs <uid> <nick>")?;
            let nick = words.next().context("USER needs <uid> <nick>")?;
            return Ok(BrokerEvent::UserAdd(UserInfo {
                uid: uid.to_owned(),
                nick: nick.to_owned(),
            }));
        },
        Some("MSG") => {
            let nick = words.next().context("MSG needs <nick>")?;
            return Ok(BrokerEvent::ServiceMessage {
                from_nick: nick.to_owned(),
            });
        },
        _ => {},
    }

    let msg = SaslMessage::parse(line)?;
    Ok(BrokerEvent::SaslInput(msg))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _logger_guard = init_logger(
        &std::env::var("SASL_BROKER_LOGGER")
            .unwrap_or_else(|_| "tests/config_logger.yaml".to_owned()),
    )?;

    let cfg = resolve_config_path(std::env::args().nth(1).as_deref())
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let directory = Arc::new(MemoryDirectory::from_config(&cfg)?);
    let uplink = Arc::new(StdioUplink);

    let broker = Broker::new(cfg, uplink, directory, Arc::new(DefaultHooks))?;
    info!("broker ready, advertising: {}", broker.mechlist());

    let (tx, rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    let runner = tokio::spawn(run_broker(broker, rx, cancel.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_event(line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            },
            Err(e) => warn!("ignoring malformed line: {e:#}"),
        }
    }

    cancel.cancel();
    runner.await.context("broker runner panicked")?;

    Ok(())
}
