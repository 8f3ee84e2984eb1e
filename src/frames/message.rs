// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Parsing and formatting of S2S SASL messages.
//!
//! A message is one line of the form
//!
//! ```text
//! <uid> <mode> <arg0> [<arg1> ...]
//! ```
//!
//! where `mode` is a single letter:
//!
//! * **H** – host information (`host`, `ip`, optional TLS hint),
//! * **S** – start authentication (`mechanism`, optional fingerprint),
//! * **C** – client data (one base64 chunk, or a literal `+` / `*`),
//! * **D** – done (outbound carries `S`/`F`; inbound means client abort),
//! * **M** – mechanism list advertisement (outbound only).

use core::fmt;

use thiserror::Error;

/// The mode letter of a SASL S2S message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslMode {
    /// `H` – host information for the pending session.
    Host,
    /// `S` – mechanism selection / start of authentication.
    Start,
    /// `C` – client data chunk.
    Client,
    /// `D` – end of the exchange.
    Done,
    /// `M` – advertised mechanism list. Never accepted inbound.
    MechList,
}

impl SaslMode {
    pub const fn as_char(self) -> char {
        match self {
            SaslMode::Host => 'H',
            SaslMode::Start => 'S',
            SaslMode::Client => 'C',
            SaslMode::Done => 'D',
            SaslMode::MechList => 'M',
        }
    }
}

impl fmt::Display for SaslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl TryFrom<char> for SaslMode {
    type Error = FrameError;

    fn try_from(c: char) -> Result<Self, FrameError> {
        match c {
            'H' => Ok(SaslMode::Host),
            'S' => Ok(SaslMode::Start),
            'C' => Ok(SaslMode::Client),
            'D' => Ok(SaslMode::Done),
            'M' => Ok(SaslMode::MechList),
            other => Err(FrameError::UnknownMode(other)),
        }
    }
}

/// Returned when a line cannot be interpreted as a SASL message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("frame is missing the mode letter")]
    MissingMode,
    #[error("unknown mode '{0}'")]
    UnknownMode(char),
    #[error("mode '{mode}' requires at least {want} argument(s), got {got}")]
    MissingArgs { mode: char, want: usize, got: usize },
}

/// One inbound or outbound SASL S2S message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslMessage {
    /// Session identifier assigned by the originating IRC server.
    pub uid: String,
    pub mode: SaslMode,
    pub parv: Vec<String>,
    /// Name of the server the message arrived from. Filled in by the link
    /// layer; absent when a message was parsed from a bare line.
    pub server: Option<String>,
}

impl SaslMessage {
    /// Parses a single `<uid> <mode> <args…>` line.
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        let mut words = line.split_ascii_whitespace();

        let uid = words.next().ok_or(FrameError::Empty)?;

        let mode_word = words.next().ok_or(FrameError::MissingMode)?;
        let mut chars = mode_word.chars();
        let mode_char = chars.next().ok_or(FrameError::MissingMode)?;
        if chars.next().is_some() {
            return Err(FrameError::UnknownMode(mode_char));
        }
        let mode = SaslMode::try_from(mode_char)?;

        let parv: Vec<String> = words.map(str::to_owned).collect();

        let want = match mode {
            SaslMode::Host => 2,
            SaslMode::Start | SaslMode::Client | SaslMode::MechList => 1,
            SaslMode::Done => 0,
        };
        if parv.len() < want {
            return Err(FrameError::MissingArgs {
                mode: mode_char,
                want,
                got: parv.len(),
            });
        }

        Ok(Self {
            uid: uid.to_owned(),
            mode,
            parv,
            server: None,
        })
    }

    /// Attaches the originating server name.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }
}

impl fmt::Display for SaslMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.uid, self.mode)?;
        for arg in &self.parv {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
