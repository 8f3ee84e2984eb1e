// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Chunk assembly and splitting for the base64 carriage of `C` frames.
//!
//! Servers may only relay up to [`MAX_ATONCE_B64`] base64 characters per `C`
//! frame, so longer payloads travel as a run of maximal chunks terminated by
//! a short chunk (possibly the literal `+`). The assembler buffers a run
//! until the terminator arrives; the splitter produces the mirror-image
//! sequence for outbound replies.

use anyhow::{Context, Result, ensure};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::BytesMut;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Longest base64 run a single `C` frame may carry.
pub const MAX_ATONCE_B64: usize = 400;
/// Cap on base64 data buffered across the chunks of one round.
pub const MAX_TOTAL_B64: usize = 1024;
/// Largest decoded payload a round can produce.
pub const MAX_TOTAL_RAW: usize = 768;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk of {0} bytes exceeds the {MAX_ATONCE_B64} byte frame limit")]
    Oversize(usize),
    #[error("buffered base64 data would exceed {MAX_TOTAL_B64} bytes")]
    TotalExceeded,
}

/// Result of feeding one `C` argument to the assembler.
#[derive(Debug)]
pub enum Assembly {
    /// A lone `*`: the client is aborting the exchange.
    Abort,
    /// A lone `+` with nothing buffered. The mechanism may interpret this as
    /// "no initial response"; it is not data and must not be decoded.
    PassThrough,
    /// A maximal chunk was appended; the terminator has not arrived yet.
    Buffering,
    /// A complete base64 run, ready for decoding.
    Ready(Zeroizing<String>),
}

/// Accumulates the base64 chunks of one round.
///
/// The buffer is non-empty only between a maximal-length chunk and the
/// terminating short (or `+`) chunk, and is wiped whenever it is drained or
/// dropped, since it may hold encoded credential material.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    buf: BytesMut,
}

impl ChunkAssembler {
    pub fn push(&mut self, chunk: &str) -> Result<Assembly, ChunkError> {
        if chunk == "*" {
            return Ok(Assembly::Abort);
        }

        if chunk == "+" {
            if self.buf.is_empty() {
                return Ok(Assembly::PassThrough);
            }
            return Ok(Assembly::Ready(self.drain()));
        }

        let len = chunk.len();
        if len > MAX_ATONCE_B64 {
            return Err(ChunkError::Oversize(len));
        }
        if self.buf.len() + len > MAX_TOTAL_B64 {
            return Err(ChunkError::TotalExceeded);
        }

        // Short chunk with nothing buffered: the whole round fits in one
        // frame, skip the buffer entirely.
        if self.buf.is_empty() && len < MAX_ATONCE_B64 {
            return Ok(Assembly::Ready(Zeroizing::new(chunk.to_owned())));
        }

        self.buf.extend_from_slice(chunk.as_bytes());

        if len < MAX_ATONCE_B64 {
            return Ok(Assembly::Ready(self.drain()));
        }

        Ok(Assembly::Buffering)
    }

    pub fn is_buffering(&self) -> bool {
        !self.buf.is_empty()
    }

    fn drain(&mut self) -> Zeroizing<String> {
        let mut taken = self.buf.split();
        let out = Zeroizing::new(String::from_utf8_lossy(&taken).into_owned());
        taken.as_mut().zeroize();
        out
    }
}

impl Drop for ChunkAssembler {
    fn drop(&mut self) {
        self.buf.as_mut().zeroize();
    }
}

/// Splits an encoded reply into the `C` frame arguments to transmit.
///
/// Pieces are exactly [`MAX_ATONCE_B64`] bytes except the last. When the
/// reply is an exact multiple of the chunk size a trailing `+` is appended,
/// otherwise the peer would keep waiting for the rest.
pub fn split_reply(encoded: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(encoded.len() / MAX_ATONCE_B64 + 2);

    if encoded.is_empty() {
        return out;
    }

    let mut rest = encoded;
    while rest.len() > MAX_ATONCE_B64 {
        let (head, tail) = rest.split_at(MAX_ATONCE_B64);
        out.push(head.to_owned());
        rest = tail;
    }

    let terminated = rest.len() < MAX_ATONCE_B64;
    out.push(rest.to_owned());
    if !terminated {
        out.push("+".to_owned());
    }

    out
}

/// Decodes one assembled base64 run. The decoded bytes may carry credential
/// material, so they are returned in a wiping buffer.
pub fn decode_payload(b64: &str) -> Result<Zeroizing<Vec<u8>>> {
    let raw = Zeroizing::new(B64.decode(b64).context("base64 decode failed")?);
    ensure!(
        raw.len() <= MAX_TOTAL_RAW,
        "decoded payload exceeds {MAX_TOTAL_RAW} bytes"
    );
    Ok(raw)
}

/// Encodes a mechanism reply for transmission.
pub fn encode_payload(raw: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(B64.encode(raw))
}
