// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire-level handling of the server-to-services SASL sub-protocol.

/// Chunked base64 carriage (assembly, splitting, size limits).
pub mod chunk;
/// The `<uid> <mode> <args…>` message grammar.
pub mod message;
