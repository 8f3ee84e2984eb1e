// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Configuration, command-line helpers and logging setup.

/// Command-line / environment config path resolution.
pub mod cli;
/// Configuration file parsing and validation.
pub mod config;
/// Logger initialization.
pub mod logger;
