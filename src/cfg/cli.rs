// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "SASL_BROKER_CONFIG";

/// Resolves the configuration path from, in order: the explicit argument,
/// [`CONFIG_ENV`], then `config.yaml` in the working directory.
pub fn resolve_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    let rel = match explicit {
        Some(p) => p.to_owned(),
        None => {
            std::env::var(CONFIG_ENV).unwrap_or_else(|_| "config.yaml".to_owned())
        },
    };

    let p = Path::new(&rel);
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}
