// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// Resolves the optional config-file argument.
///
/// Usage: `memcache-server-rs [config.yaml]`. With no argument the server
/// runs on built-in defaults; `None` is returned in that case.
pub fn config_path_from_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    let Some(rel) = args.next() else {
        return Ok(None);
    };
    if args.next().is_some() {
        bail!("usage: memcache-server-rs [config.yaml]");
    }
    resolve_config_path(&rel).map(Some)
}

/// Resolves a path against the current working directory and canonicalizes
/// it, so later errors name the real file.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

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
