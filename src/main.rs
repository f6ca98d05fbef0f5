// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use memcache_server_rs::{
    cache::engine::Cache,
    cfg::{cli::config_path_from_args, config::Config, logger::init_logger},
    server::{listener::Server, sweeper::run_sweeper},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = match config_path_from_args()? {
        Some(path) => Config::load_from_file(path)
            .context("failed to load config")?,
        None => Config::default(),
    };

    let _log_guard = init_logger(&cfg.logger)?;

    let cache = Arc::new(Cache::new(cfg.cache.clone()));
    let cancel = CancellationToken::new();

    let server = Server::bind(&cfg, Arc::clone(&cache), cancel.clone()).await?;

    if cfg.sweeper.enabled {
        tokio::spawn(run_sweeper(Arc::clone(&cache), cfg.sweeper, cancel.clone()));
    }

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            cancel.cancel();
        }
    });

    server.serve().await?;
    info!("shutdown complete");
    Ok(())
}

/// Resolves on SIGINT, and on SIGTERM where available.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            },
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            },
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
