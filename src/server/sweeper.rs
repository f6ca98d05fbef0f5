// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{cache::engine::Cache, cfg::config::SweeperConfig};

/// Periodically samples keys and removes the expired ones. Runs until the
/// shutdown token fires. Callers only spawn this when the sweeper is
/// enabled in configuration.
pub async fn run_sweeper(cache: Arc<Cache>, cfg: SweeperConfig, cancel: CancellationToken) {
    let mut ticker = interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("sweeper stopped");
                return;
            },
            _ = ticker.tick() => {
                let removed = cache.sweep_expired(cfg.sample_size);
                if removed > 0 {
                    debug!(removed, "swept expired entries");
                }
            },
        }
    }
}
