// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::Semaphore, time::timeout};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{Instrument, debug, info, warn};

use crate::{
    cache::engine::Cache,
    cfg::config::{Config, timeout_opt},
    protocol::command::ProtocolLimits,
    server::connection::{ConnectionTimeouts, handle_connection},
};

/// How long outstanding handlers get to finish after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The accept loop: owns the bound socket, the connection-slot semaphore,
/// and the handler task tracker.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    cache: Arc<Cache>,
    limits: ProtocolLimits,
    timeouts: ConnectionTimeouts,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Server {
    /// Binds the configured port on all interfaces. A bind failure is a
    /// fatal startup error surfaced to the caller.
    pub async fn bind(
        cfg: &Config,
        cache: Arc<Cache>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", cfg.server.port))
            .await
            .with_context(|| format!("failed to bind port {}", cfg.server.port))?;
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            listener,
            cache,
            limits: cfg.protocol_limits(),
            timeouts: ConnectionTimeouts {
                read: timeout_opt(cfg.server.read_timeout),
                idle: timeout_opt(cfg.server.connection_idle_timeout),
            },
            slots: Arc::new(Semaphore::new(cfg.server.max_concurrent_connections)),
            tracker: TaskTracker::new(),
            cancel,
        })
    }

    /// The actually bound address; differs from the configured one when
    /// binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts until shutdown is signalled, then drains handlers within the
    /// grace period.
    pub async fn serve(self) -> Result<()> {
        loop {
            // One permit per connection, acquired before accept so the
            // backlog never exceeds the configured concurrency.
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => {
                    permit.context("connection semaphore closed")?
                },
            };

            let (stream, peer) = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    },
                },
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%peer, "set_nodelay failed: {e}");
            }

            let cache = Arc::clone(&self.cache);
            let limits = self.limits;
            let timeouts = self.timeouts;
            let cancel = self.cancel.clone();
            tokio::spawn(self.tracker.track_future(
                async move {
                    debug!("connection opened");
                    match handle_connection(stream, &cache, limits, timeouts, cancel)
                        .await
                    {
                        Ok(()) => debug!("connection closed"),
                        Err(e) => warn!("connection closed: {e:#}"),
                    }
                    drop(permit);
                }
                .instrument(tracing::debug_span!("connection", %peer)),
            ));
        }

        // Stop accepting, then drain. Handlers observe the cancelled token
        // at their next suspension point.
        drop(self.listener);
        self.tracker.close();
        if timeout(SHUTDOWN_GRACE, self.tracker.wait()).await.is_err() {
            warn!(
                remaining = self.tracker.len(),
                "grace period expired with connections still open"
            );
        } else {
            info!("all connections drained");
        }
        Ok(())
    }
}
