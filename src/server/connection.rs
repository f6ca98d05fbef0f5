// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Result, anyhow};
use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    cache::engine::Cache,
    protocol::{
        command::ProtocolLimits, framer::Framer, parser::parse_record,
        response::write_response,
    },
    server::executor::execute,
};

/// Timers applied to one connection. `None` disables the timer.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionTimeouts {
    /// Applies while a record is incomplete.
    pub read: Option<Duration>,
    /// Applies while the connection sits with no pending input.
    pub idle: Option<Duration>,
}

pub(super) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(anyhow!("{label} cancelled")),
        res = maybe_timeout(io_timeout, fut) => {
            match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow!("{label} timeout")),
            }
        }
    }
}

async fn maybe_timeout<F, T>(
    dur: Option<Duration>,
    fut: F,
) -> Result<std::io::Result<T>, tokio::time::error::Elapsed>
where
    F: Future<Output = std::io::Result<T>>,
{
    match dur {
        Some(d) => timeout(d, fut).await,
        None => Ok(fut.await),
    }
}

/// Serves one accepted socket until EOF, timeout, fault, or shutdown.
///
/// Records are handled strictly in arrival order: the next record is not
/// parsed until the previous response has been written and flushed. Every
/// response is assembled in one buffer and written with a single
/// `write_all`, so no partial response reaches the wire interleaved.
pub async fn handle_connection(
    stream: TcpStream,
    cache: &Cache,
    limits: ProtocolLimits,
    timeouts: ConnectionTimeouts,
    cancel: CancellationToken,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut framer = Framer::new(limits.max_value_bytes);
    let mut out = BytesMut::with_capacity(4096);

    loop {
        while let Some(record) = framer.next_record() {
            let cmd = parse_record(&record, &limits);
            debug!(?cmd, "dispatching command");
            let (resp, no_reply) = execute(cmd, cache);

            out.clear();
            if write_response(&resp, no_reply, &mut out) {
                io_with_timeout(
                    "write response",
                    writer.write_all(&out),
                    timeouts.read,
                    &cancel,
                )
                .await?;
                io_with_timeout("flush response", writer.flush(), timeouts.read, &cancel)
                    .await?;
            }
        }

        // A partial record waits under the read timeout, an empty buffer
        // under the idle timeout.
        let wait = if framer.has_partial() {
            timeouts.read
        } else {
            timeouts.idle
        };
        let n =
            io_with_timeout("read", reader.read_buf(framer.buf_mut()), wait, &cancel)
                .await?;
        if n == 0 {
            // EOF. Any incomplete record in the buffer is discarded.
            debug!("peer closed connection");
            return Ok(());
        }
    }
}
