// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use memcache_server_rs::cfg::config::Config;
use tokio::{io::AsyncReadExt, net::TcpStream, time::timeout};

use crate::integration_tests::common::{connect, expect_exact, start};

#[tokio::test]
async fn shutdown_closes_open_connections_and_stops_accepting() -> Result<()> {
    let server = start(Config::default()).await?;
    let addr = server.addr;

    let mut conn = connect(addr).await?;
    expect_exact(&mut conn, b"set k 0 0 1\r\nx\r\n", b"STORED\r\n").await?;

    server.shutdown().await?;

    // The open connection is torn down: the next read reports EOF or reset.
    let mut buf = [0u8; 16];
    match timeout(Duration::from_secs(5), conn.read(&mut buf)).await {
        Ok(Ok(0)) | Ok(Err(_)) => {},
        Ok(Ok(n)) => panic!("unexpected {n} bytes after shutdown"),
        Err(_) => panic!("connection not closed after shutdown"),
    }

    // And the listening socket is gone.
    assert!(
        timeout(Duration::from_secs(5), TcpStream::connect(addr))
            .await
            .is_ok_and(|r| r.is_err()),
        "listener still accepting after shutdown"
    );

    Ok(())
}

#[tokio::test]
async fn idle_connection_is_closed_after_the_idle_timeout() -> Result<()> {
    let mut cfg = Config::default();
    cfg.server.connection_idle_timeout = Duration::from_secs(1);
    let server = start(cfg).await?;

    let mut conn = connect(server.addr).await?;
    expect_exact(&mut conn, b"get warm\r\n", b"END\r\n").await?;

    // Sit idle past the timeout; the server hangs up.
    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_secs(10), conn.read(&mut buf))
        .await
        .expect("idle connection was not closed");
    assert!(matches!(read, Ok(0) | Err(_)));

    server.shutdown().await
}

#[tokio::test]
async fn stalled_partial_record_hits_the_read_timeout() -> Result<()> {
    let mut cfg = Config::default();
    cfg.server.read_timeout = Duration::from_secs(1);
    let server = start(cfg).await?;

    let mut conn = connect(server.addr).await?;
    // Declared five payload bytes, never delivered.
    expect_exact(&mut conn, b"set k 0 0 5\r\nhe", b"").await?;

    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_secs(10), conn.read(&mut buf))
        .await
        .expect("stalled connection was not closed");
    assert!(matches!(read, Ok(0) | Err(_)));

    // The partial record never became a command.
    assert!(server.cache.is_empty());

    server.shutdown().await
}

#[tokio::test]
async fn zero_timeouts_leave_connections_open() -> Result<()> {
    let mut cfg = Config::default();
    cfg.server.read_timeout = Duration::ZERO;
    cfg.server.connection_idle_timeout = Duration::ZERO;
    let server = start(cfg).await?;

    let mut conn = connect(server.addr).await?;
    expect_exact(&mut conn, b"get a\r\n", b"END\r\n").await?;

    // Well past any would-be timer, the connection still answers.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    expect_exact(&mut conn, b"get b\r\n", b"END\r\n").await?;

    server.shutdown().await
}

#[tokio::test]
async fn sweeper_drains_expired_entries() -> Result<()> {
    let mut cfg = Config::default();
    cfg.cache.default_ttl = Duration::ZERO;
    cfg.sweeper.enabled = true;
    cfg.sweeper.interval = Duration::from_millis(50);
    cfg.sweeper.sample_size = 8;
    let server = start(cfg.clone()).await?;

    // The sweeper task is spawned by the binary's bootstrap; tests drive the
    // same entry point directly.
    let sweeper = tokio::spawn(memcache_server_rs::server::sweeper::run_sweeper(
        std::sync::Arc::clone(&server.cache),
        cfg.sweeper,
        tokio_util::sync::CancellationToken::new(),
    ));

    let mut conn = connect(server.addr).await?;
    for i in 0..8 {
        expect_exact(
            &mut conn,
            format!("set k{i} 0 0 1\r\nx\r\n").as_bytes(),
            b"STORED\r\n",
        )
        .await?;
    }

    // Everything was stored already expired; the sweeper alone empties the
    // cache without any further reads.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !server.cache.is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "sweeper did not drain expired entries"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    sweeper.abort();
    server.shutdown().await
}
