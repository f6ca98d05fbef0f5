// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use bytes::Bytes;
use memcache_server_rs::cfg::config::Config;

use crate::integration_tests::common::{connect, expect_exact, start};

#[tokio::test]
async fn concurrent_clients_round_trip_their_own_keys() -> Result<()> {
    let mut cfg = Config::default();
    cfg.server.max_concurrent_connections = 16;
    let server = start(cfg).await?;

    let mut workers = Vec::new();
    for client in 0..8u32 {
        let addr = server.addr;
        workers.push(tokio::spawn(async move {
            let mut conn = connect(addr).await?;
            for round in 0..25u32 {
                let key = format!("c{client}k{round}");
                let value = format!("v{client}x{round}");
                let request = format!(
                    "set {key} {client} 0 {}\r\n{value}\r\nget {key}\r\n",
                    value.len()
                );
                let expected = format!(
                    "STORED\r\nVALUE {key} {client} {}\r\n{value}\r\nEND\r\n",
                    value.len()
                );
                expect_exact(&mut conn, request.as_bytes(), expected.as_bytes())
                    .await?;
            }
            anyhow::Ok(())
        }));
    }
    for worker in workers {
        worker.await.context("client task panicked")??;
    }

    assert_eq!(server.cache.len(), 8 * 25);
    server.shutdown().await
}

#[tokio::test]
async fn contended_writes_on_one_key_stay_consistent() -> Result<()> {
    let server = start(Config::default()).await?;

    // Same-length values; whichever write lands last, a read must return a
    // whole value from one writer.
    let mut workers = Vec::new();
    for client in 0..4u32 {
        let addr = server.addr;
        workers.push(tokio::spawn(async move {
            let mut conn = connect(addr).await?;
            let value = format!("val{client}");
            for _ in 0..50 {
                expect_exact(
                    &mut conn,
                    format!("set shared 0 0 4\r\n{value}\r\n").as_bytes(),
                    b"STORED\r\n",
                )
                .await?;
            }
            anyhow::Ok(())
        }));
    }
    for worker in workers {
        worker.await.context("client task panicked")??;
    }

    let mut conn = connect(server.addr).await?;
    let (data, flags) = server
        .cache
        .get(&Bytes::from_static(b"shared"))
        .context("shared key missing")?;
    assert_eq!(flags, 0);
    assert_eq!(data.len(), 4);
    assert!(data.starts_with(b"val"));

    let expected = format!("VALUE shared 0 4\r\n{}\r\nEND\r\n", String::from_utf8_lossy(&data));
    expect_exact(&mut conn, b"get shared\r\n", expected.as_bytes()).await?;

    server.shutdown().await
}

#[tokio::test]
async fn connection_slots_free_up_for_later_clients() -> Result<()> {
    let mut cfg = Config::default();
    cfg.server.max_concurrent_connections = 2;
    let server = start(cfg).await?;

    // Serially exhaust and release the two slots several times over.
    for i in 0..6 {
        let mut a = connect(server.addr).await?;
        let mut b = connect(server.addr).await?;
        expect_exact(
            &mut a,
            format!("set s{i} 0 0 1\r\nx\r\n").as_bytes(),
            b"STORED\r\n",
        )
        .await?;
        expect_exact(&mut b, format!("get s{i}\r\n").as_bytes(), b"VALUE s")
            .await?;
        // Drain the rest of the get response before dropping the socket.
        expect_exact(&mut b, b"", format!("{i} 0 1\r\nx\r\nEND\r\n").as_bytes())
            .await?;
    }

    server.shutdown().await
}
