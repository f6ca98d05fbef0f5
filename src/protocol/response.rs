// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{BufMut, Bytes, BytesMut};

/// One hit of a retrieval command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueItem {
    pub key: Bytes,
    pub flags: u32,
    pub data: Bytes,
}

/// Everything the server can say back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Hits of a retrieval, in first-seen request order. Misses are silent;
    /// an empty batch is just the end marker.
    Values(Vec<ValueItem>),
    Stored,
    /// In the response vocabulary for protocol completeness; no command in
    /// scope produces it.
    NotStored,
    Deleted,
    NotFound,
    ClientError(String),
    ServerError(String),
    Error,
}

impl Response {
    /// Error responses are never suppressed by `noreply`.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Response::ClientError(_) | Response::ServerError(_) | Response::Error
        )
    }
}

/// Serializes `resp` into `buf`, honoring `noreply` suppression of success
/// responses. Returns whether anything was written.
pub fn write_response(resp: &Response, no_reply: bool, buf: &mut BytesMut) -> bool {
    if no_reply && !resp.is_error() {
        return false;
    }

    match resp {
        Response::Values(items) => {
            for item in items {
                buf.put_slice(b"VALUE ");
                buf.put_slice(&item.key);
                buf.put_slice(
                    format!(" {} {}\r\n", item.flags, item.data.len()).as_bytes(),
                );
                buf.put_slice(&item.data);
                buf.put_slice(b"\r\n");
            }
            buf.put_slice(b"END\r\n");
        },
        Response::Stored => buf.put_slice(b"STORED\r\n"),
        Response::NotStored => buf.put_slice(b"NOT_STORED\r\n"),
        Response::Deleted => buf.put_slice(b"DELETED\r\n"),
        Response::NotFound => buf.put_slice(b"NOT_FOUND\r\n"),
        Response::ClientError(msg) => {
            buf.put_slice(b"CLIENT_ERROR ");
            buf.put_slice(msg.as_bytes());
            buf.put_slice(b"\r\n");
        },
        Response::ServerError(msg) => {
            buf.put_slice(b"SERVER_ERROR ");
            buf.put_slice(msg.as_bytes());
            buf.put_slice(b"\r\n");
        },
        Response::Error => buf.put_slice(b"ERROR\r\n"),
    }
    true
}
