// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashSet;

use bytes::Bytes;

use crate::{
    cache::engine::{Cache, StoreOutcome},
    protocol::{
        command::{Command, ErrorKind},
        response::{Response, ValueItem},
    },
};

/// Runs one parsed command against the cache. The returned flag is the
/// command's `noreply` request; the formatter applies the suppression so
/// error responses still reach the wire.
pub fn execute(cmd: Command, cache: &Cache) -> (Response, bool) {
    match cmd {
        Command::Get { keys } => (get(keys, cache), false),
        Command::Set {
            key,
            flags,
            expiration,
            data,
            no_reply,
        } => {
            let resp = match cache.set(key, data, flags, expiration) {
                StoreOutcome::Stored => Response::Stored,
                StoreOutcome::ValueTooLarge => {
                    Response::ServerError("value too large".to_string())
                },
                StoreOutcome::CacheFull => {
                    Response::ServerError("max cache size reached".to_string())
                },
            };
            (resp, no_reply)
        },
        Command::Delete { key, no_reply } => {
            let resp = if cache.delete(&key) {
                Response::Deleted
            } else {
                Response::NotFound
            };
            (resp, no_reply)
        },
        Command::Invalid { kind, message } => (classify(kind, message), false),
    }
}

/// Retrieval: each distinct key answers at most once, in first-seen order;
/// misses produce no item.
fn get(keys: Vec<Bytes>, cache: &Cache) -> Response {
    let mut seen: HashSet<Bytes> = HashSet::with_capacity(keys.len());
    let mut items = Vec::with_capacity(keys.len());
    for key in keys {
        if !seen.insert(key.clone()) {
            continue;
        }
        if let Some((data, flags)) = cache.get(&key) {
            items.push(ValueItem { key, flags, data });
        }
    }
    Response::Values(items)
}

fn classify(kind: ErrorKind, message: String) -> Response {
    match kind {
        ErrorKind::UnknownCommand => Response::Error,
        ErrorKind::ServerError => Response::ServerError(message),
        ErrorKind::InvalidKey
        | ErrorKind::InvalidParameter
        | ErrorKind::MissingParameter
        | ErrorKind::InvalidData
        | ErrorKind::ProtocolViolation => Response::ClientError(message),
    }
}
