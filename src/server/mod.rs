// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Per-connection read/parse/execute/respond loop.
pub mod connection;
/// Pure command dispatch against the cache.
pub mod executor;
/// TCP accept loop with bounded concurrency and graceful drain.
pub mod listener;
/// Optional background expiration sweep.
pub mod sweeper;
