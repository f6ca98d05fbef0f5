// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{cfg::logger::LogSettings, protocol::command::ProtocolLimits};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener and per-connection settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Capacity limits and the uniform TTL of the cache engine.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Optional background expiration sweep.
    #[serde(default)]
    pub sweeper: SweeperConfig,
    /// Logging output, level, and format.
    #[serde(default)]
    pub logger: LogSettings,
}

/// Listener and connection tunables.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(rename = "Port", default = "default_port")]
    /// TCP port to bind on all interfaces. 0 picks an ephemeral port.
    pub port: u16,

    #[serde(
        rename = "MaxConcurrentConnections",
        default = "default_max_connections"
    )]
    /// Upper bound on simultaneously served connections.
    pub max_concurrent_connections: usize,

    #[serde(rename = "ReadTimeout", default = "default_read_timeout", with = "serde_secs")]
    /// How long to wait for more bytes while a record is incomplete.
    /// Zero disables the timer.
    pub read_timeout: Duration,

    #[serde(
        rename = "ConnectionIdleTimeout",
        default = "default_idle_timeout",
        with = "serde_secs"
    )]
    /// How long a connection may sit with no pending input before it is
    /// closed. Zero disables the timer.
    pub connection_idle_timeout: Duration,
}

/// Cache capacity limits and the uniform record TTL.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CacheConfig {
    #[serde(rename = "MaxKeys", default = "default_max_keys")]
    /// Maximum number of live keys.
    pub max_keys: usize,

    #[serde(rename = "MaxKeyBytes", default = "default_max_key_bytes")]
    /// Maximum key length in bytes.
    pub max_key_bytes: usize,

    #[serde(rename = "MaxValueBytes", default = "default_max_value_bytes")]
    /// Maximum payload length of a single value in bytes.
    pub max_value_bytes: usize,

    #[serde(rename = "MaxTotalBytes", default = "default_max_total_bytes")]
    /// Maximum sum of payload lengths across all live values.
    pub max_total_bytes: u64,

    #[serde(rename = "DefaultTtl", default = "default_ttl", with = "serde_secs")]
    /// TTL applied to every stored record; the wire expiration parameter is
    /// accepted but not honored.
    pub default_ttl: Duration,
}

/// Background expiration sweep settings.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SweeperConfig {
    #[serde(rename = "Enabled", default)]
    pub enabled: bool,

    #[serde(rename = "Interval", default = "default_sweep_interval", with = "serde_secs")]
    /// Period between sweep ticks.
    pub interval: Duration,

    #[serde(rename = "SampleSize", default = "default_sweep_sample_size")]
    /// How many keys each tick examines.
    pub sample_size: usize,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path).with_context(|| {
            format!("failed to read config file {:?}", path.as_ref())
        })?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants across sections.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            self.server.max_concurrent_connections >= 1,
            "MaxConcurrentConnections must be >= 1"
        );
        ensure!(self.cache.max_keys >= 1, "MaxKeys must be >= 1");
        ensure!(self.cache.max_key_bytes >= 1, "MaxKeyBytes must be >= 1");
        ensure!(
            self.cache.max_value_bytes as u64 <= self.cache.max_total_bytes,
            "MaxValueBytes must not exceed MaxTotalBytes"
        );
        if self.sweeper.enabled {
            ensure!(
                !self.sweeper.interval.is_zero(),
                "Sweeper.Interval must be > 0 when the sweeper is enabled"
            );
            ensure!(
                self.sweeper.sample_size >= 1,
                "Sweeper.SampleSize must be >= 1 when the sweeper is enabled"
            );
        }
        Ok(())
    }

    /// The limits the protocol layer enforces before the engine re-checks.
    pub fn protocol_limits(&self) -> ProtocolLimits {
        ProtocolLimits {
            max_key_bytes: self.cache.max_key_bytes,
            max_value_bytes: self.cache.max_value_bytes,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_concurrent_connections: default_max_connections(),
            read_timeout: default_read_timeout(),
            connection_idle_timeout: default_idle_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_keys: default_max_keys(),
            max_key_bytes: default_max_key_bytes(),
            max_value_bytes: default_max_value_bytes(),
            max_total_bytes: default_max_total_bytes(),
            default_ttl: default_ttl(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_sweep_interval(),
            sample_size: default_sweep_sample_size(),
        }
    }
}

fn default_port() -> u16 {
    11211
}
fn default_max_connections() -> usize {
    10
}
fn default_read_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_idle_timeout() -> Duration {
    Duration::ZERO
}
fn default_max_keys() -> usize {
    3000
}
fn default_max_key_bytes() -> usize {
    250
}
fn default_max_value_bytes() -> usize {
    102_400
}
fn default_max_total_bytes() -> u64 {
    1_073_741_824
}
fn default_ttl() -> Duration {
    Duration::from_secs(3600)
}
fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_sweep_sample_size() -> usize {
    20
}

/// Turns a zero duration into "disabled".
pub fn timeout_opt(d: Duration) -> Option<Duration> {
    if d.is_zero() { None } else { Some(d) }
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
