// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    Stdout,
    Stderr,
    File,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line events.
    Plain,
    /// One JSON object per event.
    Json,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationFreq {
    Minutely,
    Hourly,
    Daily,
    Never,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogFileSettings {
    pub path: String,
    #[serde(default)]
    pub rotation_frequency: Option<RotationFreq>,
}

/// Logging section of the configuration file.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogSettings {
    /// An `EnvFilter` directive, e.g. `info` or
    /// `memcache_server_rs=debug,info`. `RUST_LOG` wins when the directive
    /// does not parse.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_output")]
    pub output: Output,
    #[serde(default = "default_format")]
    pub format: LogFormat,
    /// Required when `output: file`.
    #[serde(default)]
    pub file: Option<LogFileSettings>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            output: default_output(),
            format: default_format(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_output() -> Output {
    Output::Stderr
}
fn default_format() -> LogFormat {
    LogFormat::Plain
}

/// Installs the global subscriber. The returned guard must stay alive for
/// the process lifetime or buffered log lines are lost on exit.
pub fn init_logger(cfg: &LogSettings) -> Result<WorkerGuard> {
    let (writer, guard) = make_writer(cfg)?;

    let env_filter = EnvFilter::try_new(&cfg.level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .context("failed to parse log level from config or env")?;

    let installed = match cfg.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .json();
            tracing::subscriber::set_global_default(
                Registry::default().with(env_filter).with(layer),
            )
        },
        LogFormat::Plain => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            tracing::subscriber::set_global_default(
                Registry::default().with(env_filter).with(layer),
            )
        },
    };
    installed.context("failed to set global default subscriber")?;

    Ok(guard)
}

fn make_writer(cfg: &LogSettings) -> Result<(BoxMakeWriter, WorkerGuard)> {
    Ok(match cfg.output {
        Output::Stdout => {
            let (w, g) = tracing_appender::non_blocking(std::io::stdout());
            (BoxMakeWriter::new(w), g)
        },
        Output::Stderr => {
            let (w, g) = tracing_appender::non_blocking(std::io::stderr());
            (BoxMakeWriter::new(w), g)
        },
        Output::File => {
            let fcfg = cfg
                .file
                .clone()
                .context("logger.file is required for output=file")?;
            let path = PathBuf::from(&fcfg.path);
            let dir = path.parent().unwrap_or_else(|| Path::new(""));

            let rotation = match fcfg.rotation_frequency.unwrap_or(RotationFreq::Never) {
                RotationFreq::Minutely => Rotation::MINUTELY,
                RotationFreq::Hourly => Rotation::HOURLY,
                RotationFreq::Daily => Rotation::DAILY,
                RotationFreq::Never => Rotation::NEVER,
            };

            let file_appender = RollingFileAppender::new(
                rotation,
                dir,
                path.file_name().unwrap_or_default(),
            );
            let (w, g) = tracing_appender::non_blocking(file_appender);
            (BoxMakeWriter::new(w), g)
        },
    })
}
