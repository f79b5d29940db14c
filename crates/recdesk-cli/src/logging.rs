// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! File logging. The terminal belongs to the TUI, so every event goes
//! through a non-blocking appender into `<log dir>/recdesk.log`.

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::Path;
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RECDESK_LOG";
pub const LOG_FILE_NAME: &str = "recdesk.log";

/// Installs the global subscriber. Keep the guard alive until exit or
/// buffered lines are lost.
pub fn init(dir: &Path, configured_level: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create log directory {}", dir.display()))?;

    let filter = filter_for(env::var(LOG_ENV).ok().as_deref(), configured_level)?;
    let file_appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;

    install_panic_hook();
    Ok(guard)
}

fn filter_for(from_env: Option<&str>, configured_level: &str) -> Result<EnvFilter> {
    match from_env.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("{LOG_ENV}={directives:?} is not a valid log filter")),
        None => EnvFilter::try_new(configured_level)
            .with_context(|| format!("log.level {configured_level:?} is not a valid log filter")),
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "recdesk::panic", %info, "panic");
            default_panic(info);
        }));
    });
}
