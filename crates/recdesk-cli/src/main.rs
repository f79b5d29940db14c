// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use recdesk_app::Desk;
use recdesk_tui::{SharedGateway, UiOptions};
use runtime::ApiGateway;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print!("{}", help_text());
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `recdesk --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let _log_guard = logging::init(&config.log_dir()?, config.log_level())?;

    let client = recdesk_api::Client::new(
        config.api_base_url(),
        config.api_key().as_deref(),
        config.api_timeout()?,
        config.page_size(),
    )
    .with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout/page_size values",
            options.config_path.display()
        )
    })?;

    if options.check_only {
        client
            .ping()
            .with_context(|| format!("health check against {} failed", client.base_url()))?;
        println!("ok: {} is reachable", client.base_url());
        return Ok(());
    }

    tracing::info!(
        base_url = client.base_url(),
        start_tab = config.start_tab().as_str(),
        "starting recdesk"
    );
    let mut desk = Desk::new(config.start_tab());
    let gateway: SharedGateway = Arc::new(ApiGateway::new(client));
    let result = recdesk_tui::run_app(
        &mut desk,
        gateway,
        UiOptions {
            status_clear: config.status_clear(),
        },
    );
    if let Err(error) = &result {
        tracing::error!(error = %format!("{error:#}"), "recdesk exited with an error");
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn help_text() -> String {
    format!(
        "recdesk: browse and edit records served by the recdesk API

usage: recdesk [--config <path>] [--check | --print-config-path | --print-example-config]

  --config <path>          Read this config file instead of the default
  --print-config-path      Print the config path that would be read
  --print-example-config   Print a v1 template with [api], [ui] and [log]
  --check                  Load config, then GET <base_url>/health and exit
  -h, --help               Show this help

environment:
  {config_env:<24} overrides the config path
  {key_env:<24} overrides [api].api_key
  {log_env:<24} log filter directives, e.g. recdesk_api=debug
",
        config_env = config::CONFIG_PATH_ENV,
        key_env = config::API_KEY_ENV,
        log_env = logging::LOG_ENV,
    )
}
