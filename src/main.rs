mod collectors;
mod config;
mod report;
mod snapshot;

use chrono::Utc;
use clap::{ArgAction, Parser};
use collectors::parser::parse;
use collectors::runner::{CommandRunner, ShellTransport};
use config::{Config, DEFAULT_COMMANDS};
use report::{LogWriter, Output, Progress};
use std::io;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Collect a diagnostic snapshot from this machine or from remote hosts.
#[derive(Parser, Debug)]
#[command(name = "hostsnap")]
#[command(version)]
struct Cli {
    /// Remote host to collect from (repeatable). Without it commands run locally.
    #[arg(short = 'H', long = "host", action = ArgAction::Append)]
    hosts: Vec<String>,
    /// Log file, or `-` for stdout. Defaults to <output_dir>/<UTC timestamp>.log
    #[arg(short, long)]
    output: Option<String>,
    /// Command list file, or `-` for stdin. Defaults to the built-in list.
    #[arg(short, long)]
    config: Option<String>,
    /// YAML settings file.
    #[arg(short, long)]
    settings: Option<String>,
    /// Per-command timeout, e.g. `30s`.
    #[arg(long, value_parser = config::parse_timeout)]
    timeout: Option<Duration>,
    /// Increase verbosity (-v progress dots, -vv one line per command).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    print_default_settings: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.print_default_config {
        print!("{DEFAULT_COMMANDS}");
        return;
    }
    if cli.print_default_settings {
        print!("{}", Config::example_yaml());
        return;
    }

    let timestamp = report::run_timestamp(Utc::now());

    let mut cfg = match cli.settings.as_deref() {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "failed to load settings");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if !cli.hosts.is_empty() {
        cfg.hosts = cli.hosts.clone();
    }
    if cli.timeout.is_some() {
        cfg.timeout = cli.timeout;
    }
    if let Err(err) = cfg.validate() {
        error!(error = %err, "invalid settings");
        std::process::exit(1);
    }

    let text = match config::load_commands(cli.config.as_deref()) {
        Ok(text) => text,
        Err(err) => {
            error!(error = %err, "failed to load command list");
            std::process::exit(1);
        }
    };

    let output = Output::resolve(cli.output.as_deref(), &cfg.output_dir, &timestamp);
    let sink = match output.open() {
        Ok(sink) => sink,
        Err(err) => {
            error!(error = %err, "failed to open output");
            std::process::exit(1);
        }
    };

    info!(
        hosts = cfg.hosts.len(),
        output = %output,
        timestamp = %timestamp,
        "starting hostsnap"
    );

    let runner = CommandRunner::new(ShellTransport::from_config(&cfg));
    let commands = parse(&text, &runner).await;

    let mut log = LogWriter::new(sink, timestamp);
    let mut progress = Progress::new(io::stderr(), cli.verbose);
    if let Err(err) =
        snapshot::collect(&commands, &cfg.hosts, &runner, &mut log, &mut progress).await
    {
        error!(error = %err, output = %output, "failed to write log");
        std::process::exit(1);
    }
    progress.finish(&output);
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0..=2 => "warn",
        3 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
