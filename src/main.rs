mod cli;
mod logging;

use anyhow::Context;
use axslog::config::split_log_files;
use axslog::{engine, Engine, Settings, TailOptions, TargetSet};
use clap::Parser;
use cli::Cli;
use dotenv::dotenv;
use std::io;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("get stats: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Cli) -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;

    let targets = TargetSet {
        log_files: split_log_files(&args.log_file),
        key_prefix: args.key_prefix,
        work_dir: settings.resolve_work_dir(args.work_dir),
        owner: current_uid(),
    };
    let options = TailOptions {
        primary_key: args.request_time,
        secondary_key: args.upstream_time,
        filter: args.filter,
        ..TailOptions::default()
    }
    .with_limits(&settings);

    let engine = Engine::new(targets, options);
    let mut results = engine.run()?;

    let stdout = io::stdout();
    engine::emit(&mut results, &engine.targets().key_prefix, &mut stdout.lock())
        .context("writing stats")?;
    Ok(())
}

#[cfg(unix)]
fn current_uid() -> String {
    nix::unistd::getuid().to_string()
}

#[cfg(not(unix))]
fn current_uid() -> String {
    "0".to_string()
}
