//! `launcher [ARGS]...`: run `disaster_alerts` with logging and runner fallback.
//!
//! All arguments are forwarded verbatim; the launcher interprets none of them.

use std::env;
use std::ffi::OsString;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use launcher::context::HostEnv;
use launcher::exit_codes;
use launcher::io::paths::{ROOT_ENV, resolve_root};
use launcher::io::strategy::default_strategies;
use launcher::launch::{LaunchRequest, launch};
use launcher::logging;

#[derive(Parser)]
#[command(
    name = "launcher",
    about = "Run the disaster_alerts pipeline with a timestamped log",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Arguments forwarded to `python -m disaster_alerts` (e.g. `--dry-run`).
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_parser = clap::value_parser!(OsString)
    )]
    args: Vec<OsString>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INTERNAL);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let started_at = Utc::now();
    let exe = env::current_exe().context("locate launcher executable")?;
    let root = resolve_root(env::var_os(ROOT_ENV).as_deref(), &exe)?;

    let request = LaunchRequest {
        root,
        args: cli.args,
        started_at,
        host: HostEnv::capture(),
    };
    let mut stdout = std::io::stdout();
    let outcome = launch(&request, &default_strategies(), &mut stdout)?;
    Ok(outcome.exit_code)
}
