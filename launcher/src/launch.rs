//! Orchestration for a single launcher invocation.
//!
//! One invocation: prepare `logs/` and `data/`, load `launcher.toml` and
//! `.env`, open `logs/run_<stamp>.log`, print the start banner, try each
//! runner strategy in order, print the end banner. Everything from the start
//! banner on goes to both the caller and the log.
//!
//! Strategy selection falls through only when a strategy is unavailable or
//! its program cannot be spawned. Once a program has run, its exit code is
//! final; a failing run is never retried with the next strategy.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::context::{ExecutionContext, HostEnv};
use crate::core::banner::{StartBanner, end_banner, no_runner_message, render_args};
use crate::exit_codes;
use crate::io::config::load_config;
use crate::io::env_file::load_env_file;
use crate::io::paths::LauncherPaths;
use crate::io::process::{Execution, RunStatus};
use crate::io::strategy::{Availability, RunnerStrategy};
use crate::io::tee::{Tee, open_log};

/// Inputs for one invocation.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub root: PathBuf,
    pub args: Vec<OsString>,
    pub started_at: DateTime<Utc>,
    pub host: HostEnv,
}

/// What happened when a strategy was considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Unavailable(String),
    NotStarted(String),
    Completed(RunStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub runner: String,
    pub result: AttemptResult,
}

/// Terminal state of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// A runner started the program and it exited with `exit_code`.
    Ran { runner: String, exit_code: i32 },
    /// A runner started the program and it was killed on timeout.
    TimedOut { runner: String },
    /// No strategy could launch the program.
    NoRunner,
}

/// Summary of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub exit_code: i32,
    pub log_path: PathBuf,
    pub attempts: Vec<Attempt>,
    pub terminal: Terminal,
}

/// Run one invocation, writing product output to `caller` and the run log.
///
/// Errors are returned only for launcher failures (directories, config,
/// `.env`, log file). Runner unavailability and program failures are reported
/// through [`LaunchOutcome`]. A failure after the start banner still writes
/// an `ERROR:` line and an end banner with exit code 1 before returning.
#[instrument(skip_all, fields(root = %request.root.display()))]
pub fn launch(
    request: &LaunchRequest,
    strategies: &[Box<dyn RunnerStrategy>],
    caller: &mut (dyn Write + Send),
) -> Result<LaunchOutcome> {
    let paths = LauncherPaths::new(&request.root);
    paths.ensure_dirs()?;
    debug!("directories ready");

    let config = load_config(&paths.config_path)?;
    let overrides = load_env_file(&paths.env_file)?.unwrap_or_default();
    debug!(vars = overrides.len(), "env loaded");

    let log_path = paths.log_path(request.started_at);
    let log = open_log(&log_path)?;
    let ctx = ExecutionContext::new(
        paths,
        config,
        &request.host,
        request.args.clone(),
        overrides,
    );

    let mut tee = Tee::new(caller, log);
    let banner = StartBanner {
        started_at: request.started_at,
        root: &ctx.paths.root,
        args: &ctx.args,
        config_dir: ctx.config_dir.as_deref(),
    };
    tee.emit(&banner.render()).context("write start banner")?;

    let (attempts, terminal, exit_code) = match run_strategies(&ctx, strategies, &mut tee) {
        Ok(finished) => finished,
        Err(err) => {
            close_failed_run(&mut tee, &err);
            return Err(err);
        }
    };

    tee.emit(&end_banner(Utc::now(), exit_code))
        .context("write end banner")?;
    info!(exit_code, log = %log_path.display(), "launch finished");

    Ok(LaunchOutcome {
        exit_code,
        log_path,
        attempts,
        terminal,
    })
}

/// Try the strategies in order and write the terminal note for the result.
fn run_strategies(
    ctx: &ExecutionContext,
    strategies: &[Box<dyn RunnerStrategy>],
    tee: &mut (dyn Write + Send),
) -> Result<(Vec<Attempt>, Terminal, i32)> {
    let (attempts, terminal) = select_and_run(ctx, strategies, tee)?;

    let exit_code = match &terminal {
        Terminal::Ran { exit_code, .. } => *exit_code,
        Terminal::TimedOut { runner } => {
            let secs = ctx.config.timeout_secs.unwrap_or_default();
            writeln!(tee, "runner={runner} timed out after {secs}s")
                .context("write timeout note")?;
            exit_codes::TIMED_OUT
        }
        Terminal::NoRunner => {
            let message = no_runner_message(
                &ctx.config.env_manager,
                &ctx.config.env_name,
                &ctx.config.system_interpreter,
                &ctx.config.remediation(&ctx.paths.root),
            );
            tee.write_all(message.as_bytes())
                .context("write no-runner diagnostic")?;
            exit_codes::NO_RUNNER
        }
    };
    Ok((attempts, terminal, exit_code))
}

/// Best effort: record `err` and an end banner so the log is never left
/// without one once the start banner is written.
fn close_failed_run(tee: &mut (dyn Write + Send), err: &anyhow::Error) {
    let closing = format!(
        "ERROR: {err:#}\n{}",
        end_banner(Utc::now(), exit_codes::INTERNAL)
    );
    if let Err(write_err) = tee.write_all(closing.as_bytes()).and_then(|()| tee.flush()) {
        warn!(err = %write_err, "failed to close run log after error");
    }
}

fn select_and_run(
    ctx: &ExecutionContext,
    strategies: &[Box<dyn RunnerStrategy>],
    out: &mut (dyn Write + Send),
) -> Result<(Vec<Attempt>, Terminal)> {
    let mut attempts = Vec::new();
    for strategy in strategies {
        let runner = strategy.name().to_string();
        let invocation = match strategy.check(ctx) {
            Availability::Ready(invocation) => invocation,
            Availability::Unavailable { reason } => {
                debug!(runner = %runner, reason = %reason, "runner unavailable");
                writeln!(out, "runner={runner} unavailable: {reason}")
                    .context("write runner note")?;
                attempts.push(Attempt {
                    runner,
                    result: AttemptResult::Unavailable(reason),
                });
                continue;
            }
        };

        writeln!(
            out,
            "runner={runner} exec={} {}",
            invocation.program.display(),
            render_args(&invocation.args)
        )
        .context("write runner note")?;
        out.flush().context("flush runner note")?;

        match strategy.execute(&invocation, ctx, out)? {
            Execution::NotStarted { reason } => {
                warn!(runner = %runner, reason = %reason, "runner failed to start");
                writeln!(out, "runner={runner} failed to start: {reason}")
                    .context("write runner note")?;
                attempts.push(Attempt {
                    runner,
                    result: AttemptResult::NotStarted(reason),
                });
            }
            Execution::Completed(status) => {
                attempts.push(Attempt {
                    runner: runner.clone(),
                    result: AttemptResult::Completed(status),
                });
                let terminal = if status.timed_out {
                    Terminal::TimedOut { runner }
                } else {
                    Terminal::Ran {
                        runner,
                        exit_code: status.exit_code,
                    }
                };
                return Ok((attempts, terminal));
            }
        }
    }
    Ok((attempts, Terminal::NoRunner))
}
