//! Runner strategies: ordered, capability-checked ways to launch the program.
//!
//! The [`RunnerStrategy`] trait decouples launch orchestration from the tool
//! that actually starts the interpreter. [`CondaStrategy`] runs inside the
//! named conda environment; [`SystemInterpreterStrategy`] falls back to the
//! interpreter on the search path. Tests use scripted strategies that never
//! spawn processes.

use std::io::Write;
use std::process::Stdio;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::core::conda::env_listed;
use crate::io::process::{Execution, Invocation, run_streaming};

/// Outcome of a capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// The strategy can launch the program with this invocation.
    Ready(Invocation),
    /// The strategy cannot be used; `reason` is shown in the run log.
    Unavailable { reason: String },
}

impl Availability {
    fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// A way of launching the underlying program.
pub trait RunnerStrategy {
    /// Short label used in the run log (`runner=<name>`).
    fn name(&self) -> &str;

    /// Decide whether this strategy applies, without running the program.
    fn check(&self, ctx: &ExecutionContext) -> Availability;

    /// Run `invocation`, streaming its combined output into `out`.
    fn execute(
        &self,
        invocation: &Invocation,
        ctx: &ExecutionContext,
        out: &mut (dyn Write + Send),
    ) -> Result<Execution> {
        let cmd = invocation.command(&ctx.overrides, ctx.search_path.as_deref());
        run_streaming(cmd, out, ctx.config.timeout())
    }
}

/// Runs the program inside the named environment via `conda run`.
pub struct CondaStrategy;

impl RunnerStrategy for CondaStrategy {
    fn name(&self) -> &str {
        "conda"
    }

    #[instrument(skip_all, fields(env = %ctx.config.env_name))]
    fn check(&self, ctx: &ExecutionContext) -> Availability {
        let manager = &ctx.config.env_manager;
        let env_name = &ctx.config.env_name;
        let Some(tool) = ctx.find_tool(manager) else {
            return Availability::unavailable(format!("{manager} not found on PATH"));
        };

        let mut list = Invocation::new(&tool)
            .args(["env", "list"])
            .command(&ctx.overrides, ctx.search_path.as_deref());
        list.stdin(Stdio::null()).stderr(Stdio::null());
        let output = match list.output() {
            Ok(output) => output,
            Err(err) => {
                return Availability::unavailable(format!("{manager} env list failed: {err}"));
            }
        };
        if !output.status.success() {
            return Availability::unavailable(format!(
                "{manager} env list exited with {:?}",
                output.status.code()
            ));
        }
        if !env_listed(&String::from_utf8_lossy(&output.stdout), env_name) {
            return Availability::unavailable(format!("{manager} env '{env_name}' not found"));
        }

        debug!(tool = %tool.display(), "conda env available");
        Availability::Ready(
            Invocation::new(tool)
                .args(["run", "-n", env_name.as_str(), "--no-capture-output"])
                .arg(&ctx.config.env_interpreter)
                .args(ctx.module_args()),
        )
    }
}

/// Runs the program with the interpreter found on the search path.
pub struct SystemInterpreterStrategy;

impl RunnerStrategy for SystemInterpreterStrategy {
    fn name(&self) -> &str {
        "system"
    }

    fn check(&self, ctx: &ExecutionContext) -> Availability {
        let interpreter = &ctx.config.system_interpreter;
        match ctx.find_tool(interpreter) {
            Some(path) => Availability::Ready(Invocation::new(path).args(ctx.module_args())),
            None => Availability::unavailable(format!("{interpreter} not found on PATH")),
        }
    }
}

/// Strategies in fallback order: isolated environment first.
pub fn default_strategies() -> Vec<Box<dyn RunnerStrategy>> {
    vec![Box::new(CondaStrategy), Box::new(SystemInterpreterStrategy)]
}
