//! Test-only helpers: fake executables on a private `PATH` and scripted
//! runner strategies.

use std::cell::Cell;
use std::io::Write;

use anyhow::{Result, anyhow};

use crate::context::ExecutionContext;
use crate::io::process::{Execution, Invocation, RunStatus};
use crate::io::strategy::{Availability, RunnerStrategy};

#[cfg(unix)]
pub use fake_bin::{FakeBin, conda_script};

#[cfg(unix)]
mod fake_bin {
    use std::ffi::OsString;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use tempfile::TempDir;

    /// A temporary directory of `/bin/sh` scripts used as the only `PATH` entry.
    pub struct FakeBin {
        dir: TempDir,
    }

    impl FakeBin {
        pub fn new() -> Result<Self> {
            let dir = tempfile::tempdir().context("create fake bin dir")?;
            Ok(Self { dir })
        }

        pub fn dir(&self) -> &Path {
            self.dir.path()
        }

        /// Value suitable for `PATH` containing only this directory.
        pub fn path_var(&self) -> OsString {
            self.dir.path().as_os_str().to_owned()
        }

        /// Write an executable `/bin/sh` script named `name` with `body`.
        pub fn script(&self, name: &str, body: &str) -> Result<PathBuf> {
            let path = self.dir.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}"))
                .with_context(|| format!("write {}", path.display()))?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .with_context(|| format!("chmod {}", path.display()))?;
            Ok(path)
        }
    }

    /// Body for a fake `conda` that lists `envs` and, for `conda run`, echoes
    /// its arguments and exits with `run_exit`.
    pub fn conda_script(envs: &[&str], run_exit: i32) -> String {
        let mut body = String::from(
            "if [ \"$1\" = \"env\" ] && [ \"$2\" = \"list\" ]; then\n\
             echo '# conda environments:'\n\
             echo '#'\n",
        );
        for env in envs {
            body.push_str(&format!("echo '{env}    /opt/conda/envs/{env}'\n"));
        }
        body.push_str("exit 0\nfi\n");
        body.push_str(&format!(
            "if [ \"$1\" = \"run\" ]; then\necho \"conda $*\"\nexit {run_exit}\nfi\nexit 64\n"
        ));
        body
    }
}

/// Predetermined behavior for a [`ScriptedStrategy`].
#[derive(Debug, Clone)]
pub enum Script {
    Unavailable(String),
    NotStarted(String),
    Exit { code: i32, output: String },
    /// `execute` returns an error after the program was considered ready.
    Fail(String),
}

/// Strategy that never spawns processes. Records how often it was checked
/// and executed.
pub struct ScriptedStrategy {
    name: String,
    script: Script,
    pub checks: Cell<u32>,
    pub executions: Cell<u32>,
}

impl ScriptedStrategy {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            checks: Cell::new(0),
            executions: Cell::new(0),
        }
    }
}

impl RunnerStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, ctx: &ExecutionContext) -> Availability {
        self.checks.set(self.checks.get() + 1);
        match &self.script {
            Script::Unavailable(reason) => Availability::Unavailable {
                reason: reason.clone(),
            },
            _ => Availability::Ready(Invocation::new(&self.name).args(ctx.module_args())),
        }
    }

    fn execute(
        &self,
        _invocation: &Invocation,
        _ctx: &ExecutionContext,
        out: &mut (dyn Write + Send),
    ) -> Result<Execution> {
        self.executions.set(self.executions.get() + 1);
        match &self.script {
            Script::Unavailable(_) => unreachable!("unavailable strategy executed"),
            Script::NotStarted(reason) => Ok(Execution::NotStarted {
                reason: reason.clone(),
            }),
            Script::Exit { code, output } => {
                out.write_all(output.as_bytes())?;
                Ok(Execution::Completed(RunStatus {
                    exit_code: *code,
                    timed_out: false,
                }))
            }
            Script::Fail(message) => Err(anyhow!("{message}")),
        }
    }
}
