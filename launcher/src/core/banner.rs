//! Lines written to the caller and the run log around a launch.

use std::ffi::OsString;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::timestamp::banner_stamp;

/// Fields shown in the start banner.
#[derive(Debug, Clone)]
pub struct StartBanner<'a> {
    pub started_at: DateTime<Utc>,
    pub root: &'a Path,
    pub args: &'a [OsString],
    pub config_dir: Option<&'a Path>,
}

impl StartBanner<'_> {
    pub fn render(&self) -> String {
        let mut out = format!(
            "=== disaster-alerts run start {} ===\nroot={}\nargs={}\n",
            banner_stamp(self.started_at),
            self.root.display(),
            render_args(self.args),
        );
        if let Some(dir) = self.config_dir {
            out.push_str(&format!("config_dir={}\n", dir.display()));
        }
        out
    }
}

pub fn end_banner(finished_at: DateTime<Utc>, exit_code: i32) -> String {
    format!(
        "=== disaster-alerts run end {} exit={exit_code} ===\n",
        banner_stamp(finished_at)
    )
}

/// Arguments joined by single spaces, as the caller typed them.
pub fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Diagnostic for when no runner strategy could launch the program.
pub fn no_runner_message(
    env_manager: &str,
    env_name: &str,
    system_interpreter: &str,
    remediation: &str,
) -> String {
    format!(
        "ERROR: {env_manager} env '{env_name}' not found and '{system_interpreter}' is not on PATH\n\
         create it with: {remediation}\n"
    )
}
