//! Launcher configuration stored in `<root>/launcher.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Launcher configuration (TOML).
///
/// The file is optional and every field has a default, so a bare checkout
/// runs `disaster_alerts` out of the `disaster-alerts` conda env.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    /// Environment manager executable looked up on the search path.
    pub env_manager: String,

    /// Name of the isolated environment the program runs in.
    pub env_name: String,

    /// Interpreter invoked inside the isolated environment.
    pub env_interpreter: String,

    /// Fallback interpreter looked up on the search path.
    pub system_interpreter: String,

    /// Module passed to the interpreter as `-m <module>`.
    pub module: String,

    /// Kill the program after this many seconds. Unset waits indefinitely.
    pub timeout_secs: Option<u64>,

    /// Command suggested when no runner is available.
    pub remediation: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            env_manager: "conda".to_string(),
            env_name: "disaster-alerts".to_string(),
            env_interpreter: "python".to_string(),
            system_interpreter: "python3".to_string(),
            module: "disaster_alerts".to_string(),
            timeout_secs: None,
            remediation: None,
        }
    }
}

impl LauncherConfig {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("env_manager", &self.env_manager),
            ("env_name", &self.env_name),
            ("env_interpreter", &self.env_interpreter),
            ("system_interpreter", &self.system_interpreter),
            ("module", &self.module),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must be non-empty"));
            }
        }
        if self.timeout_secs == Some(0) {
            return Err(anyhow!("timeout_secs must be > 0 when set"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Remediation hint, defaulting to creating the env and installing the
    /// project into it.
    pub fn remediation(&self, root: &Path) -> String {
        if let Some(custom) = &self.remediation {
            return custom.clone();
        }
        format!(
            "{manager} create -n {env} python=3.11 && {manager} run -n {env} pip install -e {root}",
            manager = self.env_manager,
            env = self.env_name,
            root = root.display(),
        )
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LauncherConfig::default()`.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    if !path.exists() {
        return Ok(LauncherConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LauncherConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
