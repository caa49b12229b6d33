//! Per-invocation execution context.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::core::env_file::EnvOverrides;
use crate::io::config::LauncherConfig;
use crate::io::paths::{CONFIG_DIR_ENV, LauncherPaths};

/// The parts of the launching process environment the launcher reads.
///
/// Captured once in `main`; nothing else reads the global environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    pub path: Option<OsString>,
    pub config_dir: Option<OsString>,
}

impl HostEnv {
    pub fn capture() -> Self {
        Self {
            path: std::env::var_os("PATH"),
            config_dir: std::env::var_os(CONFIG_DIR_ENV),
        }
    }
}

/// Everything a runner strategy needs to check for and launch the program.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub paths: LauncherPaths,
    pub config: LauncherConfig,
    /// Arguments forwarded verbatim to the program.
    pub args: Vec<OsString>,
    /// Variables from `.env`, applied to every child.
    pub overrides: EnvOverrides,
    /// `PATH` used for tool lookup and given to children.
    pub search_path: Option<OsString>,
    pub config_dir: Option<PathBuf>,
}

impl ExecutionContext {
    /// Build the context. `.env` values win over the host environment.
    pub fn new(
        paths: LauncherPaths,
        config: LauncherConfig,
        host: &HostEnv,
        args: Vec<OsString>,
        overrides: EnvOverrides,
    ) -> Self {
        let search_path = overrides
            .get("PATH")
            .map(OsString::from)
            .or_else(|| host.path.clone());
        let config_dir = overrides
            .get(CONFIG_DIR_ENV)
            .map(OsString::from)
            .or_else(|| host.config_dir.clone())
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);
        Self {
            paths,
            config,
            args,
            overrides,
            search_path,
            config_dir,
        }
    }

    /// Locate an executable on the search path.
    pub fn find_tool(&self, name: &str) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(path) => which::which_in(name, Some(path), &self.paths.root),
            None => which::which(name),
        };
        found.ok()
    }

    /// `-m <module> <forwarded args...>`
    pub fn module_args(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("-m"), OsString::from(&self.config.module)];
        args.extend(self.args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(host: &HostEnv, overrides: EnvOverrides) -> ExecutionContext {
        ExecutionContext::new(
            LauncherPaths::new("/srv/alerts"),
            LauncherConfig::default(),
            host,
            vec![OsString::from("--dry-run")],
            overrides,
        )
    }

    #[test]
    fn env_file_overrides_host_values() {
        let host = HostEnv {
            path: Some(OsString::from("/usr/bin")),
            config_dir: Some(OsString::from("/etc/alerts")),
        };
        let mut overrides = EnvOverrides::new();
        overrides.insert("PATH", "/opt/conda/bin:/usr/bin");
        overrides.insert(CONFIG_DIR_ENV, "/srv/alerts/config");

        let ctx = context(&host, overrides);
        assert_eq!(
            ctx.search_path.as_deref(),
            Some(std::ffi::OsStr::new("/opt/conda/bin:/usr/bin"))
        );
        assert_eq!(ctx.config_dir, Some(PathBuf::from("/srv/alerts/config")));
    }

    #[test]
    fn host_values_used_without_overrides() {
        let host = HostEnv {
            path: Some(OsString::from("/usr/bin")),
            config_dir: None,
        };
        let ctx = context(&host, EnvOverrides::new());
        assert_eq!(ctx.search_path, Some(OsString::from("/usr/bin")));
        assert_eq!(ctx.config_dir, None);
    }

    #[test]
    fn empty_config_dir_is_ignored() {
        let host = HostEnv {
            path: None,
            config_dir: Some(OsString::new()),
        };
        assert_eq!(context(&host, EnvOverrides::new()).config_dir, None);
    }

    #[test]
    fn module_args_prefix_forwarded_args() {
        let ctx = context(&HostEnv::default(), EnvOverrides::new());
        assert_eq!(
            ctx.module_args(),
            vec![
                OsString::from("-m"),
                OsString::from("disaster_alerts"),
                OsString::from("--dry-run"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn find_tool_uses_search_path() {
        let bin = crate::test_support::FakeBin::new().expect("fake bin");
        let script = bin.script("python3", "exit 0\n").expect("script");

        let host = HostEnv {
            path: Some(bin.path_var()),
            config_dir: None,
        };
        let ctx = context(&host, EnvOverrides::new());
        assert_eq!(ctx.find_tool("python3"), Some(script));
        assert_eq!(ctx.find_tool("conda"), None);
    }
}
