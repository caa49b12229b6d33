//! Root resolution and the on-disk layout under it.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use crate::core::timestamp::log_file_name;

/// Overrides the root directory when set and non-empty.
pub const ROOT_ENV: &str = "DISASTER_ALERTS_ROOT";
/// Config directory for the pipeline; echoed in the start banner only.
pub const CONFIG_DIR_ENV: &str = "DISASTER_ALERTS_CONFIG_DIR";

/// All canonical paths for a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    pub root: PathBuf,
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub env_file: PathBuf,
    pub config_path: PathBuf,
}

impl LauncherPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            logs_dir: root.join("logs"),
            data_dir: root.join("data"),
            env_file: root.join(".env"),
            config_path: root.join("launcher.toml"),
            root,
        }
    }

    /// `logs/run_<stamp>.log` for an invocation started at `started_at`.
    pub fn log_path(&self, started_at: DateTime<Utc>) -> PathBuf {
        self.logs_dir.join(log_file_name(started_at))
    }

    /// Create `logs/` and `data/`. Existing directories are left alone.
    pub fn ensure_dirs(&self) -> Result<()> {
        create_dir(&self.logs_dir)?;
        create_dir(&self.data_dir)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

/// Resolve the project root.
///
/// A non-empty `override_root` wins. Otherwise the root is the parent of the
/// directory containing `exe` (a binary installed at `<root>/bin/launcher`
/// resolves to `<root>`).
pub fn resolve_root(override_root: Option<&OsStr>, exe: &Path) -> Result<PathBuf> {
    if let Some(root) = override_root.filter(|root| !root.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let exe = exe
        .canonicalize()
        .with_context(|| format!("resolve executable path {}", exe.display()))?;
    exe.parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("executable {} has no parent directory", exe.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::ffi::OsString;

    #[test]
    fn layout_is_rooted() {
        let paths = LauncherPaths::new("/srv/alerts");
        assert_eq!(paths.logs_dir, Path::new("/srv/alerts/logs"));
        assert_eq!(paths.data_dir, Path::new("/srv/alerts/data"));
        assert_eq!(paths.env_file, Path::new("/srv/alerts/.env"));
        assert_eq!(paths.config_path, Path::new("/srv/alerts/launcher.toml"));

        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("valid time");
        assert_eq!(
            paths.log_path(at),
            Path::new("/srv/alerts/logs/run_20260102T030405Z.log")
        );
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = LauncherPaths::new(temp.path().join("nested/root"));
        paths.ensure_dirs().expect("first");
        fs::write(paths.data_dir.join("state.json"), "{}").expect("write");
        paths.ensure_dirs().expect("second");

        assert!(paths.logs_dir.is_dir());
        assert!(paths.data_dir.join("state.json").is_file());
    }

    #[test]
    fn override_wins_over_exe_location() {
        let root = OsString::from("/opt/alerts");
        let resolved =
            resolve_root(Some(&root), Path::new("/does/not/exist/launcher")).expect("resolve");
        assert_eq!(resolved, Path::new("/opt/alerts"));
    }

    #[test]
    fn empty_override_falls_back_to_exe_grandparent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).expect("mkdir");
        let exe = bin.join("launcher");
        fs::write(&exe, "").expect("write exe");

        let empty = OsString::new();
        let resolved = resolve_root(Some(&empty), &exe).expect("resolve");
        let expected = temp.path().canonicalize().expect("canonicalize");
        assert_eq!(resolved, expected);
    }

    #[test]
    fn missing_exe_is_an_error() {
        let err = resolve_root(None, Path::new("/does/not/exist/launcher")).unwrap_err();
        assert!(err.to_string().contains("resolve executable path"));
    }
}
