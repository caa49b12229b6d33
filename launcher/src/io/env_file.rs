//! Loading the optional `<root>/.env` file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::env_file::{EnvOverrides, parse_env};

/// Read and parse the env file at `path`.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_env_file(path: &Path) -> Result<Option<EnvOverrides>> {
    if !path.exists() {
        debug!(path = %path.display(), "no env file");
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let overrides = parse_env(&contents).with_context(|| format!("parse {}", path.display()))?;
    debug!(path = %path.display(), vars = overrides.len(), "loaded env file");
    Ok(Some(overrides))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = load_env_file(&temp.path().join(".env")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn loads_assignments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(&path, "SMTP_USER=alerts\nexport DISASTER_ALERTS_UA='alerts/1.0'\n")
            .expect("write");

        let loaded = load_env_file(&path).expect("load").expect("present");
        assert_eq!(loaded.get("SMTP_USER"), Some("alerts"));
        assert_eq!(loaded.get("DISASTER_ALERTS_UA"), Some("alerts/1.0"));
    }

    #[test]
    fn malformed_file_names_path_and_line() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(".env");
        fs::write(&path, "GOOD=1\n\nbroken line\n").expect("write");

        let err = load_env_file(&path).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains(".env"), "got: {msg}");
        assert!(msg.contains("line 3"), "got: {msg}");
    }
}
