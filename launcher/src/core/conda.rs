//! Parsing for `conda env list` output.

use std::path::Path;

/// Whether `conda env list` output names the environment `name`.
///
/// Matches either the name column or the final path component of the prefix
/// column, so environments created with `--prefix` under an `envs/` directory
/// are still found. Comment and header lines are ignored.
pub fn env_listed(output: &str, name: &str) -> bool {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| {
            let first = line.split_whitespace().next().unwrap_or_default();
            if first == name {
                return true;
            }
            let prefix = line.split_whitespace().last().unwrap_or_default();
            Path::new(prefix)
                .file_name()
                .is_some_and(|file_name| file_name == name)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
# conda environments:
#
base                  *  /opt/conda
disaster-alerts          /opt/conda/envs/disaster-alerts
                         /home/ops/prefixed/alerts-dev
";

    #[test]
    fn finds_named_env() {
        assert!(env_listed(LISTING, "disaster-alerts"));
        assert!(env_listed(LISTING, "base"));
    }

    #[test]
    fn finds_unnamed_env_by_prefix_basename() {
        assert!(env_listed(LISTING, "alerts-dev"));
    }

    #[test]
    fn ignores_missing_env_and_header_words() {
        assert!(!env_listed(LISTING, "disaster"));
        assert!(!env_listed(LISTING, "envs"));
        assert!(!env_listed(LISTING, "environments:"));
        assert!(!env_listed("", "disaster-alerts"));
    }
}
