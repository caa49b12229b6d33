//! Cron-friendly launcher for the `disaster_alerts` pipeline.
//!
//! Each invocation resolves the project root, prepares `logs/` and `data/`,
//! loads optional `.env` overrides, and runs `python -m disaster_alerts`
//! through the first usable runner strategy (the `disaster-alerts` conda env,
//! then the system `python3`). Output is mirrored to stdout and to
//! `logs/run_<UTC stamp>.log`; the launcher exits with the program's code.
//!
//! - **[`core`]**: Pure, deterministic logic (stamps, `.env` parsing, banners).
//! - **[`io`]**: Side-effecting operations (filesystem, config, processes).
//!
//! [`launch`] coordinates the two to implement the CLI.

pub mod context;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod launch;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
