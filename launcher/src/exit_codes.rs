//! Stable exit codes for the launcher.
//!
//! Any other code is the underlying program's own exit code, passed through.

/// The program ran and exited successfully.
pub const OK: i32 = 0;
/// No runner strategy could launch the program.
pub const NO_RUNNER: i32 = 1;
/// The launcher itself failed (layout, config, env file, log file).
pub const INTERNAL: i32 = 1;
/// The program was killed after the configured `timeout_secs`.
pub const TIMED_OUT: i32 = 124;
