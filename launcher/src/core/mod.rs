//! Pure, deterministic logic. No filesystem, process, or environment access.

pub mod banner;
pub mod conda;
pub mod env_file;
pub mod timestamp;
