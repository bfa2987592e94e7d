//! Cross-platform helpers shared by the CLI, the cache and the tool clients.
//!
//! - [`fs`] - Atomic writes and directory creation
//! - [`platform`] - Tool lookup and path expansion

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, ensure_dir};
pub use platform::{find_executable, get_bazel_command, get_git_command, is_windows, resolve_path};
