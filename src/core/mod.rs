//! Core types shared by every bazel-differ component
//!
//! # Modules
//!
//! ## `error` - Error Handling
//!
//! - [`DifferError`] - Enumerated error types covering all failure modes
//! - [`ErrorContext`] - User-friendly error wrapper with suggestions and details
//! - [`user_friendly_error`] - Convert any error to a user-friendly format
//!
//! ## `cancel` - Cooperative Cancellation
//!
//! - [`CancellationToken`] - Shared flag plus optional deadline, polled by the hashing code
//!
//! # Design Principles
//!
//! Every operation that can fail returns a [`Result`] with enough identifying detail
//! (labels, paths, revisions) to diagnose the failure. Errors are never used as control
//! flow and never silently swallowed in the core; only the CLI decides whether to halt
//! or continue in a degraded mode.

pub mod cancel;
pub mod error;

pub use cancel::CancellationToken;
pub use error::{DifferError, ErrorContext, user_friendly_error};
