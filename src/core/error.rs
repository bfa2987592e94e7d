//! Error handling for bazel-differ
//!
//! This module provides the error types and user-friendly error reporting used across the
//! crate. The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can react to specific failures
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Input errors**: [`DifferError::CircularDependency`], [`DifferError::UnresolvedDependency`],
//!   [`DifferError::SourceDigestFailed`], [`DifferError::SeedFileUnreadable`]. These abort the
//!   fingerprinting pass of the revision being processed.
//! - **Cache errors**: [`DifferError::CacheReadFailed`], [`DifferError::CacheWriteFailed`].
//! - **Collaborator errors**: Git and Bazel failures. These abort the run before any diffing
//!   happens, since results computed against the wrong working tree are meaningless.
//! - **Cancellation**: [`DifferError::Cancelled`].
//!
//! Use [`user_friendly_error`] to turn any [`anyhow::Error`] into an [`ErrorContext`] for
//! display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use bazel_differ::core::{DifferError, ErrorContext};
//!
//! let context = ErrorContext::new(DifferError::GitNotFound)
//!     .with_suggestion("Install git from https://git-scm.com/")
//!     .with_details("bazel-differ checks out revisions with the system git binary");
//!
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for bazel-differ operations.
///
/// Variants carry the identifiers (labels, paths, revisions) needed to diagnose the
/// failure without re-running with extra logging.
#[derive(Error, Debug)]
pub enum DifferError {
    /// The dependency graph contains a cycle.
    ///
    /// `chain` lists the participating labels in traversal order, with the first label
    /// repeated at the end to show where the cycle closes.
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// Labels forming the cycle, joined with ` -> `
        chain: String,
    },

    /// A target declares a dependency that is not part of the graph.
    #[error("Target '{target}' depends on '{dependency}', which is not in the build graph")]
    UnresolvedDependency {
        /// The target declaring the dependency
        target: String,
        /// The missing dependency label
        dependency: String,
    },

    /// The same label was added to a graph twice.
    #[error("Duplicate target in build graph: {label}")]
    DuplicateTarget {
        /// The duplicated label
        label: String,
    },

    /// A source file or directory referenced by a target could not be read.
    #[error("Failed to digest source '{name}' at {path}: {reason}")]
    SourceDigestFailed {
        /// The source reference name (label)
        name: String,
        /// The resolved filesystem path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// A seed file could not be read.
    #[error("Failed to read seed file {path}: {reason}")]
    SeedFileUnreadable {
        /// The seed file path
        path: String,
        /// Underlying failure
        reason: String,
    },

    /// The cache store could not be read.
    #[error("Failed to read cached hashes for revision '{revision}': {reason}")]
    CacheReadFailed {
        /// Revision identifier used as cache key
        revision: String,
        /// Underlying failure
        reason: String,
    },

    /// The cache store could not be written.
    #[error("Failed to cache hashes for revision '{revision}': {reason}")]
    CacheWriteFailed {
        /// Revision identifier used as cache key
        revision: String,
        /// Underlying failure
        reason: String,
    },

    /// Git executable not found in PATH
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git command execution failed
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g. "rev-parse")
        operation: String,
        /// Error output from git
        stderr: String,
    },

    /// Checking out a revision failed
    #[error("Failed to checkout revision '{reference}'")]
    GitCheckoutFailed {
        /// The revision being checked out
        reference: String,
        /// Reason for the failure
        reason: String,
    },

    /// Bazel executable could not be located
    #[error("Bazel executable not found: {path}")]
    BazelNotFound {
        /// The configured path or name of the Bazel binary
        path: String,
    },

    /// A Bazel query failed
    #[error("Bazel query failed: {query}")]
    BazelQueryFailed {
        /// The query expression
        query: String,
        /// Error output from Bazel
        stderr: String,
    },

    /// Bazel produced query output that could not be decoded
    #[error("Invalid query output at line {line}: {reason}")]
    QueryOutputParseError {
        /// 1-based line number in the streamed output
        line: usize,
        /// Decoding failure
        reason: String,
    },

    /// The query template could not be rendered
    #[error("Invalid query template '{template}': {reason}")]
    QueryTemplateError {
        /// The template text
        template: String,
        /// Rendering failure
        reason: String,
    },

    /// Configuration value is invalid
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Configuration file could not be parsed
    #[error("Invalid configuration file syntax in {file}")]
    ConfigParseError {
        /// Path of the config file
        file: String,
        /// Parser message
        reason: String,
    },

    /// The run was cancelled before the pass completed
    #[error("Operation cancelled: {reason}")]
    Cancelled {
        /// Why the run was cancelled (signal, deadline)
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for cases not covered by specific variants
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl Clone for DifferError {
    fn clone(&self) -> Self {
        match self {
            Self::CircularDependency {
                chain,
            } => Self::CircularDependency {
                chain: chain.clone(),
            },
            Self::UnresolvedDependency {
                target,
                dependency,
            } => Self::UnresolvedDependency {
                target: target.clone(),
                dependency: dependency.clone(),
            },
            Self::DuplicateTarget {
                label,
            } => Self::DuplicateTarget {
                label: label.clone(),
            },
            Self::SourceDigestFailed {
                name,
                path,
                reason,
            } => Self::SourceDigestFailed {
                name: name.clone(),
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::SeedFileUnreadable {
                path,
                reason,
            } => Self::SeedFileUnreadable {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::CacheReadFailed {
                revision,
                reason,
            } => Self::CacheReadFailed {
                revision: revision.clone(),
                reason: reason.clone(),
            },
            Self::CacheWriteFailed {
                revision,
                reason,
            } => Self::CacheWriteFailed {
                revision: revision.clone(),
                reason: reason.clone(),
            },
            Self::GitNotFound => Self::GitNotFound,
            Self::GitCommandError {
                operation,
                stderr,
            } => Self::GitCommandError {
                operation: operation.clone(),
                stderr: stderr.clone(),
            },
            Self::GitCheckoutFailed {
                reference,
                reason,
            } => Self::GitCheckoutFailed {
                reference: reference.clone(),
                reason: reason.clone(),
            },
            Self::BazelNotFound {
                path,
            } => Self::BazelNotFound {
                path: path.clone(),
            },
            Self::BazelQueryFailed {
                query,
                stderr,
            } => Self::BazelQueryFailed {
                query: query.clone(),
                stderr: stderr.clone(),
            },
            Self::QueryOutputParseError {
                line,
                reason,
            } => Self::QueryOutputParseError {
                line: *line,
                reason: reason.clone(),
            },
            Self::QueryTemplateError {
                template,
                reason,
            } => Self::QueryTemplateError {
                template: template.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::ConfigParseError {
                file,
                reason,
            } => Self::ConfigParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::Cancelled {
                reason,
            } => Self::Cancelled {
                reason: reason.clone(),
            },
            // io::Error is not Clone
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// When displayed, errors show the main message in red, optional details in yellow and
/// an optional suggestion in green.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: DifferError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: DifferError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions.
///
/// Recognizes [`DifferError`] anywhere in the error chain (so errors wrapped with
/// `anyhow::Context` keep their tailored suggestions), then [`std::io::Error`], and falls
/// back to the full error chain as a generic message.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(differ_error) = cause.downcast_ref::<DifferError>() {
            let mut context = create_error_context(differ_error.clone());
            if context.details.is_none() && cause.to_string() != error.to_string() {
                context = context.with_details(error.to_string());
            }
            return context;
        }
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(DifferError::Other {
                    message: format!("Permission denied: {io_error}"),
                })
                .with_suggestion("Check file ownership and permissions in the workspace and cache directory");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(DifferError::Other {
                    message: format!("File not found: {io_error}"),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    let chain = error.chain().map(ToString::to_string).collect::<Vec<_>>();
    ErrorContext::new(DifferError::Other {
        message: chain.first().cloned().unwrap_or_default(),
    })
    .with_details(chain.iter().skip(1).cloned().collect::<Vec<_>>().join(": "))
}

fn create_error_context(error: DifferError) -> ErrorContext {
    match &error {
        DifferError::CircularDependency {
            ..
        } => ErrorContext::new(error)
            .with_details("Targets can only be fingerprinted when the dependency graph is acyclic")
            .with_suggestion("Break the cycle in the BUILD files, then re-run"),
        DifferError::UnresolvedDependency {
            ..
        } => ErrorContext::new(error)
            .with_details("A target's fingerprint is meaningless without the fingerprints of all its dependencies")
            .with_suggestion("Check that the query covers every package the target depends on"),
        DifferError::SourceDigestFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check file permissions in the workspace; unreadable sources make fingerprints untrustworthy"),
        DifferError::SeedFileUnreadable {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Every path listed in the seed file must exist relative to the workspace"),
        DifferError::CacheReadFailed {
            ..
        }
        | DifferError::CacheWriteFailed {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the cache directory permissions or re-run with --nocache"),
        DifferError::GitNotFound => ErrorContext::new(error)
            .with_suggestion("Install git from https://git-scm.com/ and make sure it is in PATH"),
        DifferError::GitCheckoutFailed {
            reason,
            ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error)
                .with_details(reason)
                .with_suggestion("Make sure the revision exists locally (git fetch) and the working tree is clean")
        }
        DifferError::GitCommandError {
            stderr,
            ..
        } => {
            let stderr = stderr.clone();
            ErrorContext::new(error).with_details(stderr)
        }
        DifferError::BazelNotFound {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Pass the Bazel binary with --bazel or set bazel_path in .bazel-differ.toml"),
        DifferError::BazelQueryFailed {
            stderr,
            ..
        } => {
            let stderr = stderr.clone();
            ErrorContext::new(error)
                .with_details(stderr)
                .with_suggestion("Run the query manually in the workspace to see the full Bazel output")
        }
        DifferError::QueryTemplateError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Reference the impacted targets with {{ targets }}, e.g. 'kind(\".*_test\", set({{ targets }}))'"),
        DifferError::ConfigParseError {
            reason,
            ..
        } => {
            let reason = reason.clone();
            ErrorContext::new(error).with_details(reason)
        }
        DifferError::Cancelled {
            ..
        } => ErrorContext::new(error)
            .with_details("No hashes were cached for the interrupted revision"),
        _ => ErrorContext::new(error),
    }
}
