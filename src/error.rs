// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! Error types for the destruction engine.
//!
//! This module defines all error types used throughout the application,
//! the classification of raw I/O errors into the engine's taxonomy, and
//! the mapping from fatal errors to process exit codes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Process exited with every operation Success or Skipped.
pub const EXIT_SUCCESS: i32 = 0;
/// Setup failure, or at least one operation recorded a Failed outcome.
pub const EXIT_GENERAL_ERROR: i32 = 1;
/// The run as a whole was stopped by a permission denial.
pub const EXIT_PERMISSION_ERROR: i32 = 2;
/// Malformed request: bad pass count, disallowed path, nothing to do.
pub const EXIT_INVALID_INPUT: i32 = 3;
/// The run was interrupted by SIGINT/SIGTERM (128 + SIGINT).
pub const EXIT_CANCELLED: i32 = 130;

/// Main error type for all destruction operations.
///
/// Per-target errors are recovered locally and surface as Failed or
/// Skipped outcomes in the report; only setup-time errors propagate out
/// of the orchestrator and terminate the run.
#[derive(Error, Debug)]
pub enum ShredError {
    /// The invoking user lacks permission for the target.
    #[error("permission denied: {0}")]
    Permission(String),

    /// The target does not exist (or vanished mid-operation).
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error during an operation (disk full, short write, ...).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request: out-of-range pass count, disallowed path.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The run was cancelled by the user.
    #[error("cancelled")]
    Cancelled,

    /// No safe method exists for this file; surfaces as Skipped, not Failed.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Machine-readable classification of a [`ShredError`], carried in
/// outcome records so reports identify why an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Permission,
    NotFound,
    Io,
    InvalidInput,
    Cancelled,
    Unsupported,
}

impl ShredError {
    /// Classifies a raw I/O error against the engine taxonomy, attaching
    /// the path it occurred on.
    pub fn classify_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Self::Permission(format!("{}: {}", path.display(), err))
            }
            std::io::ErrorKind::NotFound => {
                Self::NotFound(format!("{}: {}", path.display(), err))
            }
            _ => Self::Io(err),
        }
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Permission(_) => ErrorKind::Permission,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io(_) => ErrorKind::Io,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Exit code used when this error is fatal to the whole run.
    ///
    /// Per-target failures never reach this path; they are folded into
    /// the report and the report computes the overall status instead.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Permission(_) => EXIT_PERMISSION_ERROR,
            Self::InvalidInput(_) => EXIT_INVALID_INPUT,
            Self::Cancelled => EXIT_CANCELLED,
            _ => EXIT_GENERAL_ERROR,
        }
    }
}

/// Type alias for Results using ShredError.
pub type Result<T> = std::result::Result<T, ShredError>;
