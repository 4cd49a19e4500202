// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! TrackShred - secure file and metadata destruction engine.
//!
//! This library destroys the recoverable content of targeted files via
//! multi-pass overwrite, strips identifying metadata, and sweeps
//! well-known OS locations that retain traces of deleted files.
//!
//! # Features
//!
//! - **Multi-pass overwrite**: 1-10 full-length sweeps of CSPRNG data,
//!   each durable before the next, followed by unlink
//! - **Tool probing**: binds GNU `shred`/`exiftool` when installed,
//!   self-contained fallbacks otherwise
//! - **Path validation**: traversal and symlink-escape rejection,
//!   protected system roots are never touched
//! - **Trace sweeping**: thumbnail caches, recently-used lists, trash,
//!   and (opt-in) shell history
//! - **Dry run**: full validation and planning with zero writes
//! - **Cooperative cancellation**: pass-granular, never mid-write
//!
//! # Example
//!
//! ```no_run
//! use trackshred::{CancelToken, DestructionOrchestrator, Mode, OperationRequest, Profile};
//!
//! let request = OperationRequest::new(
//!     vec!["secret.pdf".into()],
//!     Mode::Combined,
//!     3,
//!     false,
//!     false,
//!     Profile::Basic,
//! )?;
//! let mut engine = DestructionOrchestrator::new(CancelToken::new())?;
//! let report = engine.run(&request);
//! assert!(report.is_finalized());
//! # Ok::<(), trackshred::ShredError>(())
//! ```
//!
//! Overwrite-based destruction cannot defeat wear leveling or
//! copy-on-write snapshots; see the `shred` module notes on media
//! limitations.

pub mod config;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod report;
pub mod shred;
pub mod sweep;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, Profile, DEFAULT_SHRED_PASSES, MAX_SHRED_PASSES, MIN_SHRED_PASSES};
pub use error::{
    ErrorKind, Result, ShredError, EXIT_CANCELLED, EXIT_GENERAL_ERROR, EXIT_INVALID_INPUT,
    EXIT_PERMISSION_ERROR, EXIT_SUCCESS,
};
pub use metadata::{select_metadata_stripper, MetadataStripper};
pub use orchestrator::{CancelToken, DestructionOrchestrator, Mode, OperationRequest, Phase};
pub use report::{OperationKind, OperationOutcome, OperationReport, OutcomeStatus, ReportSummary};
pub use shred::{select_overwrite_strategy, OverwriteStrategy};
pub use sweep::SystemSweeper;
pub use validation::{PathValidator, ResolvedPath, TargetEntry, PROTECTED_ROOTS};
