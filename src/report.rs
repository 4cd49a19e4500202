// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! Outcome records and the per-invocation operation report.
//!
//! Every attempted operation produces exactly one [`OperationOutcome`].
//! The report collects them append-only, is finalized exactly once at the
//! end of a run, and can be serialized to JSON atomically.

use crate::error::{
    ErrorKind, Result, ShredError, EXIT_CANCELLED, EXIT_GENERAL_ERROR, EXIT_SUCCESS,
};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The kind of operation an outcome describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Multi-pass overwrite followed by unlink.
    Overwrite,
    /// Embedded/filesystem metadata removal.
    MetadataStrip,
    /// One entry of the system trace sweep.
    SweepItem,
}

/// Terminal status of a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Skipped,
    Failed,
}

/// Record of one attempted operation on one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub target: PathBuf,
    pub kind: OperationKind,
    pub status: OutcomeStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_processed: Option<u64>,
    /// Failure classification; present only on Failed outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl OperationOutcome {
    /// A Success outcome.
    pub fn success(
        target: impl Into<PathBuf>,
        kind: OperationKind,
        detail: impl Into<String>,
        bytes_processed: Option<u64>,
    ) -> Self {
        Self {
            target: target.into(),
            kind,
            status: OutcomeStatus::Success,
            detail: detail.into(),
            bytes_processed,
            error: None,
        }
    }

    /// A Skipped outcome; skipping is never an error.
    pub fn skipped(
        target: impl Into<PathBuf>,
        kind: OperationKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            kind,
            status: OutcomeStatus::Skipped,
            detail: detail.into(),
            bytes_processed: None,
            error: None,
        }
    }

    /// A Failed outcome carrying the error's taxonomy bucket.
    pub fn failed(target: impl Into<PathBuf>, kind: OperationKind, err: &ShredError) -> Self {
        Self {
            target: target.into(),
            kind,
            status: OutcomeStatus::Failed,
            detail: err.to_string(),
            bytes_processed: None,
            error: Some(err.kind()),
        }
    }
}

/// Summary counters over a report's outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Aggregation of all outcomes for one invocation.
///
/// Created at invocation start, appended to during execution, finalized
/// exactly once. Records arriving after finalization are discarded.
#[derive(Debug, Default)]
pub struct OperationReport {
    outcomes: Vec<OperationOutcome>,
    summary: ReportSummary,
    exit_status: i32,
    finalized: bool,
}

/// On-disk shape of a serialized report.
#[derive(Serialize)]
struct ReportFile<'a> {
    summary: ReportSummary,
    exit_status: i32,
    outcomes: &'a [OperationOutcome],
}

impl OperationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one outcome. No-op once the report is finalized.
    pub fn record(&mut self, outcome: OperationOutcome) {
        if self.finalized {
            debug_assert!(false, "outcome recorded after finalization");
            return;
        }
        match outcome.status {
            OutcomeStatus::Success => self.summary.succeeded += 1,
            OutcomeStatus::Skipped => self.summary.skipped += 1,
            OutcomeStatus::Failed => self.summary.failed += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Seals the report and computes the overall exit status.
    ///
    /// Per-target failures count as a general error; a cancelled run gets
    /// the dedicated cancellation status regardless of what completed.
    pub fn finalize(&mut self, cancelled: bool) {
        if self.finalized {
            return;
        }
        self.exit_status = if cancelled {
            EXIT_CANCELLED
        } else if self.summary.failed > 0 {
            EXIT_GENERAL_ERROR
        } else {
            EXIT_SUCCESS
        };
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn outcomes(&self) -> &[OperationOutcome] {
        &self.outcomes
    }

    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    /// Overall process exit status; meaningful once finalized.
    pub fn exit_status(&self) -> i32 {
        self.exit_status
    }

    /// Serializes the report to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        let file = ReportFile {
            summary: self.summary,
            exit_status: self.exit_status,
            outcomes: &self.outcomes,
        };
        serde_json::to_string_pretty(&file)
            .map_err(|e| ShredError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Writes the report to `path` atomically: the file is either the
    /// complete report or untouched, never a partial write.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut temp = match parent {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new(),
        }
        .map_err(|e| ShredError::classify_io(path, e))?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|e| ShredError::classify_io(path, e.error))?;
        Ok(())
    }
}
