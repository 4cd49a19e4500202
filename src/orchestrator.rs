// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! Top-level destruction state machine.
//!
//! The orchestrator resolves an [`OperationRequest`] into an ordered
//! plan, executes it sequentially (or simulates it under dry-run), and
//! aggregates every outcome into one [`OperationReport`]. Execution
//! moves through `Planning -> Executing -> Finalizing -> Done`; the
//! terminal state is reached even when operations failed, and one
//! target's failure never halts the plan.
//!
//! Cancellation is cooperative. A [`CancelToken`] set from a signal
//! handler is checked between operations and between overwrite passes;
//! the in-flight pass completes, the affected target records a
//! Failed/"cancelled" outcome, and the report is still finalized.

use crate::config::{validate_passes, Profile};
use crate::error::{Result, ShredError};
use crate::metadata::{select_metadata_stripper, MetadataStripper};
use crate::report::{OperationKind, OperationOutcome, OperationReport};
use crate::shred::{select_overwrite_strategy, OverwriteStrategy};
use crate::sweep::SystemSweeper;
use crate::validation::{PathValidator, TargetEntry};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag, cheap to clone into a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Irrevocable for the current run.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What is done to each target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Destroy file contents only.
    ShredOnly,
    /// Strip metadata, keep the file.
    MetadataOnly,
    /// No per-target work; sweep system trace locations.
    DeepSweep,
    /// Strip metadata first, then destroy the file.
    Combined,
}

/// One invocation's worth of work. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub targets: Vec<PathBuf>,
    pub mode: Mode,
    pub passes: u32,
    pub dry_run: bool,
    /// Run the system sweep in addition to any per-target work.
    pub deep: bool,
    pub profile: Profile,
}

impl OperationRequest {
    /// Validating constructor; the only way requests enter the engine.
    pub fn new(
        targets: Vec<PathBuf>,
        mode: Mode,
        passes: u32,
        dry_run: bool,
        deep: bool,
        profile: Profile,
    ) -> Result<Self> {
        validate_passes(passes)?;
        if mode == Mode::DeepSweep && !targets.is_empty() {
            return Err(ShredError::InvalidInput(
                "deep-sweep mode takes no targets".to_string(),
            ));
        }
        if targets.is_empty() && !deep && mode != Mode::DeepSweep {
            return Err(ShredError::InvalidInput(
                "nothing to do: specify at least one target or request a deep sweep".to_string(),
            ));
        }
        Ok(Self {
            targets,
            mode,
            passes,
            dry_run,
            deep: deep || mode == Mode::DeepSweep,
            profile,
        })
    }

    pub fn sweep_requested(&self) -> bool {
        self.deep
    }
}

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Executing,
    Finalizing,
    Done,
}

/// One scheduled unit of work.
#[derive(Debug)]
enum PlannedOp {
    /// Strip metadata from a validated file.
    Strip(PathBuf),
    /// Overwrite and unlink a validated file.
    Shred(PathBuf),
    /// An outcome decided at planning time (validation failures, skips).
    Immediate(OperationOutcome),
}

/// Top-level engine: binds strategies once, then runs requests.
pub struct DestructionOrchestrator {
    strategy: Box<dyn OverwriteStrategy>,
    stripper: Box<dyn MetadataStripper>,
    validator: PathValidator,
    sweep_home: Option<PathBuf>,
    cancel: CancelToken,
    phase: Phase,
}

impl DestructionOrchestrator {
    /// Engine with strategies probed from the environment and the
    /// validator rooted at the current working directory.
    pub fn new(cancel: CancelToken) -> Result<Self> {
        Ok(Self::with_parts(
            select_overwrite_strategy(),
            select_metadata_stripper(),
            PathValidator::new()?,
            None,
            cancel,
        ))
    }

    /// Engine from explicit parts. `sweep_home` overrides the home
    /// directory the sweeper operates on.
    pub fn with_parts(
        strategy: Box<dyn OverwriteStrategy>,
        stripper: Box<dyn MetadataStripper>,
        validator: PathValidator,
        sweep_home: Option<PathBuf>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            strategy,
            stripper,
            validator,
            sweep_home,
            cancel,
            phase: Phase::Planning,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Executes one request to completion and returns the finalized
    /// report. Always reaches `Done`, even when operations failed.
    pub fn run(&mut self, request: &OperationRequest) -> OperationReport {
        let mut report = OperationReport::new();

        self.phase = Phase::Planning;
        info!(
            targets = request.targets.len(),
            mode = ?request.mode,
            passes = request.passes,
            dry_run = request.dry_run,
            deep = request.deep,
            overwrite = self.strategy.name(),
            metadata = self.stripper.name(),
            "planning destruction run"
        );
        let plan = self.plan(request);

        self.phase = Phase::Executing;
        self.execute(request, plan, &mut report);
        if request.sweep_requested() {
            self.run_sweep(request, &mut report);
        }

        self.phase = Phase::Finalizing;
        report.finalize(self.cancel.is_cancelled());
        let summary = report.summary();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            exit_status = report.exit_status(),
            "destruction run finished"
        );

        self.phase = Phase::Done;
        report
    }

    /// Expands targets through the validator into an ordered plan.
    fn plan(&self, request: &OperationRequest) -> Vec<PlannedOp> {
        // Kind attributed to work that never got past validation.
        let lead_kind = match request.mode {
            Mode::MetadataOnly => OperationKind::MetadataStrip,
            _ => OperationKind::Overwrite,
        };

        let mut plan = Vec::new();
        for raw in &request.targets {
            let resolved = match self.validator.validate(raw) {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!(target = %raw.display(), error = %err, "target rejected");
                    plan.push(PlannedOp::Immediate(OperationOutcome::failed(
                        raw, lead_kind, &err,
                    )));
                    continue;
                }
            };
            for entry in self.validator.expand(&resolved) {
                match entry {
                    TargetEntry::File(file) => match request.mode {
                        Mode::Combined => {
                            plan.push(PlannedOp::Strip(file.clone()));
                            plan.push(PlannedOp::Shred(file));
                        }
                        Mode::MetadataOnly => plan.push(PlannedOp::Strip(file)),
                        Mode::ShredOnly => plan.push(PlannedOp::Shred(file)),
                        Mode::DeepSweep => {}
                    },
                    TargetEntry::Skipped(path, reason) => {
                        plan.push(PlannedOp::Immediate(OperationOutcome::skipped(
                            path, lead_kind, reason,
                        )));
                    }
                    TargetEntry::Unreadable(path, err) => {
                        plan.push(PlannedOp::Immediate(OperationOutcome::failed(
                            &path, lead_kind, &err,
                        )));
                    }
                }
            }
        }
        debug!(operations = plan.len(), "plan built");
        plan
    }

    /// Runs the plan sequentially. After cancellation the remaining
    /// operations are recorded as Failed/"cancelled" without executing,
    /// so the report still accounts for every planned operation.
    fn execute(
        &self,
        request: &OperationRequest,
        plan: Vec<PlannedOp>,
        report: &mut OperationReport,
    ) {
        for op in plan {
            match op {
                PlannedOp::Immediate(outcome) => report.record(outcome),
                PlannedOp::Strip(path) => {
                    if self.cancel.is_cancelled() {
                        report.record(OperationOutcome::failed(
                            path,
                            OperationKind::MetadataStrip,
                            &ShredError::Cancelled,
                        ));
                        continue;
                    }
                    debug!(file = %path.display(), "stripping metadata");
                    report.record(self.stripper.strip(&path, request.dry_run));
                }
                PlannedOp::Shred(path) => {
                    if self.cancel.is_cancelled() {
                        report.record(OperationOutcome::failed(
                            path,
                            OperationKind::Overwrite,
                            &ShredError::Cancelled,
                        ));
                        continue;
                    }
                    debug!(file = %path.display(), "shredding");
                    report.record(self.strategy.shred(
                        &path,
                        request.passes,
                        request.dry_run,
                        &self.cancel,
                    ));
                }
            }
        }
    }

    fn run_sweep(&self, request: &OperationRequest, report: &mut OperationReport) {
        let config = request.profile.resolve();
        let sweeper = match &self.sweep_home {
            Some(home) => SystemSweeper::with_home(home.clone(), &*self.strategy, request.passes),
            None => match SystemSweeper::new(&*self.strategy, request.passes) {
                Ok(sweeper) => sweeper,
                Err(err) => {
                    report.record(OperationOutcome::failed(
                        PathBuf::from("~"),
                        OperationKind::SweepItem,
                        &err,
                    ));
                    return;
                }
            },
        };
        info!("sweeping system trace locations");
        for outcome in sweeper.sweep(&config, request.dry_run, &self.cancel) {
            report.record(outcome);
        }
    }
}
