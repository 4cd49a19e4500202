// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! System-wide sweep of well-known forensic trace locations.
//!
//! Deleted files leave shadows: thumbnailers keep rendered previews,
//! desktops keep recently-used lists, trash keeps full copies, shells
//! keep command history. The sweeper walks a fixed table of these
//! locations and destroys their contents through the bound overwrite
//! strategy, not a plain delete.
//!
//! Shell history is opt-in. Clearing it destroys the user's own
//! operational history, not just attacker-visible traces.

use crate::config::Config;
use crate::error::ShredError;
use crate::orchestrator::CancelToken;
use crate::report::{OperationKind, OperationOutcome, OutcomeStatus};
use crate::shred::OverwriteStrategy;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Which profile flag gates a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepFlag {
    Thumbnails,
    RecentFiles,
    Trash,
    ShellHistory,
}

impl SweepFlag {
    fn enabled(self, config: &Config) -> bool {
        match self {
            SweepFlag::Thumbnails => config.clean_thumbnails,
            SweepFlag::RecentFiles => config.clean_recent_files,
            SweepFlag::Trash => config.clean_trash,
            SweepFlag::ShellHistory => config.clean_shell_history,
        }
    }
}

/// How a location's contents are destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepStyle {
    /// Shred every regular file beneath a directory, keep the directory.
    DestroyTree,
    /// Shred a single file and unlink it.
    DestroyFile,
    /// Shred a single file, then recreate it empty. Shells expect their
    /// history file to exist.
    ClearFile,
}

struct TraceLocation {
    name: &'static str,
    relative_paths: &'static [&'static str],
    flag: SweepFlag,
    style: SweepStyle,
}

/// The fixed table of trace locations, relative to the home directory.
const TRACE_LOCATIONS: &[TraceLocation] = &[
    TraceLocation {
        name: "thumbnail cache",
        relative_paths: &[".cache/thumbnails", ".thumbnails"],
        flag: SweepFlag::Thumbnails,
        style: SweepStyle::DestroyTree,
    },
    TraceLocation {
        name: "recently-used list",
        relative_paths: &[".local/share/recently-used.xbel", ".recently-used.xbel"],
        flag: SweepFlag::RecentFiles,
        style: SweepStyle::DestroyFile,
    },
    TraceLocation {
        name: "trash",
        relative_paths: &[".local/share/Trash"],
        flag: SweepFlag::Trash,
        style: SweepStyle::DestroyTree,
    },
    TraceLocation {
        name: "shell history",
        relative_paths: &[".bash_history", ".zsh_history", ".history"],
        flag: SweepFlag::ShellHistory,
        style: SweepStyle::ClearFile,
    },
];

/// Sweeps the trace-location table through a bound overwrite strategy.
pub struct SystemSweeper<'a> {
    home: PathBuf,
    strategy: &'a dyn OverwriteStrategy,
    passes: u32,
}

impl<'a> SystemSweeper<'a> {
    /// Sweeper over the invoking user's home directory.
    pub fn new(strategy: &'a dyn OverwriteStrategy, passes: u32) -> crate::error::Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            ShredError::InvalidInput("cannot determine home directory".to_string())
        })?;
        Ok(Self::with_home(home, strategy, passes))
    }

    /// Sweeper over an explicit home root.
    pub fn with_home(home: PathBuf, strategy: &'a dyn OverwriteStrategy, passes: u32) -> Self {
        Self {
            home,
            strategy,
            passes,
        }
    }

    /// Processes every enabled location independently. A missing
    /// location is Skipped, never Failed; one location's failure does
    /// not stop the rest.
    pub fn sweep(
        &self,
        config: &Config,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> Vec<OperationOutcome> {
        let mut outcomes = Vec::new();
        for location in TRACE_LOCATIONS {
            if !location.flag.enabled(config) {
                debug!(location = location.name, "sweep disabled by profile");
                continue;
            }
            for rel in location.relative_paths {
                let path = self.home.join(rel);
                if cancel.is_cancelled() {
                    outcomes.push(OperationOutcome::failed(
                        path,
                        OperationKind::SweepItem,
                        &ShredError::Cancelled,
                    ));
                    return outcomes;
                }
                outcomes.push(self.sweep_path(location, &path, dry_run, cancel));
            }
        }
        outcomes
    }

    fn sweep_path(
        &self,
        location: &TraceLocation,
        path: &Path,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> OperationOutcome {
        if std::fs::symlink_metadata(path).is_err() {
            return OperationOutcome::skipped(path, OperationKind::SweepItem, "not present");
        }
        debug!(location = location.name, path = %path.display(), "sweeping");
        match location.style {
            SweepStyle::DestroyTree => self.destroy_tree(path, dry_run, cancel),
            SweepStyle::DestroyFile => {
                retag(self.strategy.shred(path, self.passes, dry_run, cancel))
            }
            SweepStyle::ClearFile => self.clear_file(path, dry_run, cancel),
        }
    }

    fn destroy_tree(&self, root: &Path, dry_run: bool, cancel: &CancelToken) -> OperationOutcome {
        let mut files = Vec::new();
        let mut links = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
            match entry {
                Ok(e) if e.file_type().is_symlink() => links.push(e.into_path()),
                Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
                Ok(_) => {}
                Err(err) => warn!(root = %root.display(), error = %err, "unreadable sweep entry"),
            }
        }
        if files.is_empty() && links.is_empty() {
            return OperationOutcome::skipped(root, OperationKind::SweepItem, "already empty");
        }

        if dry_run {
            let bytes: u64 = files
                .iter()
                .filter_map(|f| std::fs::metadata(f).ok())
                .map(|m| m.len())
                .sum();
            return OperationOutcome::success(
                root,
                OperationKind::SweepItem,
                format!("would destroy {} files ({} bytes)", files.len(), bytes),
                Some(bytes),
            );
        }

        let total = files.len();
        let mut destroyed = 0usize;
        let mut bytes = 0u64;
        let mut first_failure: Option<OperationOutcome> = None;
        for file in &files {
            if cancel.is_cancelled() {
                first_failure.get_or_insert_with(|| {
                    OperationOutcome::failed(file, OperationKind::SweepItem, &ShredError::Cancelled)
                });
                break;
            }
            let outcome = self.strategy.shred(file, self.passes, false, cancel);
            match outcome.status {
                OutcomeStatus::Success => {
                    destroyed += 1;
                    bytes += outcome.bytes_processed.unwrap_or(0);
                }
                _ => {
                    if first_failure.is_none() {
                        first_failure = Some(outcome);
                    }
                }
            }
        }

        // Links and emptied subdirectories are traces themselves.
        // Removing a symlink removes only the link, never its target.
        for link in &links {
            if let Err(e) = std::fs::remove_file(link) {
                warn!(link = %link.display(), error = %e, "could not remove symlink");
            }
        }
        if first_failure.is_none() {
            if let Ok(children) = std::fs::read_dir(root) {
                for child in children.flatten() {
                    if child.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                        if let Err(e) = std::fs::remove_dir_all(child.path()) {
                            warn!(dir = %child.path().display(), error = %e, "could not remove swept directory");
                        }
                    }
                }
            }
        }

        match first_failure {
            None => OperationOutcome::success(
                root,
                OperationKind::SweepItem,
                format!("destroyed {} files", destroyed),
                Some(bytes),
            ),
            Some(failure) => OperationOutcome {
                target: root.to_path_buf(),
                kind: OperationKind::SweepItem,
                status: OutcomeStatus::Failed,
                detail: format!(
                    "destroyed {} of {} files; first failure: {}",
                    destroyed, total, failure.detail
                ),
                bytes_processed: Some(bytes),
                error: failure.error,
            },
        }
    }

    fn clear_file(&self, path: &Path, dry_run: bool, cancel: &CancelToken) -> OperationOutcome {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                return OperationOutcome::failed(
                    path,
                    OperationKind::SweepItem,
                    &ShredError::classify_io(path, e),
                )
            }
        };
        if metadata.len() == 0 {
            return OperationOutcome::skipped(path, OperationKind::SweepItem, "already empty");
        }
        if dry_run {
            return OperationOutcome::success(
                path,
                OperationKind::SweepItem,
                format!("would clear {} bytes of history", metadata.len()),
                Some(metadata.len()),
            );
        }

        let permissions = metadata.permissions();
        let outcome = self.strategy.shred(path, self.passes, false, cancel);
        if outcome.status != OutcomeStatus::Success {
            return retag(outcome);
        }
        if let Err(e) = std::fs::File::create(path)
            .and_then(|_| std::fs::set_permissions(path, permissions))
        {
            return OperationOutcome::failed(
                path,
                OperationKind::SweepItem,
                &ShredError::classify_io(path, e),
            );
        }
        OperationOutcome::success(
            path,
            OperationKind::SweepItem,
            format!("cleared {} bytes of history", metadata.len()),
            Some(metadata.len()),
        )
    }
}

fn retag(mut outcome: OperationOutcome) -> OperationOutcome {
    outcome.kind = OperationKind::SweepItem;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shred::BuiltinShredder;
    use tempfile::TempDir;

    fn fake_home() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn seed_thumbnails(home: &TempDir) {
        let dir = home.path().join(".cache/thumbnails/normal");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.png"), vec![1u8; 64]).unwrap();
        std::fs::write(dir.join("b.png"), vec![2u8; 64]).unwrap();
    }

    fn sweep_with(home: &TempDir, config: &Config, dry_run: bool) -> Vec<OperationOutcome> {
        let strategy = BuiltinShredder;
        let sweeper = SystemSweeper::with_home(home.path().to_path_buf(), &strategy, 1);
        sweeper.sweep(config, dry_run, &CancelToken::new())
    }

    #[test]
    fn test_missing_locations_are_skipped() {
        let home = fake_home();
        let outcomes = sweep_with(&home, &Config::default(), false);
        assert!(!outcomes.is_empty());
        assert!(outcomes
            .iter()
            .all(|o| o.status == OutcomeStatus::Skipped));
    }

    #[test]
    fn test_thumbnails_destroyed_and_root_kept() {
        let home = fake_home();
        seed_thumbnails(&home);

        let outcomes = sweep_with(&home, &Config::default(), false);
        let thumb = outcomes
            .iter()
            .find(|o| o.target.ends_with(".cache/thumbnails"))
            .unwrap();
        assert_eq!(thumb.status, OutcomeStatus::Success);
        assert!(thumb.detail.contains("destroyed 2 files"));
        assert!(home.path().join(".cache/thumbnails").exists());
        assert!(!home.path().join(".cache/thumbnails/normal").exists());
    }

    #[test]
    fn test_sweep_twice_is_idempotent() {
        let home = fake_home();
        seed_thumbnails(&home);

        let first = sweep_with(&home, &Config::default(), false);
        assert!(first
            .iter()
            .any(|o| o.status == OutcomeStatus::Success));

        let second = sweep_with(&home, &Config::default(), false);
        assert!(
            second.iter().all(|o| o.status == OutcomeStatus::Skipped),
            "second sweep must only skip, got {:?}",
            second
        );
    }

    #[test]
    fn test_shell_history_disabled_by_default() {
        let home = fake_home();
        std::fs::write(home.path().join(".bash_history"), b"secret command\n").unwrap();

        let outcomes = sweep_with(&home, &Config::default(), false);
        assert!(outcomes
            .iter()
            .all(|o| !o.target.ends_with(".bash_history")));
        assert_eq!(
            std::fs::read(home.path().join(".bash_history")).unwrap(),
            b"secret command\n"
        );
    }

    #[test]
    fn test_shell_history_cleared_when_opted_in() {
        let home = fake_home();
        let history = home.path().join(".bash_history");
        std::fs::write(&history, b"secret command\n").unwrap();

        let config = Config {
            clean_shell_history: true,
            ..Default::default()
        };
        let outcomes = sweep_with(&home, &config, false);
        let cleared = outcomes
            .iter()
            .find(|o| o.target.ends_with(".bash_history"))
            .unwrap();
        assert_eq!(cleared.status, OutcomeStatus::Success);
        assert!(history.exists());
        assert_eq!(std::fs::metadata(&history).unwrap().len(), 0);
    }

    #[test]
    fn test_recently_used_list_is_unlinked() {
        let home = fake_home();
        let recent = home.path().join(".local/share/recently-used.xbel");
        std::fs::create_dir_all(recent.parent().unwrap()).unwrap();
        std::fs::write(&recent, b"<xbel/>").unwrap();

        let outcomes = sweep_with(&home, &Config::default(), false);
        let entry = outcomes
            .iter()
            .find(|o| o.target.ends_with("recently-used.xbel"))
            .unwrap();
        assert_eq!(entry.status, OutcomeStatus::Success);
        assert_eq!(entry.kind, OperationKind::SweepItem);
        assert!(!recent.exists());
    }

    #[test]
    fn test_dry_run_reports_and_preserves() {
        let home = fake_home();
        seed_thumbnails(&home);

        let outcomes = sweep_with(&home, &Config::default(), true);
        let thumb = outcomes
            .iter()
            .find(|o| o.target.ends_with(".cache/thumbnails"))
            .unwrap();
        assert_eq!(thumb.status, OutcomeStatus::Success);
        assert!(thumb.detail.contains("would destroy 2 files"));
        assert!(home
            .path()
            .join(".cache/thumbnails/normal/a.png")
            .exists());
    }

    #[test]
    fn test_cancelled_sweep_stops_early() {
        let home = fake_home();
        seed_thumbnails(&home);

        let strategy = BuiltinShredder;
        let sweeper = SystemSweeper::with_home(home.path().to_path_buf(), &strategy, 1);
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcomes = sweeper.sweep(&Config::default(), false, &cancel);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(outcomes[0].detail, "cancelled");
    }
}
