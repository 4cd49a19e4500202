// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! Target path validation and expansion.
//!
//! Every target passes through here before any destructive operation is
//! scheduled. Validation is a pure check: it rejects paths that escape
//! the invocation's working tree, paths that resolve into protected
//! system locations after symlinks are followed, and paths the invoking
//! user cannot read and write. A validation failure is never fatal to
//! the run; the orchestrator records it and moves on.
//!
//! Relative targets must resolve inside the working directory the tool
//! was invoked from. Absolute targets may point anywhere that is not
//! protected. This is what makes `../../etc/passwd`, and a relative
//! symlink pointing out of the tree, invalid input before any write
//! occurs.

use crate::error::{Result, ShredError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// System roots that may never be targeted, contain a target, or be
/// contained by one.
pub const PROTECTED_ROOTS: &[&str] = &[
    "/", "/bin", "/boot", "/dev", "/etc", "/lib", "/proc", "/run", "/sbin", "/sys", "/usr", "/var",
];

/// A target that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical path, symlinks resolved.
    pub path: PathBuf,
    pub is_dir: bool,
}

/// One entry produced by expanding a resolved target.
#[derive(Debug)]
pub enum TargetEntry {
    /// A regular file to operate on.
    File(PathBuf),
    /// An entry that is deliberately not destroyed, with the reason.
    Skipped(PathBuf, &'static str),
    /// An entry the walk could not read.
    Unreadable(PathBuf, ShredError),
}

/// Validates raw target paths against the invocation's working tree.
#[derive(Debug, Clone)]
pub struct PathValidator {
    work_root: PathBuf,
}

impl PathValidator {
    /// Validator rooted at the current working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self::with_root(cwd))
    }

    /// Validator rooted at an explicit directory.
    pub fn with_root(work_root: PathBuf) -> Self {
        Self { work_root }
    }

    /// Checks one raw target. Pure: no side effects on the filesystem.
    pub fn validate(&self, raw: &Path) -> Result<ResolvedPath> {
        if raw.as_os_str().is_empty() {
            return Err(ShredError::InvalidInput("empty target path".to_string()));
        }

        let absolute = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.work_root.join(raw)
        };
        let canonical =
            std::fs::canonicalize(&absolute).map_err(|e| ShredError::classify_io(raw, e))?;

        if raw.is_relative() {
            let work_canon = std::fs::canonicalize(&self.work_root)
                .map_err(|e| ShredError::classify_io(&self.work_root, e))?;
            if !canonical.starts_with(&work_canon) {
                return Err(ShredError::InvalidInput(format!(
                    "{} resolves to {} outside the working tree",
                    raw.display(),
                    canonical.display()
                )));
            }
        }

        if let Some(root) = protected_root_conflict(&canonical) {
            return Err(ShredError::InvalidInput(format!(
                "{} overlaps protected system path {}",
                canonical.display(),
                root
            )));
        }

        let metadata =
            std::fs::metadata(&canonical).map_err(|e| ShredError::classify_io(&canonical, e))?;
        check_access(&canonical, metadata.is_dir())?;

        Ok(ResolvedPath {
            path: canonical,
            is_dir: metadata.is_dir(),
        })
    }

    /// Expands a resolved target into the regular files beneath it.
    ///
    /// Symlinks are never followed into destruction: a symlink found
    /// inside a directory comes back as Skipped so data outside the
    /// intended tree is never touched through it.
    pub fn expand(&self, resolved: &ResolvedPath) -> Vec<TargetEntry> {
        if !resolved.is_dir {
            return vec![TargetEntry::File(resolved.path.clone())];
        }

        let mut entries = Vec::new();
        for item in WalkDir::new(&resolved.path).follow_links(false).min_depth(1) {
            match item {
                Ok(entry) => {
                    let file_type = entry.file_type();
                    if file_type.is_symlink() {
                        entries.push(TargetEntry::Skipped(
                            entry.into_path(),
                            "symlink not followed",
                        ));
                    } else if file_type.is_file() {
                        entries.push(TargetEntry::File(entry.into_path()));
                    } else if !file_type.is_dir() {
                        entries.push(TargetEntry::Skipped(
                            entry.into_path(),
                            "not a regular file",
                        ));
                    }
                }
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| resolved.path.clone());
                    let shred_err = match err.into_io_error() {
                        Some(io) => ShredError::classify_io(&path, io),
                        None => ShredError::InvalidInput("filesystem loop detected".to_string()),
                    };
                    entries.push(TargetEntry::Unreadable(path, shred_err));
                }
            }
        }
        entries
    }
}

/// Returns the protected root a canonical path conflicts with, if any.
///
/// A path conflicts when it is a protected root, lies inside one, or is
/// an ancestor of one.
fn protected_root_conflict(canonical: &Path) -> Option<&'static str> {
    for root in PROTECTED_ROOTS {
        let root_path = Path::new(root);
        if canonical == root_path {
            return Some(root);
        }
        if *root != "/" && canonical.starts_with(root_path) {
            return Some(root);
        }
        if root_path.starts_with(canonical) {
            return Some(root);
        }
    }
    None
}

/// Verifies the invoking user can read and write the path.
#[cfg(unix)]
fn check_access(path: &Path, is_dir: bool) -> Result<()> {
    use std::os::unix::ffi::OsStrExt;

    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| ShredError::InvalidInput(format!("{} contains NUL", path.display())))?;
    let mut mode = libc::R_OK | libc::W_OK;
    if is_dir {
        mode |= libc::X_OK;
    }
    if unsafe { libc::access(cpath.as_ptr(), mode) } != 0 {
        return Err(ShredError::classify_io(
            path,
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_access(_path: &Path, _is_dir: bool) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn validator(dir: &TempDir) -> PathValidator {
        PathValidator::with_root(dir.path().to_path_buf())
    }

    #[test]
    fn test_valid_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.txt");
        std::fs::write(&file, b"secret").unwrap();

        let resolved = validator(&dir).validate(&file).unwrap();
        assert!(!resolved.is_dir);
        assert!(resolved.path.ends_with("doc.txt"));
    }

    #[test]
    fn test_missing_target_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = validator(&dir)
            .validate(&dir.path().join("absent"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_traversal_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validator(&dir)
            .validate(Path::new("../../etc/passwd"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escaping_tree_rejected() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("outside.txt");
        std::fs::write(&secret, b"keep me").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&secret, &link).unwrap();

        // Relative form of the link, as a user inside the tree would type it.
        let err = validator(&dir).validate(Path::new("link.txt")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(secret.exists());
    }

    #[test]
    fn test_protected_roots_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let v = validator(&dir);
        for target in ["/", "/etc", "/etc/passwd", "/proc/self", "/sys", "/usr/bin"] {
            let err = v.validate(Path::new(target)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "target {}", target);
        }
    }

    #[test]
    fn test_protected_conflict_logic() {
        assert!(protected_root_conflict(Path::new("/")).is_some());
        assert!(protected_root_conflict(Path::new("/etc/ssh")).is_some());
        assert!(protected_root_conflict(Path::new("/usr")).is_some());
        assert!(protected_root_conflict(Path::new("/home/user/file")).is_none());
        assert!(protected_root_conflict(Path::new("/tmp/scratch")).is_none());
    }

    #[test]
    fn test_expand_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.bin");
        std::fs::write(&file, b"x").unwrap();

        let v = validator(&dir);
        let resolved = v.validate(&file).unwrap();
        let entries = v.expand(&resolved);
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0], TargetEntry::File(_)));
    }

    #[test]
    fn test_expand_directory_recurses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();

        let v = validator(&dir);
        let resolved = v.validate(dir.path()).unwrap();
        let files: Vec<_> = v
            .expand(&resolved)
            .into_iter()
            .filter(|e| matches!(e, TargetEntry::File(_)))
            .collect();
        assert_eq!(files.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_expand_skips_symlinks_inside_directory() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("precious.txt");
        std::fs::write(&secret, b"keep me").unwrap();

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("victim.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(&secret, dir.path().join("sneaky")).unwrap();

        let v = validator(&dir);
        let resolved = v.validate(dir.path()).unwrap();
        let entries = v.expand(&resolved);

        let files = entries
            .iter()
            .filter(|e| matches!(e, TargetEntry::File(_)))
            .count();
        let skipped = entries
            .iter()
            .filter(|e| matches!(e, TargetEntry::Skipped(_, _)))
            .count();
        assert_eq!(files, 1);
        assert_eq!(skipped, 1);
        assert!(secret.exists());
    }
}
