// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! Multi-pass overwrite strategies.
//!
//! Two interchangeable implementations sit behind [`OverwriteStrategy`]:
//! a binding to the GNU `shred` binary when one is installed, and a
//! self-contained overwrite loop. Availability is probed once at startup
//! by [`select_overwrite_strategy`]; the hot path never branches on tool
//! presence.
//!
//! Each pass writes the file's full length with bytes drawn from the
//! operating system CSPRNG and is flushed to durable storage before the
//! next pass begins. After the final pass the file is unlinked.
//!
//! # Media Limitations
//!
//! Multi-pass overwrite is **ineffective on SSDs** and copy-on-write
//! filesystems: wear leveling writes new physical blocks instead of
//! overwriting the old ones, so prior content can persist in unmapped
//! blocks and over-provisioned space. On such media the passes provide
//! defense in depth only. Hardware Secure Erase or full-disk encryption
//! from day one are the reliable options there.

use crate::error::{Result, ShredError};
use crate::orchestrator::CancelToken;
use crate::report::{OperationKind, OperationOutcome};
use rand::rngs::OsRng;
use rand_core::TryRngCore;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Buffer size for one overwrite write call.
pub const OVERWRITE_CHUNK_SIZE: usize = 64 * 1024;

/// A bound strategy for destroying one file's content.
pub trait OverwriteStrategy {
    /// Overwrites `file` with `passes` full-length sweeps of random
    /// bytes, then unlinks it. Under `dry_run` nothing is written or
    /// unlinked. Cancellation is honored between passes, never mid-write.
    fn shred(&self, file: &Path, passes: u32, dry_run: bool, cancel: &CancelToken)
        -> OperationOutcome;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Probes tool availability once and binds the preferred implementation.
pub fn select_overwrite_strategy() -> Box<dyn OverwriteStrategy> {
    match find_in_path("shred") {
        Some(program) => {
            debug!(program = %program.display(), "binding external shred binary");
            Box::new(ExternalShredder::new(program))
        }
        None => {
            debug!("no external shred binary, binding builtin overwrite loop");
            Box::new(BuiltinShredder)
        }
    }
}

/// Locates an executable on `PATH`, like `which`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    find_in_dirs(name, std::env::split_paths(&path))
}

fn find_in_dirs(name: &str, dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    dirs.into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Outcome for a dry-run shred: full validation, zero writes.
fn dry_run_outcome(file: &Path, passes: u32) -> OperationOutcome {
    match std::fs::metadata(file) {
        Ok(metadata) => OperationOutcome::success(
            file,
            OperationKind::Overwrite,
            format!("would overwrite {} bytes, {} passes", metadata.len(), passes),
            Some(metadata.len()),
        ),
        Err(e) => OperationOutcome::failed(
            file,
            OperationKind::Overwrite,
            &ShredError::classify_io(file, e),
        ),
    }
}

/// Runs `passes` full-length overwrite sweeps against an open backing
/// store, re-checking the expected size before each pass and making each
/// pass durable before the next one begins.
///
/// `stat_size` is consulted before every pass; a value different from
/// `size` means the file shrank or grew mid-operation and the shred
/// fails rather than trusting a stale length. A pass that writes fewer
/// bytes than `size` is a failure, never silently ignored.
///
/// Generic over the destination so the sweep count is observable against
/// any `Write + Seek` store. Returns total bytes written across passes.
pub fn overwrite_passes<W, S, F>(
    dest: &mut W,
    size: u64,
    passes: u32,
    cancel: &CancelToken,
    mut stat_size: S,
    mut sync: F,
) -> Result<u64>
where
    W: Write + Seek,
    S: FnMut() -> Result<u64>,
    F: FnMut(&mut W) -> std::io::Result<()>,
{
    let mut buf = vec![0u8; OVERWRITE_CHUNK_SIZE];
    let mut total = 0u64;
    for pass in 1..=passes {
        if cancel.is_cancelled() {
            return Err(ShredError::Cancelled);
        }
        let current = stat_size()?;
        if current != size {
            return Err(ShredError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("file size changed during shredding: {} -> {}", size, current),
            )));
        }
        dest.seek(SeekFrom::Start(0))?;

        let mut written = 0u64;
        let mut remaining = size;
        while remaining > 0 {
            let n = remaining.min(OVERWRITE_CHUNK_SIZE as u64) as usize;
            OsRng
                .try_fill_bytes(&mut buf[..n])
                .map_err(|e| ShredError::Io(std::io::Error::other(format!("RNG error: {}", e))))?;
            dest.write_all(&buf[..n])?;
            written += n as u64;
            remaining -= n as u64;
        }
        if written != size {
            return Err(ShredError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: pass {} wrote {} of {} bytes", pass, written, size),
            )));
        }
        sync(dest)?;
        total += written;
        debug!(pass, passes, bytes = written, "overwrite pass durable");
    }
    Ok(total)
}

/// Self-implemented overwrite loop used when no external tool is bound.
pub struct BuiltinShredder;

impl BuiltinShredder {
    fn overwrite_and_unlink(path: &Path, passes: u32, cancel: &CancelToken) -> Result<u64> {
        let metadata = std::fs::metadata(path).map_err(|e| ShredError::classify_io(path, e))?;
        if !metadata.is_file() {
            return Err(ShredError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let size = metadata.len();

        if size > 0 {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| ShredError::classify_io(path, e))?;
            lock_exclusive(&file).map_err(|e| ShredError::classify_io(path, e))?;

            let stat_path = path.to_path_buf();
            overwrite_passes(
                &mut file,
                size,
                passes,
                cancel,
                || {
                    std::fs::metadata(&stat_path)
                        .map(|m| m.len())
                        .map_err(|e| ShredError::classify_io(&stat_path, e))
                },
                |f| {
                    f.flush()?;
                    f.sync_all()
                },
            )?;
        }

        std::fs::remove_file(path).map_err(|e| ShredError::classify_io(path, e))?;
        Ok(size)
    }
}

impl OverwriteStrategy for BuiltinShredder {
    fn shred(
        &self,
        file: &Path,
        passes: u32,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> OperationOutcome {
        if dry_run {
            return dry_run_outcome(file, passes);
        }
        match Self::overwrite_and_unlink(file, passes, cancel) {
            Ok(bytes) => OperationOutcome::success(
                file,
                OperationKind::Overwrite,
                format!("overwrote {} bytes in {} passes", bytes, passes),
                Some(bytes),
            ),
            Err(err) => OperationOutcome::failed(file, OperationKind::Overwrite, &err),
        }
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}

/// Binding to the GNU `shred` binary.
///
/// `shred` performs its own pass loop and final unlink; cancellation is
/// checked before handing the file over, not during the external run.
pub struct ExternalShredder {
    program: PathBuf,
}

impl ExternalShredder {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl OverwriteStrategy for ExternalShredder {
    fn shred(
        &self,
        file: &Path,
        passes: u32,
        dry_run: bool,
        cancel: &CancelToken,
    ) -> OperationOutcome {
        if dry_run {
            return dry_run_outcome(file, passes);
        }
        if cancel.is_cancelled() {
            return OperationOutcome::failed(file, OperationKind::Overwrite, &ShredError::Cancelled);
        }
        let size = match std::fs::metadata(file) {
            Ok(m) => m.len(),
            Err(e) => {
                return OperationOutcome::failed(
                    file,
                    OperationKind::Overwrite,
                    &ShredError::classify_io(file, e),
                )
            }
        };

        let output = Command::new(&self.program)
            .arg("-f")
            .arg("-z")
            .arg(format!("-n{}", passes))
            .arg("--remove=unlink")
            .arg(file)
            .output();
        match output {
            Ok(out) if out.status.success() => OperationOutcome::success(
                file,
                OperationKind::Overwrite,
                format!("overwrote {} bytes in {} passes (external)", size, passes),
                Some(size),
            ),
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let message = stderr.trim();
                warn!(file = %file.display(), stderr = message, "external shred failed");
                let err = if message.contains("Permission denied") {
                    ShredError::Permission(format!("{}: {}", file.display(), message))
                } else {
                    ShredError::Io(std::io::Error::other(format!(
                        "external shred exited with {}: {}",
                        out.status, message
                    )))
                };
                OperationOutcome::failed(file, OperationKind::Overwrite, &err)
            }
            Err(e) => OperationOutcome::failed(
                file,
                OperationKind::Overwrite,
                &ShredError::classify_io(&self.program, e),
            ),
        }
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}
