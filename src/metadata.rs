// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 TrackShred Contributors
//! Metadata stripping for anti-forensics protection.
//!
//! Embedded metadata leaks information even after content is destroyed
//! elsewhere: EXIF blocks carry camera serials and GPS fixes, PNG text
//! chunks carry author names, filesystem timestamps reveal when a
//! document was last touched.
//!
//! Two implementations sit behind [`MetadataStripper`]: a binding to
//! `exiftool` when one is installed, and a builtin fallback that
//! rewrites container formats where dropping metadata segments is
//! tractable (JPEG APPn/COM segments, PNG ancillary text and time
//! chunks) and, for every regular file, zeroes filesystem timestamps
//! and removes extended attributes. Files with no safe stripping method
//! are Skipped, never Failed.

use crate::error::{Result, ShredError};
use crate::report::{OperationKind, OperationOutcome};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};
use zeroize::Zeroizing;

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// A bound strategy for removing a file's identifying metadata.
pub trait MetadataStripper {
    /// Removes what metadata can safely be removed from `file`. Under
    /// `dry_run`, reports what would be removed without touching it.
    fn strip(&self, file: &Path, dry_run: bool) -> OperationOutcome;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// Probes tool availability once and binds the preferred implementation.
pub fn select_metadata_stripper() -> Box<dyn MetadataStripper> {
    match crate::shred::find_in_path("exiftool") {
        Some(program) => {
            debug!(program = %program.display(), "binding external exiftool");
            Box::new(ExifToolStripper::new(program))
        }
        None => {
            debug!("no exiftool, binding builtin metadata stripper");
            Box::new(BuiltinStripper)
        }
    }
}

/// Container formats the builtin stripper can rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Jpeg,
    Png,
}

fn sniff(data: &[u8]) -> Option<Container> {
    if data.len() >= 8 && data[0..8] == PNG_MAGIC {
        Some(Container::Png)
    } else if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
        Some(Container::Jpeg)
    } else {
        None
    }
}

/// Rebuilds a JPEG without APP1..APP15 and COM segments.
///
/// APP0 (JFIF) stays: decoders expect it and it carries no identifying
/// data. Everything from the SOS marker on is copied verbatim. Returns
/// the clean bytes and the number of dropped segments, or `None` when
/// the stream does not parse as JPEG.
fn strip_jpeg(data: &[u8]) -> Option<(Vec<u8>, usize)> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }
    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[0..2]);
    let mut dropped = 0;
    let mut i = 2;
    while i + 2 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        match marker {
            // EOI or SOS: the rest is entropy-coded data, keep as-is.
            0xD9 | 0xDA => {
                out.extend_from_slice(&data[i..]);
                return Some((out, dropped));
            }
            // Standalone markers without a length field.
            0x01 | 0xD0..=0xD7 => {
                out.extend_from_slice(&data[i..i + 2]);
                i += 2;
            }
            _ => {
                if i + 4 > data.len() {
                    return None;
                }
                let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
                if len < 2 || i + 2 + len > data.len() {
                    return None;
                }
                if matches!(marker, 0xE1..=0xEF | 0xFE) {
                    dropped += 1;
                } else {
                    out.extend_from_slice(&data[i..i + 2 + len]);
                }
                i += 2 + len;
            }
        }
    }
    None
}

/// Rebuilds a PNG without tEXt/zTXt/iTXt/tIME/eXIf chunks.
fn strip_png(data: &[u8]) -> Option<(Vec<u8>, usize)> {
    if data.len() < 8 || data[0..8] != PNG_MAGIC {
        return None;
    }
    let mut out = data[0..8].to_vec();
    let mut dropped = 0;
    let mut i = 8;
    while i + 8 <= data.len() {
        let len = u32::from_be_bytes(data[i..i + 4].try_into().ok()?) as usize;
        let ctype: [u8; 4] = data[i + 4..i + 8].try_into().ok()?;
        let total = len.checked_add(12)?;
        if i + total > data.len() {
            return None;
        }
        if matches!(&ctype, b"tEXt" | b"zTXt" | b"iTXt" | b"tIME" | b"eXIf") {
            dropped += 1;
        } else {
            out.extend_from_slice(&data[i..i + total]);
        }
        if &ctype == b"IEND" {
            return Some((out, dropped));
        }
        i += total;
    }
    None
}

/// Atomically replaces `path` with `clean`, keeping its permissions.
fn rewrite_atomic(path: &Path, clean: &[u8], permissions: std::fs::Permissions) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| ShredError::classify_io(path, e))?;
    temp.write_all(clean)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|e| ShredError::classify_io(path, e.error))?;
    std::fs::set_permissions(path, permissions).map_err(|e| ShredError::classify_io(path, e))?;
    Ok(())
}

/// Sets atime and mtime to the Unix epoch.
fn clear_timestamps(path: &Path) -> std::io::Result<()> {
    let file = std::fs::OpenOptions::new().write(true).open(path)?;
    let epoch = std::time::SystemTime::UNIX_EPOCH;
    file.set_times(
        std::fs::FileTimes::new()
            .set_accessed(epoch)
            .set_modified(epoch),
    )
}

/// Lists extended attribute names, empty on filesystems without support.
#[cfg(target_os = "linux")]
fn list_xattrs(path: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    use std::os::unix::ffi::OsStrExt;

    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let len = unsafe { libc::listxattr(cpath.as_ptr(), std::ptr::null_mut(), 0) };
    if len < 0 {
        let err = std::io::Error::last_os_error();
        return if err.raw_os_error() == Some(libc::EOPNOTSUPP) {
            Ok(Vec::new())
        } else {
            Err(err)
        };
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    let mut names = vec![0u8; len as usize];
    let len = unsafe { libc::listxattr(cpath.as_ptr(), names.as_mut_ptr().cast(), names.len()) };
    if len < 0 {
        return Err(std::io::Error::last_os_error());
    }
    names.truncate(len as usize);
    Ok(names
        .split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(<[u8]>::to_vec)
        .collect())
}

#[cfg(not(target_os = "linux"))]
fn list_xattrs(_path: &Path) -> std::io::Result<Vec<Vec<u8>>> {
    Ok(Vec::new())
}

#[cfg(target_os = "linux")]
fn clear_xattrs(path: &Path) -> std::io::Result<usize> {
    use std::os::unix::ffi::OsStrExt;

    let names = list_xattrs(path)?;
    if names.is_empty() {
        return Ok(0);
    }
    let cpath = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains NUL"))?;
    let mut removed = 0;
    for name in names {
        let Ok(cname) = std::ffi::CString::new(name) else {
            continue;
        };
        if unsafe { libc::removexattr(cpath.as_ptr(), cname.as_ptr()) } == 0 {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(not(target_os = "linux"))]
fn clear_xattrs(_path: &Path) -> std::io::Result<usize> {
    Ok(0)
}

/// Builtin fallback used when no external tool is bound.
pub struct BuiltinStripper;

impl BuiltinStripper {
    fn strip_file(path: &Path) -> Result<String> {
        let metadata =
            std::fs::symlink_metadata(path).map_err(|e| ShredError::classify_io(path, e))?;
        if !metadata.is_file() {
            return Err(ShredError::Unsupported(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        // File contents about to be destroyed are sensitive; do not let
        // the copy linger after the rewrite.
        let data =
            Zeroizing::new(std::fs::read(path).map_err(|e| ShredError::classify_io(path, e))?);
        let dropped = match sniff(&data) {
            Some(Container::Jpeg) => {
                let (clean, n) = strip_jpeg(&data).ok_or_else(|| {
                    ShredError::Unsupported(format!("{}: malformed JPEG container", path.display()))
                })?;
                if n > 0 {
                    rewrite_atomic(path, &clean, metadata.permissions())?;
                }
                n
            }
            Some(Container::Png) => {
                let (clean, n) = strip_png(&data).ok_or_else(|| {
                    ShredError::Unsupported(format!("{}: malformed PNG container", path.display()))
                })?;
                if n > 0 {
                    rewrite_atomic(path, &clean, metadata.permissions())?;
                }
                n
            }
            None => 0,
        };

        let attrs = clear_xattrs(path).map_err(|e| ShredError::classify_io(path, e))?;
        clear_timestamps(path).map_err(|e| ShredError::classify_io(path, e))?;

        Ok(if dropped > 0 {
            format!(
                "removed {} embedded metadata segments, cleared timestamps and {} extended attributes",
                dropped, attrs
            )
        } else {
            format!(
                "cleared timestamps and {} extended attributes",
                attrs
            )
        })
    }

    fn dry_run_detail(path: &Path) -> Result<String> {
        let metadata =
            std::fs::symlink_metadata(path).map_err(|e| ShredError::classify_io(path, e))?;
        if !metadata.is_file() {
            return Err(ShredError::Unsupported(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let data =
            Zeroizing::new(std::fs::read(path).map_err(|e| ShredError::classify_io(path, e))?);
        let segments = match sniff(&data) {
            Some(Container::Jpeg) => {
                strip_jpeg(&data)
                    .ok_or_else(|| {
                        ShredError::Unsupported(format!(
                            "{}: malformed JPEG container",
                            path.display()
                        ))
                    })?
                    .1
            }
            Some(Container::Png) => {
                strip_png(&data)
                    .ok_or_else(|| {
                        ShredError::Unsupported(format!(
                            "{}: malformed PNG container",
                            path.display()
                        ))
                    })?
                    .1
            }
            None => 0,
        };
        let attrs = list_xattrs(path)
            .map_err(|e| ShredError::classify_io(path, e))?
            .len();
        Ok(format!(
            "would remove {} embedded metadata segments, clear timestamps and {} extended attributes",
            segments, attrs
        ))
    }
}

impl MetadataStripper for BuiltinStripper {
    fn strip(&self, file: &Path, dry_run: bool) -> OperationOutcome {
        let result = if dry_run {
            Self::dry_run_detail(file)
        } else {
            Self::strip_file(file)
        };
        match result {
            Ok(detail) => {
                OperationOutcome::success(file, OperationKind::MetadataStrip, detail, None)
            }
            Err(ShredError::Unsupported(msg)) => {
                OperationOutcome::skipped(file, OperationKind::MetadataStrip, msg)
            }
            Err(err) => OperationOutcome::failed(file, OperationKind::MetadataStrip, &err),
        }
    }

    fn name(&self) -> &'static str {
        "builtin"
    }
}

/// Binding to `exiftool -all= -overwrite_original`.
pub struct ExifToolStripper {
    program: PathBuf,
}

impl ExifToolStripper {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

impl MetadataStripper for ExifToolStripper {
    fn strip(&self, file: &Path, dry_run: bool) -> OperationOutcome {
        if dry_run {
            return match std::fs::metadata(file) {
                Ok(_) => OperationOutcome::success(
                    file,
                    OperationKind::MetadataStrip,
                    "would invoke exiftool to remove all writable metadata tags",
                    None,
                ),
                Err(e) => OperationOutcome::failed(
                    file,
                    OperationKind::MetadataStrip,
                    &ShredError::classify_io(file, e),
                ),
            };
        }

        let output = Command::new(&self.program)
            .arg("-all=")
            .arg("-overwrite_original")
            .arg(file)
            .output();
        match output {
            Ok(out) if out.status.success() => OperationOutcome::success(
                file,
                OperationKind::MetadataStrip,
                "removed embedded metadata tags (external)",
                None,
            ),
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let message = stderr.trim();
                if message.contains("Unknown file type")
                    || message.contains("file format error")
                {
                    OperationOutcome::skipped(
                        file,
                        OperationKind::MetadataStrip,
                        format!("file type not supported by external tool: {}", message),
                    )
                } else {
                    warn!(file = %file.display(), stderr = message, "exiftool failed");
                    let err = ShredError::Io(std::io::Error::other(format!(
                        "exiftool exited with {}: {}",
                        out.status, message
                    )));
                    OperationOutcome::failed(file, OperationKind::MetadataStrip, &err)
                }
            }
            Err(e) => OperationOutcome::failed(
                file,
                OperationKind::MetadataStrip,
                &ShredError::classify_io(&self.program, e),
            ),
        }
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::OutcomeStatus;

    /// SOI + APP0 (kept) + APP1 Exif (dropped) + COM (dropped) + SOS.
    fn sample_jpeg() -> Vec<u8> {
        let mut v = vec![0xFF, 0xD8];
        v.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, b'J', b'F']);
        v.extend_from_slice(&[0xFF, 0xE1, 0x00, 0x06, b'E', b'x', b'i', b'f']);
        v.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x04, b'h', b'i']);
        v.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x04, 0x01, 0x00]);
        v.extend_from_slice(&[0x12, 0x34, 0x56]);
        v.extend_from_slice(&[0xFF, 0xD9]);
        v
    }

    fn png_chunk(ctype: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut v = (data.len() as u32).to_be_bytes().to_vec();
        v.extend_from_slice(ctype);
        v.extend_from_slice(data);
        v.extend_from_slice(&[0, 0, 0, 0]);
        v
    }

    fn sample_png() -> Vec<u8> {
        let mut v = PNG_MAGIC.to_vec();
        v.extend(png_chunk(b"IHDR", &[0; 13]));
        v.extend(png_chunk(b"tEXt", b"Author\0me"));
        v.extend(png_chunk(b"IDAT", &[1, 2, 3]));
        v.extend(png_chunk(b"IEND", &[]));
        v
    }

    #[test]
    fn test_strip_jpeg_drops_metadata_segments() {
        let (clean, dropped) = strip_jpeg(&sample_jpeg()).unwrap();
        assert_eq!(dropped, 2);
        // SOI and APP0 survive, the entropy tail is verbatim.
        assert_eq!(&clean[0..2], &[0xFF, 0xD8]);
        assert_eq!(&clean[2..4], &[0xFF, 0xE0]);
        assert_eq!(&clean[clean.len() - 2..], &[0xFF, 0xD9]);
        assert!(clean.len() < sample_jpeg().len());
    }

    #[test]
    fn test_strip_jpeg_rejects_truncated_stream() {
        let mut broken = sample_jpeg();
        broken.truncate(6);
        assert!(strip_jpeg(&broken).is_none());
        assert!(strip_jpeg(&[0x00, 0x01]).is_none());
    }

    #[test]
    fn test_strip_png_drops_text_chunks() {
        let (clean, dropped) = strip_png(&sample_png()).unwrap();
        assert_eq!(dropped, 1);
        let as_str = String::from_utf8_lossy(&clean);
        assert!(!as_str.contains("Author"));
        assert!(clean.windows(4).any(|w| w == b"IDAT"));
        assert!(clean.windows(4).any(|w| w == b"IEND"));
    }

    #[test]
    fn test_strip_png_rejects_truncated_chunk() {
        let mut broken = sample_png();
        broken.truncate(20);
        assert!(strip_png(&broken).is_none());
    }

    #[test]
    fn test_builtin_strip_rewrites_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, sample_jpeg()).unwrap();

        let outcome = BuiltinStripper.strip(&path, false);
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(outcome.detail.contains("removed 2 embedded metadata segments"));

        let rewritten = std::fs::read(&path).unwrap();
        assert!(strip_jpeg(&rewritten).is_some());
        assert!(rewritten.len() < sample_jpeg().len());

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(modified, std::time::SystemTime::UNIX_EPOCH);
    }

    #[test]
    fn test_builtin_strip_plain_file_clears_timestamps_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text").unwrap();

        let outcome = BuiltinStripper.strip(&path, false);
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(outcome.detail.contains("cleared timestamps"));
        assert_eq!(std::fs::read(&path).unwrap(), b"plain text");
    }

    #[test]
    fn test_builtin_strip_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = BuiltinStripper.strip(dir.path(), false);
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
    }

    #[test]
    fn test_dry_run_reports_without_modifying() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, sample_jpeg()).unwrap();

        let outcome = BuiltinStripper.strip(&path, true);
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert!(outcome.detail.contains("would remove 2 embedded metadata segments"));
        assert_eq!(std::fs::read(&path).unwrap(), sample_jpeg());
    }

    #[test]
    fn test_sniff_formats() {
        assert_eq!(sniff(&sample_jpeg()), Some(Container::Jpeg));
        assert_eq!(sniff(&sample_png()), Some(Container::Png));
        assert_eq!(sniff(b"plain text"), None);
        assert_eq!(sniff(b""), None);
    }
}
