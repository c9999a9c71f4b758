use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};

use crate::fs_utils::move_path;
use crate::layout::normalize_path;

pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// `<path>.<YYYYMMDDHHMMSS>` for the local clock, or `<path>.<stamp>-<n>` with
/// the smallest `n` that is free. Never names a path that currently exists.
pub fn next_backup_path(path: &Path) -> PathBuf {
    next_backup_path_at(path, Local::now().naive_local())
}

pub fn next_backup_path_at(path: &Path, at: NaiveDateTime) -> PathBuf {
    let base = suffixed(
        &normalize_path(path),
        &format!(".{}", at.format(BACKUP_TIMESTAMP_FORMAT)),
    );
    if !occupied(&base) {
        return base;
    }

    let mut version = 1_u32;
    loop {
        let candidate = suffixed(&base, &format!("-{version}"));
        if !occupied(&candidate) {
            return candidate;
        }
        version += 1;
    }
}

/// Moves `path` aside to a fresh backup name and returns where it went.
pub fn move_with_timestamp(path: &Path) -> Result<PathBuf> {
    let backup_path = next_backup_path(path);
    move_path(path, &backup_path).with_context(|| {
        format!(
            "failed to back up {} to {}",
            path.display(),
            backup_path.display()
        )
    })?;
    Ok(backup_path)
}

/// Whether `candidate` is a name [`next_backup_path`] could have produced for
/// a file or directory called `original`.
pub fn is_backup_name(candidate: &str, original: &str) -> bool {
    let Some(rest) = candidate
        .strip_prefix(original)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        return false;
    };
    if rest.len() < 14 || !rest.is_char_boundary(14) {
        return false;
    }
    let (stamp, version) = rest.split_at(14);
    if !stamp.bytes().all(|byte| byte.is_ascii_digit()) {
        return false;
    }
    match version.strip_prefix('-') {
        None => version.is_empty(),
        Some(number) => !number.is_empty() && number.bytes().all(|byte| byte.is_ascii_digit()),
    }
}

/// Taken by anything, including a dangling symlink.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}
