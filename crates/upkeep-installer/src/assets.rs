use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backup::move_with_timestamp;
use crate::fs_utils::copy_tree_over;

/// Files known to be obsolete and to conflict with the current release when
/// left in the asset directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyRemediation {
    /// Renamed to `<name>.old` after a restore.
    pub rename: Vec<String>,
    /// Compiled or cached artifacts of the renamed files; deleted.
    pub delete: Vec<String>,
}

impl Default for LegacyRemediation {
    fn default() -> Self {
        Self {
            rename: vec!["schemas.py".to_string()],
            delete: vec!["schemas.pyc".to_string()],
        }
    }
}

impl LegacyRemediation {
    pub fn none() -> Self {
        Self {
            rename: Vec::new(),
            delete: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetState {
    Idle,
    NoAsset,
    Snapshotted(PathBuf),
    Restored(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub snapshot: Option<PathBuf>,
    pub copied_files: Vec<PathBuf>,
    pub renamed: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

/// Keeps a user-owned directory alive across a wipe-and-recreate of its
/// parent tree: [`snapshot`](Self::snapshot) before the replacement,
/// [`restore`](Self::restore) after it.
#[derive(Debug, Clone)]
pub struct AssetPreserver {
    asset_dir: PathBuf,
    state: AssetState,
}

impl AssetPreserver {
    pub fn new(asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            state: AssetState::Idle,
        }
    }

    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    pub fn state(&self) -> &AssetState {
        &self.state
    }

    /// Moves the asset directory to a timestamped backup name. Returns the
    /// snapshot location, or `None` when there was nothing to preserve.
    pub fn snapshot(&mut self) -> Result<Option<PathBuf>> {
        if self.state != AssetState::Idle {
            anyhow::bail!(
                "asset directory {} was already snapshotted",
                self.asset_dir.display()
            );
        }

        if !self.asset_dir.exists() {
            tracing::debug!(dir = %self.asset_dir.display(), "no prior asset directory");
            self.state = AssetState::NoAsset;
            return Ok(None);
        }

        let snapshot = move_with_timestamp(&self.asset_dir).with_context(|| {
            format!(
                "failed to set aside asset directory {}",
                self.asset_dir.display()
            )
        })?;
        tracing::info!(
            dir = %self.asset_dir.display(),
            snapshot = %snapshot.display(),
            "set aside asset directory"
        );
        self.state = AssetState::Snapshotted(snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Copies the snapshot back over the freshly installed asset directory,
    /// then applies `remediation`. The snapshot itself stays on disk.
    pub fn restore(&mut self, remediation: &LegacyRemediation) -> Result<RestoreReport> {
        let snapshot = match &self.state {
            AssetState::NoAsset => return Ok(RestoreReport::default()),
            AssetState::Snapshotted(snapshot) => snapshot.clone(),
            AssetState::Idle => anyhow::bail!(
                "asset directory {} has no snapshot to restore",
                self.asset_dir.display()
            ),
            AssetState::Restored(_) => anyhow::bail!(
                "asset directory {} was already restored",
                self.asset_dir.display()
            ),
        };

        let copied_files = copy_tree_over(&snapshot, &self.asset_dir).with_context(|| {
            format!(
                "failed to restore asset directory {} from {}",
                self.asset_dir.display(),
                snapshot.display()
            )
        })?;
        tracing::info!(
            dir = %self.asset_dir.display(),
            files = copied_files.len(),
            "restored asset directory"
        );

        let (renamed, deleted) = remediate_legacy_files(&self.asset_dir, remediation);
        self.state = AssetState::Restored(snapshot.clone());

        Ok(RestoreReport {
            snapshot: Some(snapshot),
            copied_files,
            renamed,
            deleted,
        })
    }
}

fn remediate_legacy_files(
    asset_dir: &Path,
    remediation: &LegacyRemediation,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut renamed = Vec::new();
    for name in &remediation.rename {
        let path = asset_dir.join(name);
        let mut retired: OsString = path.as_os_str().to_owned();
        retired.push(".old");
        let retired = PathBuf::from(retired);
        if tolerate_cleanup(fs::rename(&path, &retired), &path) {
            tracing::info!(from = %path.display(), to = %retired.display(), "retired legacy file");
            renamed.push(retired);
        }
    }

    let mut deleted = Vec::new();
    for name in &remediation.delete {
        let path = asset_dir.join(name);
        if tolerate_cleanup(fs::remove_file(&path), &path) {
            deleted.push(path);
        }
    }

    (renamed, deleted)
}

/// Best-effort cleanup: reports whether the operation happened and never
/// propagates the failure.
pub(crate) fn tolerate_cleanup(result: io::Result<()>, path: &Path) -> bool {
    match result {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => false,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            tracing::debug!(path = %path.display(), "cleanup not permitted: {err}");
            false
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), "cleanup failed: {err}");
            false
        }
    }
}
