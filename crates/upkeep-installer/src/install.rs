use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use upkeep_core::ContentManifest;

use crate::assets::{AssetPreserver, RestoreReport};
use crate::backup::is_backup_name;
use crate::content::{copy_manifest, filter_manifest, scan_content_dir};
use crate::fs_utils::{clear_dir_except, copy_tree_over};
use crate::layout::LIB_DIR;
use crate::settings::UpgradeSettings;
use crate::upgrade::{update_and_install_config, ConfigInstallOutcome, UpgradeContext};

/// An unpacked distribution: a `lib` tree that replaces the installed one,
/// optional content directories, and the distribution config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionBundle {
    root: PathBuf,
}

impl DistributionBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join(LIB_DIR)
    }

    pub fn config_path(&self, config_name: &str) -> PathBuf {
        self.root.join(config_name)
    }

    pub fn content_manifest(&self, settings: &UpgradeSettings) -> Result<ContentManifest> {
        let mut entries = Vec::new();
        for dir in &settings.content_dirs {
            entries.extend(scan_content_dir(&self.root, dir, &settings.scan_excludes)?);
        }
        Ok(ContentManifest::new(entries))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub dry_run: bool,
    pub installed_groups: Vec<String>,
    pub skipped_groups: Vec<String>,
    pub content_files: usize,
    pub restored_assets: Option<RestoreReport>,
    pub config: ConfigInstallOutcome,
}

/// Installs `bundle` over `ctx.layout`. Content groups the user already has
/// are decided before anything is copied; the asset directory is set aside
/// before the `lib` tree is replaced and restored right after.
pub fn install_bundle(
    ctx: &mut UpgradeContext<'_>,
    settings: &UpgradeSettings,
    bundle: &DistributionBundle,
) -> Result<InstallReport> {
    let layout = ctx.layout.clone();
    let manifest = bundle.content_manifest(settings)?;
    let plan = filter_manifest(&manifest, layout.root(), layout.content_category());
    let content_files = plan.manifest.file_count();
    let bundle_config = bundle.config_path(layout.config_name());
    // A missing or malformed distribution config must fail before `lib/` is
    // touched.
    ctx.store.load(&bundle_config)?;

    if ctx.dry_run {
        ctx.template_path = bundle_config;
        let config = update_and_install_config(ctx)?;
        return Ok(InstallReport {
            dry_run: true,
            installed_groups: plan.installed_groups,
            skipped_groups: plan.skipped_groups,
            content_files,
            restored_assets: None,
            config,
        });
    }

    layout.ensure_root()?;

    let mut preserver = AssetPreserver::new(layout.asset_dir());
    preserver.snapshot()?;
    let keep = asset_backups(&layout.asset_dir())?;
    if let Err(err) = replace_tree(&bundle.lib_dir(), &layout.lib_dir(), &keep) {
        if let Err(restore_err) = preserver.restore(&settings.legacy) {
            tracing::warn!(
                dir = %layout.asset_dir().display(),
                "could not restore asset directory after failed replace: {restore_err:#}"
            );
        }
        return Err(err);
    }
    let restored_assets = preserver.restore(&settings.legacy)?;

    copy_manifest(&plan.manifest, bundle.root(), layout.root())?;
    tracing::info!(
        files = content_files,
        groups = plan.installed_groups.len(),
        "installed content"
    );

    let template_path = layout.template_path();
    fs::copy(&bundle_config, &template_path).with_context(|| {
        format!(
            "failed to stage configuration template {} from {}",
            template_path.display(),
            bundle_config.display()
        )
    })?;
    ctx.template_path = template_path;

    let config = update_and_install_config(ctx)?;
    Ok(InstallReport {
        dry_run: false,
        installed_groups: plan.installed_groups,
        skipped_groups: plan.skipped_groups,
        content_files,
        restored_assets: Some(restored_assets),
        config,
    })
}

/// Every backup of `asset_dir` sitting next to it, including a snapshot
/// taken moments ago. Backups are never removed by an install.
fn asset_backups(asset_dir: &Path) -> Result<Vec<PathBuf>> {
    let (Some(parent), Some(name)) = (
        asset_dir.parent(),
        asset_dir.file_name().and_then(|name| name.to_str()),
    ) else {
        return Ok(Vec::new());
    };
    if !parent.is_dir() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for entry in
        fs::read_dir(parent).with_context(|| format!("failed reading {}", parent.display()))?
    {
        let entry = entry?;
        if entry
            .file_name()
            .to_str()
            .is_some_and(|candidate| is_backup_name(candidate, name))
        {
            backups.push(entry.path());
        }
    }
    Ok(backups)
}

/// Empties `destination` (sparing `keep`) and refills it from `source`. A
/// missing `source` leaves `destination` untouched.
fn replace_tree(source: &Path, destination: &Path, keep: &[PathBuf]) -> Result<()> {
    if !source.is_dir() {
        tracing::debug!(dir = %source.display(), "distribution has no tree to install");
        return Ok(());
    }
    if destination.is_dir() {
        clear_dir_except(destination, keep)?;
    }
    let copied = copy_tree_over(source, destination)?;
    tracing::info!(dir = %destination.display(), files = copied.len(), "replaced tree");
    Ok(())
}
