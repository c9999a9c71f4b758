use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use semver::Version;
use serde::Serialize;
use tempfile::NamedTempFile;
use upkeep_core::{
    apply_profile, merge_into_template, ConfigStore, ConfigTree, DriftPolicy, StationProfile,
};

use crate::assets::tolerate_cleanup;
use crate::backup::move_with_timestamp;
use crate::fs_utils::move_path;
use crate::layout::InstallLayout;
use crate::prompt::{prompt_station_profile, StationPrompter};
use crate::settings::UpgradeSettings;

/// Top-level field naming the install root; always rewritten on install.
pub const ROOT_KEY: &str = "ROOT";
pub const VERSION_KEY: &str = "version";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigInstallMode {
    Fresh,
    Merged,
}

impl ConfigInstallMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Merged => "merged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionDrift {
    pub from: String,
    pub to: String,
    pub downgrade: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigInstallOutcome {
    pub destination: PathBuf,
    pub mode: ConfigInstallMode,
    pub dry_run: bool,
    pub installed: bool,
    pub backup: Option<PathBuf>,
    pub template_removed: bool,
    pub unknown_keys: Vec<String>,
    pub restructured: Vec<String>,
    pub version_drift: Option<VersionDrift>,
}

/// Everything one upgrade run needs; built once by the caller and passed down.
pub struct UpgradeContext<'a> {
    pub layout: InstallLayout,
    pub template_path: PathBuf,
    /// Where the merged tree is serialized before being moved into place.
    /// `None` means the system temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub no_prompt: bool,
    pub dry_run: bool,
    pub drift_policy: DriftPolicy,
    pub default_profile: StationProfile,
    pub store: &'a dyn ConfigStore,
    pub prompter: Option<&'a mut dyn StationPrompter>,
}

impl<'a> UpgradeContext<'a> {
    pub fn new(layout: InstallLayout, store: &'a dyn ConfigStore) -> Self {
        Self {
            template_path: layout.template_path(),
            layout,
            scratch_dir: None,
            no_prompt: true,
            dry_run: false,
            drift_policy: DriftPolicy::default(),
            default_profile: StationProfile::default_profile(),
            store,
            prompter: None,
        }
    }

    pub fn from_settings(
        layout: InstallLayout,
        settings: &UpgradeSettings,
        store: &'a dyn ConfigStore,
    ) -> Self {
        Self {
            drift_policy: settings.drift_policy,
            default_profile: settings.default_profile.clone(),
            ..Self::new(layout, store)
        }
    }
}

/// Merges the distribution template with any existing configuration and
/// installs the result at `layout.config_path()`, backing up what was there.
pub fn update_and_install_config(ctx: &mut UpgradeContext<'_>) -> Result<ConfigInstallOutcome> {
    let destination = ctx.layout.config_path();
    let template = ctx.store.load(&ctx.template_path)?;

    let mut outcome = ConfigInstallOutcome {
        destination: destination.clone(),
        mode: ConfigInstallMode::Fresh,
        dry_run: ctx.dry_run,
        installed: false,
        backup: None,
        template_removed: false,
        unknown_keys: Vec::new(),
        restructured: Vec::new(),
        version_drift: None,
    };

    // Any file counts, including an empty one.
    let mut tree = if destination.is_file() {
        let user = ctx.store.load(&destination)?;
        tracing::debug!(path = %destination.display(), "found existing configuration");
        outcome.mode = ConfigInstallMode::Merged;
        outcome.version_drift = version_drift(&user, &template);
        let merged = merge_into_template(&template, &user, ctx.drift_policy);
        outcome.unknown_keys = merged.unknown_keys;
        outcome.restructured = merged.restructured;
        let mut tree = merged.tree;
        if let Some(version) = template.value(VERSION_KEY) {
            tree.set_value(VERSION_KEY, version.clone());
        }
        tree
    } else {
        let mut tree = template;
        let profile = station_profile(ctx, &tree)?;
        apply_profile(&mut tree, &profile);
        tree
    };

    tree.set_value(ROOT_KEY, ctx.layout.root().to_string_lossy().into_owned());

    let staged = stage_config(ctx, &tree)?;

    if ctx.dry_run {
        tracing::info!(
            path = %destination.display(),
            mode = outcome.mode.as_str(),
            "dry run; configuration not installed"
        );
        return Ok(outcome);
    }

    if destination.exists() {
        let backup = move_with_timestamp(&destination).with_context(|| {
            format!(
                "refusing to overwrite {} without a backup",
                destination.display()
            )
        })?;
        tracing::info!(backup = %backup.display(), "saved old configuration file");
        outcome.backup = Some(backup);
    }

    if let Err(err) = install_staged_config(staged, &destination) {
        if let Some(backup) = &outcome.backup {
            if let Err(restore_err) = move_path(backup, &destination) {
                tracing::warn!(
                    backup = %backup.display(),
                    "could not put previous configuration back: {restore_err:#}"
                );
            }
        }
        return Err(err);
    }
    outcome.installed = true;
    tracing::info!(
        path = %destination.display(),
        mode = outcome.mode.as_str(),
        "installed configuration"
    );

    outcome.template_removed =
        tolerate_cleanup(fs::remove_file(&ctx.template_path), &ctx.template_path);
    Ok(outcome)
}

fn station_profile(
    ctx: &mut UpgradeContext<'_>,
    template: &ConfigTree,
) -> Result<StationProfile> {
    if ctx.no_prompt {
        return Ok(ctx.default_profile.clone());
    }
    let Some(prompter) = ctx.prompter.as_deref_mut() else {
        anyhow::bail!("no prior configuration and no way to prompt for station settings");
    };
    let profile = prompt_station_profile(prompter, template)?;
    tracing::debug!(?profile, "station info");
    Ok(profile)
}

/// Serializes `tree` into a fresh temp file. The file is removed when the
/// returned handle drops, whichever way the caller exits.
fn stage_config(ctx: &UpgradeContext<'_>, tree: &ConfigTree) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".upkeep-").suffix(".tmp");
    let staged = match &ctx.scratch_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .context("failed to create temporary configuration file")?;

    ctx.store.save(tree, staged.path())?;
    Ok(staged)
}

fn install_staged_config(staged: NamedTempFile, destination: &Path) -> Result<()> {
    let staged = match staged.persist(destination) {
        Ok(_) => return Ok(()),
        Err(err) => {
            tracing::debug!("rename into place failed, copying instead: {}", err.error);
            err.file
        }
    };

    // Copy next to the destination first so the final step is still a rename.
    let mut partial: OsString = destination.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);
    let result = fs::copy(staged.path(), &partial)
        .map(|_| ())
        .and_then(|()| fs::rename(&partial, destination));
    if result.is_err() {
        tolerate_cleanup(fs::remove_file(&partial), &partial);
    }
    result.with_context(|| format!("failed to install configuration {}", destination.display()))
}

fn version_drift(user: &ConfigTree, template: &ConfigTree) -> Option<VersionDrift> {
    let from = user.value(VERSION_KEY)?.as_str()?;
    let to = template.value(VERSION_KEY)?.as_str()?;
    if from == to {
        return None;
    }

    let downgrade = match (Version::parse(from), Version::parse(to)) {
        (Ok(from), Ok(to)) => from > to,
        _ => false,
    };
    if downgrade {
        tracing::warn!(from, to, "configuration is newer than the distribution template");
    } else {
        tracing::info!(from, to, "upgrading configuration");
    }
    Some(VersionDrift {
        from: from.to_string(),
        to: to.to_string(),
        downgrade,
    })
}
