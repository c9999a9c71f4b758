use std::path::PathBuf;

use anyhow::{Context, Result};

mod assets;
mod backup;
mod content;
mod fs_utils;
mod install;
mod layout;
mod prompt;
mod settings;
mod upgrade;

pub use assets::{AssetPreserver, AssetState, LegacyRemediation, RestoreReport};
pub use backup::{is_backup_name, move_with_timestamp, next_backup_path, next_backup_path_at};
pub use content::{copy_manifest, filter_manifest, scan_content_dir, FilterOutcome, ScanExcludes};
pub use install::{install_bundle, DistributionBundle, InstallReport};
pub use layout::{normalize_path, InstallLayout, DEFAULT_CONFIG_NAME, SETTINGS_FILE_NAME};
pub use prompt::{prompt_station_profile, StationPrompter};
pub use settings::UpgradeSettings;
pub use upgrade::{
    update_and_install_config, ConfigInstallMode, ConfigInstallOutcome, UpgradeContext,
    VersionDrift, ROOT_KEY, VERSION_KEY,
};

pub fn default_install_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os("UPKEEP_ROOT") {
        return Ok(PathBuf::from(root));
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows install root")?;
        return Ok(PathBuf::from(app_data).join("Upkeep"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve install root")?;
    Ok(PathBuf::from(home).join("upkeep"))
}
