use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use upkeep_core::{DriftPolicy, StationProfile};

use crate::assets::LegacyRemediation;
use crate::content::ScanExcludes;
use crate::layout::{DEFAULT_ASSET_DIR, DEFAULT_CONFIG_NAME, DEFAULT_CONTENT_CATEGORY};

/// Per-install knobs, read from `upkeep.toml` at the install root when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeSettings {
    pub config_name: String,
    pub asset_dir: PathBuf,
    pub content_category: String,
    /// Distribution directories scanned into the content manifest.
    pub content_dirs: Vec<PathBuf>,
    pub drift_policy: DriftPolicy,
    pub legacy: LegacyRemediation,
    pub scan_excludes: ScanExcludes,
    pub default_profile: StationProfile,
}

impl Default for UpgradeSettings {
    fn default() -> Self {
        Self {
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
            content_category: DEFAULT_CONTENT_CATEGORY.to_string(),
            content_dirs: ["docs", "skins", "util"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            drift_policy: DriftPolicy::default(),
            legacy: LegacyRemediation::default(),
            scan_excludes: ScanExcludes::default(),
            default_profile: StationProfile::default_profile(),
        }
    }
}

impl UpgradeSettings {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse upkeep settings")
    }

    /// Missing file means defaults; an unreadable or malformed one is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings: {}", path.display()));
            }
        };
        Self::from_toml_str(&raw)
            .with_context(|| format!("failed parsing settings: {}", path.display()))
    }
}
