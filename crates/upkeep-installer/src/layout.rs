use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::settings::UpgradeSettings;

pub const DEFAULT_CONFIG_NAME: &str = "station.toml";
pub const DEFAULT_ASSET_DIR: &str = "lib/user";
pub const DEFAULT_CONTENT_CATEGORY: &str = "skins";
pub const LIB_DIR: &str = "lib";
pub const SETTINGS_FILE_NAME: &str = "upkeep.toml";
pub const TEMPLATE_SUFFIX: &str = "template";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    config_name: String,
    asset_dir: PathBuf,
    content_category: String,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize_path(&root.into()),
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
            content_category: DEFAULT_CONTENT_CATEGORY.to_string(),
        }
    }

    pub fn with_settings(root: impl Into<PathBuf>, settings: &UpgradeSettings) -> Self {
        Self {
            config_name: settings.config_name.clone(),
            asset_dir: settings.asset_dir.clone(),
            content_category: settings.content_category.clone(),
            ..Self::new(root)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn content_category(&self) -> &str {
        &self.content_category
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config_name)
    }

    pub fn template_path(&self) -> PathBuf {
        self.root
            .join(format!("{}.{TEMPLATE_SUFFIX}", self.config_name))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE_NAME)
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.root.join(LIB_DIR)
    }

    pub fn asset_dir(&self) -> PathBuf {
        self.root.join(&self.asset_dir)
    }

    pub fn content_category_dir(&self) -> PathBuf {
        self.root.join(&self.content_category)
    }

    pub fn content_group_dir(&self, group: &str) -> PathBuf {
        self.content_category_dir().join(group)
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))
    }
}

/// Lexical normalization: drops `.` components, trailing separators and
/// resolves `..` against preceding normal components.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                ) && normalized.pop();
                if !popped {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}
