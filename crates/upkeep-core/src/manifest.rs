use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

/// One directory's worth of bundled files. `dir` is where the files land
/// under the install root; each file is a source path relative to the
/// distribution root and is installed as `dir/<file name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub dir: PathBuf,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl ManifestEntry {
    pub fn new(dir: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files,
        }
    }

    /// The group this entry belongs to when it sits under
    /// `<category>/<group>/...`; `None` for anything outside `category`.
    pub fn group_name(&self, category: &str) -> Option<String> {
        let mut components = self.dir.components().filter_map(|component| match component {
            Component::Normal(part) => part.to_str(),
            _ => None,
        });
        if components.next()? != category {
            return None;
        }
        components.next().map(ToString::to_string)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentManifest {
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

impl ContentManifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            toml::from_str(input).context("failed to parse upkeep content manifest")?;
        for entry in &manifest.entries {
            validate_relative(&entry.dir)?;
            for file in &entry.files {
                validate_relative(file)?;
            }
        }
        Ok(manifest)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("failed to serialize upkeep content manifest")
    }

    pub fn file_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.files.len()).sum()
    }

    /// Distinct groups under `category`, in first-seen order.
    pub fn group_names(&self, category: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.entries {
            if let Some(name) = entry.group_name(category) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

fn validate_relative(path: &Path) -> anyhow::Result<()> {
    if path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
    {
        return Ok(());
    }
    Err(anyhow!(
        "manifest path must be relative without '..': {}",
        path.display()
    ))
}
