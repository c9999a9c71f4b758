use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use upkeep_core::{ContentManifest, ManifestEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanExcludes {
    pub file_suffixes: Vec<String>,
    pub dir_names: Vec<String>,
}

impl Default for ScanExcludes {
    fn default() -> Self {
        Self {
            file_suffixes: vec![".pyc".to_string()],
            dir_names: vec!["__pycache__".to_string()],
        }
    }
}

impl ScanExcludes {
    fn excludes_file(&self, name: &str) -> bool {
        self.file_suffixes
            .iter()
            .any(|suffix| name.ends_with(suffix.as_str()))
    }

    fn excludes_dir(&self, name: &str) -> bool {
        self.dir_names.iter().any(|excluded| excluded == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub manifest: ContentManifest,
    /// Groups left out because the destination already has them.
    pub skipped_groups: Vec<String>,
    pub installed_groups: Vec<String>,
}

/// Walks `source_root/rel_dir` and lists every directory with its files,
/// all relative to `source_root`. Output is sorted so scans are repeatable.
pub fn scan_content_dir(
    source_root: &Path,
    rel_dir: &Path,
    excludes: &ScanExcludes,
) -> Result<Vec<ManifestEntry>> {
    let mut entries = Vec::new();
    if !source_root.join(rel_dir).is_dir() {
        return Ok(entries);
    }

    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(rel_dir.to_path_buf());

    while let Some(relative) = queue.pop_front() {
        let dir = source_root.join(&relative);
        let mut children = fs::read_dir(&dir)
            .with_context(|| format!("failed reading content directory {}", dir.display()))?
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("failed reading content directory {}", dir.display()))?;
        children.sort_by_key(|entry| entry.file_name());

        let mut files = Vec::new();
        for child in children {
            let name = child.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };
            let file_type = child.file_type()?;
            if file_type.is_dir() {
                if !excludes.excludes_dir(name_str) {
                    queue.push_back(relative.join(&name));
                }
            } else if file_type.is_file() && !excludes.excludes_file(name_str) {
                files.push(relative.join(&name));
            }
        }
        entries.push(ManifestEntry::new(relative, files));
    }

    Ok(entries)
}

/// Drops every group under `category` that already exists below
/// `destination_root`; all other entries pass through. Existence is checked
/// once per group before any entry is filtered, so a group is never split.
/// Loose files directly under `category` belong to no group and are always
/// installed, even when the category dir already exists.
pub fn filter_manifest(
    manifest: &ContentManifest,
    destination_root: &Path,
    category: &str,
) -> FilterOutcome {
    let mut skipped_groups = Vec::new();
    let mut installed_groups = Vec::new();
    for group in manifest.group_names(category) {
        if destination_root.join(category).join(&group).exists() {
            skipped_groups.push(group);
        } else {
            installed_groups.push(group);
        }
    }
    let skipped: BTreeSet<&str> = skipped_groups.iter().map(String::as_str).collect();

    let entries = manifest
        .entries
        .iter()
        .filter(|entry| match entry.group_name(category) {
            Some(group) => !skipped.contains(group.as_str()),
            None => true,
        })
        .cloned()
        .collect();

    for group in &skipped_groups {
        tracing::info!(category, group = %group, "keeping existing content group");
    }

    FilterOutcome {
        manifest: ContentManifest::new(entries),
        skipped_groups,
        installed_groups,
    }
}

/// Copies each manifest file to `destination_root/<entry dir>/<file name>`.
pub fn copy_manifest(
    manifest: &ContentManifest,
    source_root: &Path,
    destination_root: &Path,
) -> Result<Vec<PathBuf>> {
    let mut installed = Vec::new();
    for entry in &manifest.entries {
        let target_dir = destination_root.join(&entry.dir);
        fs::create_dir_all(&target_dir)
            .with_context(|| format!("failed to create {}", target_dir.display()))?;
        for file in &entry.files {
            let Some(file_name) = file.file_name() else {
                anyhow::bail!("manifest file has no name: {}", file.display());
            };
            let from = source_root.join(file);
            let to = target_dir.join(file_name);
            fs::copy(&from, &to).with_context(|| {
                format!("failed copying {} to {}", from.display(), to.display())
            })?;
            installed.push(to);
        }
    }
    Ok(installed)
}
