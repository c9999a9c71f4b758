mod codec;
mod manifest;
mod merge;
mod profile;
mod tree;

pub use codec::{
    parse_toml_tree, render_toml_tree, ConfigLoadError, ConfigStore, TomlConfigStore,
};
pub use manifest::{ContentManifest, ManifestEntry};
pub use merge::{merge_into_template, DriftPolicy, MergeOutcome};
pub use profile::{apply_profile, StationProfile, STATION_SECTION};
pub use tree::{ConfigNode, ConfigTree, ConfigValue, KeyComment};

#[cfg(test)]
mod tests;
