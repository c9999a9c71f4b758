use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::ConfigTree;

pub const STATION_SECTION: &str = "Station";

/// First-install answers overlaid on the distribution template when no prior
/// configuration exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationProfile {
    pub station_type: String,
    pub driver: String,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub driver_settings: BTreeMap<String, String>,
}

impl StationProfile {
    pub fn default_profile() -> Self {
        Self {
            station_type: "Simulator".to_string(),
            driver: "upkeep.drivers.simulator".to_string(),
            settings: BTreeMap::new(),
            driver_settings: BTreeMap::new(),
        }
    }
}

impl Default for StationProfile {
    fn default() -> Self {
        Self::default_profile()
    }
}

/// Writes the profile into `tree`: station-level answers under `[Station]`,
/// the driver and its settings under the section named by `station_type`.
pub fn apply_profile(tree: &mut ConfigTree, profile: &StationProfile) {
    let station = tree.ensure_section(STATION_SECTION);
    station.set_value("station_type", profile.station_type.as_str());
    for (key, value) in &profile.settings {
        station.set_value(key.as_str(), value.as_str());
    }

    let driver_section = tree.ensure_section(&profile.station_type);
    driver_section.set_value("driver", profile.driver.as_str());
    for (key, value) in &profile.driver_settings {
        driver_section.set_value(key.as_str(), value.as_str());
    }
}
