use std::collections::BTreeMap;

use anyhow::Result;
use upkeep_core::{ConfigTree, StationProfile};

/// Gathers first-install answers from the operator.
pub trait StationPrompter {
    fn prompt_for_info(&mut self) -> Result<StationProfile>;

    fn prompt_for_driver(&mut self, default: &str) -> Result<String>;

    /// Settings specific to `driver`, asked only once the driver is chosen.
    fn prompt_for_driver_settings(
        &mut self,
        driver: &str,
        template: &ConfigTree,
    ) -> Result<BTreeMap<String, String>>;
}

pub fn prompt_station_profile(
    prompter: &mut dyn StationPrompter,
    template: &ConfigTree,
) -> Result<StationProfile> {
    let mut profile = prompter.prompt_for_info()?;
    profile.driver = prompter.prompt_for_driver(&profile.driver)?;
    let driver_settings = prompter.prompt_for_driver_settings(&profile.driver, template)?;
    profile.driver_settings.extend(driver_settings);
    Ok(profile)
}
