use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use upkeep_core::{ConfigNode, ConfigTree, StationProfile};
use upkeep_installer::StationPrompter;

/// Station-level questions asked on a first install, with the template key
/// each answer lands under.
const STATION_QUESTIONS: &[(&str, &str)] = &[
    ("location", "description of the station location"),
    ("latitude", "latitude in decimal degrees"),
    ("longitude", "longitude in decimal degrees"),
    ("altitude", "altitude, with unit (e.g. '700, foot')"),
];

/// Asks on `output` and reads answers line by line from `input`. An empty
/// answer or end of input takes the offered default.
pub(crate) struct TerminalPrompter<R, W> {
    input: R,
    output: W,
    defaults: StationProfile,
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub(crate) fn new(input: R, output: W, defaults: StationProfile) -> Self {
        Self {
            input,
            output,
            defaults,
        }
    }

    fn ask(&mut self, label: &str, default: &str) -> Result<String> {
        if default.is_empty() {
            write!(self.output, "{label}: ")?;
        } else {
            write!(self.output, "{label} [{default}]: ")?;
        }
        self.output.flush().context("failed writing prompt")?;

        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("failed reading answer")?;
        let answer = line.trim();
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

impl<R: BufRead, W: Write> StationPrompter for TerminalPrompter<R, W> {
    fn prompt_for_info(&mut self) -> Result<StationProfile> {
        let mut profile = self.defaults.clone();
        for (key, label) in STATION_QUESTIONS {
            let default = profile.settings.get(*key).cloned().unwrap_or_default();
            let answer = self.ask(label, &default)?;
            if !answer.is_empty() {
                profile.settings.insert((*key).to_string(), answer);
            }
        }
        let station_type = profile.station_type.clone();
        profile.station_type = self.ask("station type", &station_type)?;
        Ok(profile)
    }

    fn prompt_for_driver(&mut self, default: &str) -> Result<String> {
        self.ask("driver module", default)
    }

    fn prompt_for_driver_settings(
        &mut self,
        driver: &str,
        template: &ConfigTree,
    ) -> Result<BTreeMap<String, String>> {
        let mut answers = BTreeMap::new();
        let Some(section) = driver_section(template, driver) else {
            return Ok(answers);
        };

        for (key, node) in section.iter() {
            let ConfigNode::Value(value) = node else {
                continue;
            };
            if key == "driver" {
                continue;
            }
            let default = value.to_string();
            let answer = self.ask(key, &default)?;
            if answer != default {
                answers.insert(key.to_string(), answer);
            }
        }
        Ok(answers)
    }
}

/// The template section whose `driver` key names `driver`.
fn driver_section<'a>(template: &'a ConfigTree, driver: &str) -> Option<&'a ConfigTree> {
    template.iter().find_map(|(_, node)| match node {
        ConfigNode::Section(section)
            if section.value("driver").and_then(|value| value.as_str()) == Some(driver) =>
        {
            Some(section)
        }
        _ => None,
    })
}
