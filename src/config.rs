use std::{fs, path::{Path, PathBuf}};
use log::*;
use serde::Deserialize;

use crate::error::{SpeedError, SpeedResult};

/// Settings read from the optional TOML configuration file.
/// Every key is optional; command line options override what is set here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub results_file: PathBuf,
    pub speedtest_command: Vec<String>,
    pub ssid_command: Option<Vec<String>>,
    pub pretty: bool,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for Settings {
    fn default() -> Self
    {
        Self {
            results_file: PathBuf::from("speedresults.json"),
            speedtest_command: vec!["speedtest-cli".to_string()],
            ssid_command: None,
            pretty: true,
            chart_width: 1280,
            chart_height: 900,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> SpeedResult<Self>
    {
        let settings: Settings = toml::from_str(text).map_err(|error| SpeedError::Config(error.to_string()))?;
        if settings.speedtest_command.is_empty()
        {
            return Err(SpeedError::Config("speedtest_command must name a program".to_string()));
        }
        Ok(settings)
    }

    /// Defaults when no file is given.
    pub fn load(path: Option<&Path>) -> SpeedResult<Self>
    {
        let Some(path) = path else { return Ok(Self::default()) };
        let text = fs::read_to_string(path)
            .map_err(|error| SpeedError::Config(format!("{}: {}", path.display(), error)))?;
        let settings = Self::from_toml_str(&text)?;
        debug!("settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults()
    {
        let settings = Settings::from_toml_str("results_file = \"/var/lib/speed/results.json\"\nssid_command = [\"iwgetid\"]\n").unwrap();
        assert_eq!(settings.results_file, PathBuf::from("/var/lib/speed/results.json"));
        assert_eq!(settings.ssid_command, Some(vec!["iwgetid".to_string()]));
        assert_eq!(settings.speedtest_command, vec!["speedtest-cli"]);
        assert!(settings.pretty);
        assert_eq!(Settings::load(None).unwrap(), Settings::default());
    }

    #[test]
    fn bad_settings_are_config_errors()
    {
        assert!(matches!(Settings::from_toml_str("speedtest_command = []"), Err(SpeedError::Config(_))));
        assert!(matches!(Settings::from_toml_str("colour = \"blue\""), Err(SpeedError::Config(_))));
        assert!(matches!(Settings::load(Some(Path::new("/nonexistent/speedgraph.toml"))), Err(SpeedError::Config(_))));
    }
}
