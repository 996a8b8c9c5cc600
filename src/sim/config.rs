use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

use crate::sim::event::Tick;

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TopConfig {
    pub timeout: Tick,
    pub log_level: String,
}

impl Config for TopConfig {}

impl Default for TopConfig {
    fn default() -> Self {
        Self {
            timeout: 10_000_000,
            log_level: "warn".to_string(),
        }
    }
}
