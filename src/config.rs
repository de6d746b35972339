//! Application configuration, persisted as a single TOML file.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::input::frame_decoder::PointerFrameMode;
use crate::input::input_handle::InputSettings;
use crate::input::motion_integrator::MotionTuning;

const CONFIG_DIR: &str = ".config/openmote";
const CONFIG_FILE: &str = "config.toml";

/// Where input datagrams arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ListenConfig {
    Udp { port: u16 },
    Unix { path: PathBuf },
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig::Udp { port: 24680 }
    }
}

/// Input session tuning, all optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub tick_interval_ms: u64,
    pub pointer_frame_mode: PointerFrameMode,
    pub tuning: MotionTuning,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            pointer_frame_mode: PointerFrameMode::default(),
            tuning: MotionTuning::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenmoteConfig {
    pub listen: ListenConfig,
    pub input: InputConfig,
}

impl OpenmoteConfig {
    /// Loads the config file, writing pretty-printed defaults on first run.
    pub async fn load_or_create() -> Result<Self> {
        let path = Self::config_path();

        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            info!(
                "No config file found, writing defaults to {}",
                path.display()
            );
            let config = Self::default();

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
            }
            let content = toml::to_string_pretty(&config)
                .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| eyre!("Failed to write default config: {}", e))?;

            return Ok(config);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        let config =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Settings handed to the input session.
    pub fn input_settings(&self) -> InputSettings {
        InputSettings {
            tick_interval_ms: self.input.tick_interval_ms,
            pointer_frame_mode: self.input.pointer_frame_mode,
            tuning: self.input.tuning,
        }
    }

    fn config_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
