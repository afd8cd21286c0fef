//! Server configuration.
//!
//! Wraps the simulation tuning with host settings: how long to run, where
//! to read registries from, where to write the event log, and the scripted
//! demo match. Loaded from a TOML file; anything missing takes its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use arena_sim::config::SimConfig;

/// Configuration file name.
pub const CONFIG_FILE: &str = "arena.toml";

/// Server configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // === Run Settings ===
    /// Stop after this many ticks even if no base has fallen
    pub max_ticks: u64,
    /// Sleep out each tick interval instead of running flat out
    pub realtime: bool,

    // === Data ===
    /// Directory holding `units.ron`, `projectiles.ron` and `maps.ron`
    /// (None = built-in data)
    pub data_dir: Option<PathBuf>,
    /// JSON-lines file receiving every published event (None = disabled)
    pub event_log: Option<PathBuf>,

    // === Simulation ===
    /// Simulation tuning
    pub sim: SimConfig,

    // === Demo Match ===
    /// Scripted match played by the server
    pub demo: DemoConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_ticks: 3000, // 5 minutes at 100 ms
            realtime: true,

            data_dir: None,
            event_log: None,

            sim: SimConfig::default(),

            demo: DemoConfig::default(),
        }
    }
}

/// Scripted demo match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Map name
    pub map: String,
    /// Blue deck in draw order
    pub blue_deck: Vec<String>,
    /// Red deck in draw order
    pub red_deck: Vec<String>,
    /// Ticks between deployment attempts
    pub deploy_every: u64,
    /// Blue deployment point
    pub blue_spawn: [f32; 2],
    /// Red deployment point
    pub red_spawn: [f32; 2],
    /// Vertical spacing between successive deployments
    pub lane_spread: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        let deck = |cards: &[&str]| cards.iter().map(|c| (*c).to_string()).collect();
        Self {
            map: "arena".to_string(),
            blue_deck: deck(&["knight", "archer", "giant", "cleric", "flamer", "dragon"]),
            red_deck: deck(&["knight", "shaman", "archer", "giant", "dragon", "cleric"]),
            deploy_every: 40,
            blue_spawn: [500.0, 500.0],
            red_spawn: [1500.0, 500.0],
            lane_spread: 150.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        let config: Self = match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                return Self::default();
            },
        };

        if let Err(e) = config.sim.validate() {
            warn!("Invalid simulation settings, using defaults: {e}");
            return Self {
                sim: SimConfig::default(),
                ..config
            };
        }

        info!("Loaded config from {}", path.display());
        config
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }
}
