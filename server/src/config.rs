use crate::rooms::RoomSettings;
use anyhow::{Context, Result};
use bigtwo_core::BotDifficulty;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Server configuration persisted as TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    /// Shown to clients as the turn clock; not enforced server side.
    pub turn_timer_secs: u32,
    /// How many recent plays each game_state carries.
    pub history_cap: usize,
    pub bot_delay_ms: BotDelays,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotDelays {
    pub easy: u64,
    pub medium: u64,
    pub hard: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 33030,
            turn_timer_secs: bigtwo_core::room::DEFAULT_TURN_TIMER_SECS,
            history_cap: 5,
            bot_delay_ms: BotDelays::default(),
        }
    }
}

impl Default for BotDelays {
    fn default() -> Self {
        BotDelays {
            easy: 1000,
            medium: 1500,
            hard: 2000,
        }
    }
}

impl BotDelays {
    pub fn for_difficulty(&self, difficulty: BotDifficulty) -> Duration {
        let ms = match difficulty {
            BotDifficulty::Easy => self.easy,
            BotDifficulty::Medium => self.medium,
            BotDifficulty::Hard => self.hard,
        };
        Duration::from_millis(ms)
    }
}

impl Config {
    /// Load configuration from `path`, writing the defaults there first when
    /// the file does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config file '{}'", path.display()))?;
            let cfg: Config = toml::from_str(&text)
                .with_context(|| format!("parsing TOML config '{}'", path.display()))?;
            return Ok(cfg);
        }
        let cfg = Config::default();
        cfg.save(path)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("creating config directory '{}'", parent.display())
                })?;
            }
        }
        let text = toml::to_string_pretty(self).context("serializing config to TOML")?;
        fs::write(path, text).with_context(|| format!("writing config to '{}'", path.display()))?;
        Ok(())
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            turn_timer_secs: self.turn_timer_secs,
            history_cap: self.history_cap,
            bot_delays: self.bot_delay_ms.clone(),
        }
    }
}
