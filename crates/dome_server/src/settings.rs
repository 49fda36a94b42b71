//! Layered configuration loading (§6, SPEC_FULL §2.1): default file →
//! environment-specific file → environment variables, the same three-source
//! `config::Config::builder()` chain the teacher's `AppConfig::load_from`
//! uses, generalized from Ploy's trading-specific sections to the one
//! validated `dome_core::config::Config` plus this binary's own bind
//! address and season bootstrap date.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use config::{Config as ConfigLoader, Environment, File};
use dome_core::Config as CoreConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// UTC instant the season's day 1 began; only consulted the first time
    /// the server boots against an empty store (§9 "Season created once at
    /// install").
    #[serde(default = "Utc::now")]
    pub season_start: DateTime<Utc>,
    #[serde(default)]
    pub core: CoreConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), season_start: Utc::now(), core: CoreConfig::default() }
    }
}

impl ServerSettings {
    /// Loads `config/default.toml`, then `config/<DOME_ENV>.toml`
    /// (default `development`), then `DOME_`-prefixed environment
    /// variables, mirroring the teacher's `AppConfig::load_from` precedence.
    pub fn load(config_dir: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_dir.as_ref();

        let mut builder = ConfigLoader::builder()
            .set_default("bind_addr", default_bind_addr())?
            .set_default("core.simulation_tick_period_ms", 100)?
            .set_default("core.max_concurrent_matches", 64)?
            .set_default("core.progression_base_rate", 0.15)?
            .set_default("core.age_decline_start", 31)?
            .set_default("core.retirement_start", 40)?
            .set_default("core.mandatory_retire", 45)?
            .set_default("core.daily_cup_divisions", (2..=8).collect::<Vec<i64>>())?
            .set_default("core.daily_cup_size", 8)?
            .set_default("core.mid_season_cup_size", 64)?
            .set_default("core.mid_season_cup_day", 7)?
            .set_default("core.prize_distribution", vec![0.5, 0.3, 0.2])?;

        if config_path.is_file() {
            builder = builder.add_source(File::from(config_path).required(true));
        } else {
            builder = builder
                .add_source(File::from(config_path.join("default.toml")).required(false))
                .add_source(
                    File::from(config_path.join(std::env::var("DOME_ENV").unwrap_or_else(|_| "development".to_string())))
                        .required(false),
                );
        }

        builder = builder.add_source(
            Environment::with_prefix("DOME").prefix_separator("_").separator("__").list_separator(",").try_parsing(true),
        );

        let settings: Self = builder.build().context("failed to assemble layered configuration")?.try_deserialize().context("failed to deserialize ServerSettings")?;
        settings.core.validate_all().map_err(anyhow::Error::msg).context("core config failed validation")?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_with_no_files_present_falls_back_to_defaults() {
        let settings = ServerSettings::load("config/does-not-exist").unwrap();
        assert_eq!(settings.bind_addr, default_bind_addr());
        assert_eq!(settings.core.max_concurrent_matches, 64);
    }
}
