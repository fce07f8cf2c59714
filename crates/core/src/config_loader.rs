use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering `config/Config.toml` and `GEXBOT_`
    /// environment variables over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed,
    /// or if the merged configuration fails validation.
    pub fn load() -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("config/Config.toml"))
            .merge(Env::prefixed("GEXBOT_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration with a profile overlay, e.g. `Config.live.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed,
    /// or if the merged configuration fails validation.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed("GEXBOT_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }
}
