use crate::config::DeskConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    fn figment(toml_path: &Path) -> Figment {
        Figment::from(Serialized::defaults(DeskConfig::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("APP_").split("__"))
            .join(Json::file("config/Config.json"))
    }

    /// Loads desk configuration by merging defaults, TOML, environment variables, and JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<DeskConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads desk configuration from a specific TOML file.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<DeskConfig> {
        let config: DeskConfig = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    /// Loads desk configuration with a specific profile overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<DeskConfig> {
        Self::load_from_with_profile(DEFAULT_CONFIG_PATH, Some(profile))
    }

    /// Loads `path`, then the `<stem>.<profile>.<ext>` file next to it when a
    /// profile is given.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load_from_with_profile(
        path: impl AsRef<Path>,
        profile: Option<&str>,
    ) -> Result<DeskConfig> {
        let path = path.as_ref();
        let mut figment =
            Figment::from(Serialized::defaults(DeskConfig::default())).merge(Toml::file(path));
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(Self::profile_path(path, profile)));
        }

        let config: DeskConfig = figment
            .merge(Env::prefixed("APP_").split("__"))
            .join(Json::file("config/Config.json"))
            .extract()?;

        Ok(config)
    }

    /// Overlay file for `profile`, e.g. `config/Config.testnet.toml`.
    #[must_use]
    pub fn profile_path(path: &Path, profile: &str) -> PathBuf {
        let stem = path
            .file_stem()
            .map_or_else(|| "Config".into(), |s| s.to_string_lossy());
        let file_name = match path.extension() {
            Some(ext) => format!("{stem}.{profile}.{}", ext.to_string_lossy()),
            None => format!("{stem}.{profile}"),
        };
        path.with_file_name(file_name)
    }
}
