//! Application configuration: file locations, launcher paths and account
//! settings, layered from defaults, `config.toml` and `GAMELIB_*` variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Directory under the platform config/data/cache roots used by the app.
pub const APP_DIR: &str = "gamelib";

/// Prefix of environment overrides, e.g. `GAMELIB_ROUTE_THROUGH_STEAM=true`.
pub const ENV_PREFIX: &str = "GAMELIB";

const DEFAULT_CONFIG: &str = r#"# gamelib configuration. Every key is optional.

# library_file = "/path/to/games.json"
# bundle_file = "/path/to/gog_packages.json"
# cache_root = "/path/to/cache"
# steam_executable = "steam"
# gba_emulator = "visualboyadvance-m"
# desktop_dir = "/home/me/Desktop"

# Launch non-Steam games through their Steam shortcut once one has been
# created (Steam drops it on the desktop; it is moved into the cache).
route_through_steam = false

[accounts]
# steam_user_id = ""
# steam_api_key = ""
# steam_shortcut_folder = ""
# gog_username = ""
"#;

/// Storefront account settings used by import tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Vanity id from the Steam profile url.
    pub steam_user_id: String,
    /// Steam web API key.
    pub steam_api_key: String,
    /// Folder containing Steam's `shortcuts.vdf`.
    pub steam_shortcut_folder: String,
    /// GOG account name.
    pub gog_username: String,
}

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Persisted library snapshot.
    pub library_file: PathBuf,
    /// Persisted bundle membership map.
    pub bundle_file: PathBuf,
    /// Root for generated launch scripts and cached Steam shortcuts.
    pub cache_root: PathBuf,
    /// Steam client used for `-applaunch`.
    pub steam_executable: PathBuf,
    /// Emulator that runs GBA ROMs.
    pub gba_emulator: PathBuf,
    /// Desktop folder watched for new Steam shortcuts.
    pub desktop_dir: Option<PathBuf>,
    /// Route non-Steam games through Steam shortcuts.
    pub route_through_steam: bool,
    /// Storefront accounts.
    pub accounts: AccountConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_root = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        let cache_root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("cache"))
            .join(APP_DIR);

        Self {
            library_file: data_root.join("games.json"),
            bundle_file: data_root.join("gog_packages.json"),
            cache_root,
            steam_executable: default_steam_executable(),
            gba_emulator: default_gba_emulator(),
            desktop_dir: dirs::desktop_dir(),
            route_through_steam: false,
            accounts: AccountConfig::default(),
        }
    }
}

#[cfg(windows)]
fn default_steam_executable() -> PathBuf {
    PathBuf::from(r"C:\Program Files (x86)\Steam\steam.exe")
}

#[cfg(not(windows))]
fn default_steam_executable() -> PathBuf {
    PathBuf::from("steam")
}

#[cfg(windows)]
fn default_gba_emulator() -> PathBuf {
    PathBuf::from(r"C:\emu\gb\vbam\VisualBoyAdvance-M.exe")
}

#[cfg(not(windows))]
fn default_gba_emulator() -> PathBuf {
    PathBuf::from("visualboyadvance-m")
}

impl AppConfig {
    /// Load from the default config file plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("invalid config {}", path.display()))
    }
}

/// Default location of `config.toml`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// Write a commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    ensure_default_config_at(&path)?;
    Ok(path)
}

/// Write the default config to `path` unless a file is already there.
pub fn ensure_default_config_at(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))
}
