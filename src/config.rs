//! Configuration for the Tessera shell
//!
//! Loads configuration from TOML file at `~/.config/tessera/shell.toml`
//! (or `$TESSERA_CONFIG`). Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where shell assets (icons, background pattern) are installed
pub const DATADIR: &str = "/usr/share/tessera";

/// Where the default terminal launcher lives
pub const BINDIR: &str = "/usr/bin";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default, rename = "launcher", skip_serializing_if = "Vec::is_empty")]
    pub launchers: Vec<LauncherConfig>,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            // Auto-generate default config file
            if let Err(e) = Self::save_default(config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("TESSERA_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("tessera");

        Ok(config_dir.join("shell.toml"))
    }

    /// Save default configuration to file
    fn save_default(path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let default_config = Self::default();
        let toml_string = toml::to_string_pretty(&default_config)
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string)
            .context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }

    /// Launchers to install on every panel.
    ///
    /// Sections missing `icon` or `path` are skipped. With no usable
    /// section a single terminal launcher is returned.
    pub fn valid_launchers(&self) -> Vec<ValidLauncher> {
        let mut launchers = Vec::new();

        for section in &self.launchers {
            match (&section.icon, &section.path) {
                (Some(icon), Some(path)) => launchers.push(ValidLauncher {
                    icon: icon.clone(),
                    path: path.clone(),
                }),
                _ => warn!("invalid launcher section: {:?}", section),
            }
        }

        if launchers.is_empty() {
            launchers.push(ValidLauncher::default_terminal());
        }

        launchers
    }
}

/// `[shell]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ShellConfig {
    /// Show the unlock dialog when the compositor locks
    pub locking: bool,
    /// Panel fill (ARGB)
    pub panel_color: u32,
    /// Taskbar fill (ARGB)
    pub taskbar_color: u32,
    /// Background fill when no image is painted (ARGB)
    pub background_color: u32,
    /// Background image path
    pub background_image: String,
    /// "scale", "scale-crop" or "tile"
    pub background_type: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            locking: true,
            panel_color: 0xaa000000,
            taskbar_color: 0xaabbbbbb,
            background_color: 0xff002244,
            background_image: format!("{}/pattern.png", DATADIR),
            background_type: "tile".to_string(),
        }
    }
}

impl ShellConfig {
    /// Parsed background type; `None` means image painting is disabled
    pub fn background_mode(&self) -> Option<BackgroundMode> {
        let mode = BackgroundMode::parse(&self.background_type);
        if mode.is_none() {
            warn!("invalid background-type: {}", self.background_type);
        }
        mode
    }
}

/// How the background image fills its surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMode {
    Scale,
    ScaleCrop,
    Tile,
}

impl BackgroundMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scale" => Some(Self::Scale),
            "scale-crop" => Some(Self::ScaleCrop),
            "tile" => Some(Self::Tile),
            _ => None,
        }
    }
}

/// One `[[launcher]]` entry as written in the file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub icon: Option<String>,
    pub path: Option<String>,
}

/// A launcher entry with both required fields present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidLauncher {
    pub icon: String,
    pub path: String,
}

impl ValidLauncher {
    pub fn default_terminal() -> Self {
        Self {
            icon: format!("{}/terminal.png", DATADIR),
            path: format!("{}/tessera-terminal", BINDIR),
        }
    }
}
