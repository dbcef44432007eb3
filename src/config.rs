//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const APP_DIR: &str = "ssculpt";
const CONFIG_ENV_VAR: &str = "SSCULPT_CONFIG_DIR"; // Environment variable name
const API_KEY_ENV_VAR: &str = "SSCULPT_USDA_API_KEY";

pub const DEFAULT_LOOKUP_URL: &str = "https://api.nal.usda.gov/fdc/v1/foods/search";
pub const DEFAULT_CACHE_NAME: &str = "ssculpt-cache-v4";

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("Invalid URL in config ({field}): {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Metric, // kg
    #[default]
    Imperial, // lbs
}

impl Units {
    pub const fn weight_label(self) -> &'static str {
        match self {
            Self::Metric => "kg",
            Self::Imperial => "lbs",
        }
    }
}

// Define standard colors using strum for easy iteration/parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    Grey,
}

impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Self::Black,
            StandardColor::Red => Self::Red,
            StandardColor::Green => Self::Green,
            StandardColor::Yellow => Self::Yellow,
            StandardColor::Blue => Self::Blue,
            StandardColor::Magenta => Self::Magenta,
            StandardColor::Cyan => Self::Cyan,
            StandardColor::White => Self::White,
            StandardColor::DarkGrey => Self::DarkGrey,
            StandardColor::DarkRed => Self::DarkRed,
            StandardColor::DarkGreen => Self::DarkGreen,
            StandardColor::DarkYellow => Self::DarkYellow,
            StandardColor::DarkBlue => Self::DarkBlue,
            StandardColor::DarkMagenta => Self::DarkMagenta,
            StandardColor::DarkCyan => Self::DarkCyan,
            StandardColor::Grey => Self::Grey,
        }
    }
}

pub fn parse_color(color_str: &str) -> Result<StandardColor, Error> {
    StandardColor::iter()
        .find(|color| format!("{color:?}").eq_ignore_ascii_case(color_str))
        .ok_or_else(|| Error::InvalidColor(color_str.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Theme {
    pub header_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_color: "Green".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Config {
    pub units: Units,

    // Nutrient lookup
    pub usda_api_key: Option<String>,
    pub lookup_base_url: String,
    pub lookup_data_types: String,
    pub lookup_timeout_secs: u64,

    // Offline asset cache
    pub asset_base_url: String,
    pub cache_name: String,

    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            units: Units::default(),
            usda_api_key: None,
            lookup_base_url: DEFAULT_LOOKUP_URL.to_string(),
            lookup_data_types: "Branded,Survey (FNDDS),Foundation".to_string(),
            lookup_timeout_secs: 15,
            asset_base_url: "http://localhost:8080/".to_string(),
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// The API key from the config file, falling back to the environment.
    pub fn api_key(&self) -> Option<String> {
        self.usda_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV_VAR).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// # Errors
    /// Returns `Error::InvalidUrl` if `lookup_base_url` does not parse.
    pub fn lookup_url(&self) -> Result<Url, Error> {
        Url::parse(&self.lookup_base_url).map_err(|source| Error::InvalidUrl {
            field: "lookup_base_url",
            source,
        })
    }

    /// # Errors
    /// Returns `Error::InvalidUrl` if `asset_base_url` does not parse.
    pub fn asset_base(&self) -> Result<Url, Error> {
        Url::parse(&self.asset_base_url).map_err(|source| Error::InvalidUrl {
            field: "asset_base_url",
            source,
        })
    }

    /// # Errors
    /// Returns `Error::InvalidColor` for an unknown theme colour.
    pub fn header_color(&self) -> Result<Color, Error> {
        parse_color(&self.theme.header_color).map(Color::from)
    }
}

/// Determines the path to the configuration file, creating its directory.
pub fn get_config_path() -> Result<PathBuf, Error> {
    let config_dir_override = std::env::var(CONFIG_ENV_VAR).ok();

    let config_dir_path = if let Some(path_str) = config_dir_override {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            warn!(
                "Environment variable {} points to '{}', which is not a directory. Trying to create it.",
                CONFIG_ENV_VAR,
                path.display()
            );
            fs::create_dir_all(&path)?;
        }
        path
    } else {
        let base_config_dir = dirs::config_dir().ok_or(Error::CannotDetermineConfigDir)?;
        base_config_dir.join(APP_DIR)
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration, writing defaults out if the file does not exist yet.
pub fn load(config_path: &Path) -> Result<Config, Error> {
    if config_path.exists() {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content)?;
        debug!("Loaded config from {}", config_path.display());
        Ok(config)
    } else {
        let default_config = Config::default();
        save(config_path, &default_config)?;
        Ok(default_config)
    }
}

pub fn save(config_path: &Path, config: &Config) -> Result<(), Error> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config)?;
    fs::write(config_path, config_content)?;
    Ok(())
}
