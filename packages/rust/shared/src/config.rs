//! Application configuration for techtree.
//!
//! User config lives at `~/.techtree/techtree.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TechTreeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "techtree.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".techtree";

/// Edge colours cycled through by the graph export (solarized accents).
pub const DEFAULT_PALETTE: [&str; 8] = [
    "#b58900", // yellow
    "#cb4b16", // orange
    "#dc322f", // red
    "#d33682", // magenta
    "#6c71c4", // violet
    "#268bd2", // blue
    "#2aa198", // cyan
    "#859900", // green
];

// ---------------------------------------------------------------------------
// Config structs (matching techtree.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// File locations.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Graph rendering settings.
    #[serde(default)]
    pub render: RenderConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Route file holding the persisted steps.
    #[serde(default = "default_route_file")]
    pub route_file: String,

    /// Directory holding the search index database.
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    /// Directory rendered graphs are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            route_file: default_route_file(),
            index_dir: default_index_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_route_file() -> String {
    "route.json".into()
}
fn default_index_dir() -> String {
    "db".into()
}
fn default_output_dir() -> String {
    "output".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum hits returned per corpus.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

fn default_limit() -> u32 {
    10
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Graphviz layout engine.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Output image format.
    #[serde(default = "default_format")]
    pub format: String,

    /// Open the rendered image after export.
    #[serde(default)]
    pub view: bool,

    /// Edge colours, cycled in edge order.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            format: default_format(),
            view: false,
            palette: default_palette(),
        }
    }
}

fn default_engine() -> String {
    "dot".into()
}
fn default_format() -> String {
    "png".into()
}
fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.techtree/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TechTreeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.techtree/techtree.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TechTreeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TechTreeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TechTreeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TechTreeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TechTreeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings the search and export paths cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.search.limit == 0 {
        return Err(TechTreeError::config("search.limit must be at least 1"));
    }
    if config.render.palette.is_empty() {
        return Err(TechTreeError::config("render.palette must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("route_file"));
        assert!(toml_str.contains("#b58900"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.search.limit, 10);
        assert_eq!(parsed.render.palette.len(), DEFAULT_PALETTE.len());
        assert_eq!(parsed.defaults.index_dir, "db");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[defaults]
route_file = "factorio.json"

[render]
format = "svg"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.route_file, "factorio.json");
        assert_eq!(config.defaults.output_dir, "output");
        assert_eq!(config.render.format, "svg");
        assert_eq!(config.render.engine, "dot");
        assert!(!config.render.view);
    }

    #[test]
    fn empty_palette_rejected() {
        let mut config = AppConfig::default();
        config.render.palette.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("palette"));
    }

    #[test]
    fn zero_limit_rejected() {
        let mut config = AppConfig::default();
        config.search.limit = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn load_from_file_validates() {
        let path = std::env::temp_dir().join(format!(
            "techtree_cfg_{}_{}.toml",
            std::process::id(),
            line!()
        ));
        std::fs::write(&path, "[search]\nlimit = 0\n").expect("write config");
        let result = load_config_from(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.unwrap_err().to_string().contains("search.limit"));
    }
}
