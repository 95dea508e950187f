//! TOML configuration.
//!
//! Search order:
//! 1. an explicit `--config` path
//! 2. `schemaflow.toml` in the working directory
//! 3. `config.toml` in the platform config directory
//! 4. built-in defaults

use std::fs;
use std::path::Path;

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::layout::LayoutConfig;

pub const LOCAL_CONFIG_FILE: &str = "schemaflow.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    pub serve: ServeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            background: "white".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5151,
        }
    }
}

impl AppConfig {
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.layout.validate()?;
        Ok(config)
    }
}

pub fn load_config(explicit_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit_path {
        info!("loading configuration from {}", path.display());
        return load_config_file(path);
    }

    let local = Path::new(LOCAL_CONFIG_FILE);
    if local.exists() {
        info!("loading configuration from {}", local.display());
        return load_config_file(local);
    }

    if let Some(dirs) = ProjectDirs::from("", "", "schemaflow") {
        let system = dirs.config_dir().join("config.toml");
        if system.exists() {
            info!("loading configuration from {}", system.display());
            return load_config_file(&system);
        }
        debug!("no configuration at {}", system.display());
    }

    debug!("no configuration file found, using defaults");
    Ok(AppConfig::default())
}

fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }

    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    AppConfig::from_toml(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Direction;
    use crate::layout::LayoutEngineKind;

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [layout]
            engine = "layered"
            direction = "LR"
            node_width = 200.0

            [serve]
            port = 8080
            "#,
            Path::new("inline.toml"),
        )
        .unwrap();

        assert_eq!(config.layout.engine, LayoutEngineKind::Layered);
        assert_eq!(config.layout.direction, Direction::LeftToRight);
        assert_eq!(config.layout.node_width, 200.0);
        assert_eq!(config.layout.node_height, 36.0);
        assert_eq!(config.serve.port, 8080);
        assert_eq!(config.serve.host, "127.0.0.1");
        assert_eq!(config.render.background, "white");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AppConfig::from_toml("[layout]\nnode_height = -1.0\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Layout(_)));

        let err = AppConfig::from_toml("[layout\n", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }
}
