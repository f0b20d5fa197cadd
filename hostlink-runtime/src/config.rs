use std::path::{Path, PathBuf};

use hostlink_abi::handles;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Runtime settings, loaded from `hostlink.toml`. Every table and key is
/// optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub heap: HeapConfig,
    pub canvas: CanvasConfig,
    pub resources: ResourceConfig,
    pub console: ConsoleConfig,
    pub trace: TraceConfig,
    pub clock: ClockConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Size of the never-reclaimed low range of the handle table,
    /// sentinels included.
    pub reserved_slots: u32,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            reserved_slots: handles::DEFAULT_RESERVED_SLOTS,
        }
    }
}

/// The canvas element present in the document at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub id: String,
    pub width: u32,
    pub height: u32,
    pub client_width: i32,
    pub client_height: i32,
    pub device_pixel_ratio: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            id: "canvas".to_string(),
            width: 300,
            height: 150,
            client_width: 300,
            client_height: 150,
            device_pixel_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Directory that relative `fetch` URLs resolve against.
    pub root: PathBuf,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Console lines retained per session.
    pub capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Recent graphics calls retained per context.
    pub capacity: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// `performance.now()` follows the monotonic system clock.
    #[default]
    System,
    /// `performance.now()` follows the timestamps passed to `frame`.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub mode: ClockMode,
    /// Seed for `Math.random()`; entropy when absent.
    pub random_seed: Option<u64>,
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heap.reserved_slots < handles::SENTINEL_COUNT {
            return Err(ConfigError::Invalid(format!(
                "heap.reserved_slots must be at least {}",
                handles::SENTINEL_COUNT
            )));
        }
        if self.canvas.id.is_empty() {
            return Err(ConfigError::Invalid("canvas.id must not be empty".into()));
        }
        if !(self.canvas.device_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(
                "canvas.device_pixel_ratio must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.heap.reserved_slots, 128);
        assert_eq!(config.clock.mode, ClockMode::System);
    }

    #[test]
    fn test_partial_tables() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [canvas]
            id = "glcanvas"
            width = 1280

            [clock]
            mode = "manual"
            random_seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.canvas.id, "glcanvas");
        assert_eq!(config.canvas.width, 1280);
        assert_eq!(config.canvas.height, 150);
        assert_eq!(config.clock.mode, ClockMode::Manual);
        assert_eq!(config.clock.random_seed, Some(7));
    }

    #[test]
    fn test_validation() {
        let err = RuntimeConfig::from_toml_str("[heap]\nreserved_slots = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(RuntimeConfig::from_toml_str("[canvas]\ndevice_pixel_ratio = 0.0").is_err());
        assert!(matches!(
            RuntimeConfig::from_toml_str("[heap]\nreserved_slots = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostlink.toml");
        let mut config = RuntimeConfig::default();
        config.console.capacity = 16;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(RuntimeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::load(Path::new("/nonexistent/hostlink.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
