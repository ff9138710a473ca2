//! Bootstrap configuration loading
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! Steps 1 and 2 are handled by each binary's argument parser; this module
//! provides the TOML layer and the compiled defaults. A missing TOML file is
//! not an error: a warning is logged and defaults are used.

use crate::registry::ModelSpec;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CVP_CONFIG";

/// How the final artifact is returned to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Base64 audio bytes in the response body
    #[default]
    Inline,
    /// Server-side file reference for a follow-up download
    Reference,
    /// Both the payload and the file reference
    Both,
}

impl OutputMode {
    pub fn includes_payload(&self) -> bool {
        matches!(self, OutputMode::Inline | OutputMode::Both)
    }

    pub fn includes_reference(&self) -> bool {
        matches!(self, OutputMode::Reference | OutputMode::Both)
    }
}

/// Bootstrap configuration loaded from TOML
///
/// Every field has a default so an empty file (or no file) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Interface to bind the HTTP server to
    pub host: String,

    /// HTTP server port
    pub port: u16,

    /// Root for all working directories (scratch, inputs, outputs)
    pub data_dir: Option<PathBuf>,

    /// Per-request scratch areas are created under this directory
    pub scratch_dir: Option<PathBuf>,

    /// Relative `file` sources are resolved against this directory
    pub input_dir: Option<PathBuf>,

    /// Final artifacts are written here
    pub output_dir: Option<PathBuf>,

    /// Python interpreter with the `clearvoice` package installed
    pub python: String,

    /// Copy (instead of move) the last intermediate and keep the scratch area
    pub retain_intermediates: bool,

    /// Output mode used when the request does not specify one
    pub default_output_mode: OutputMode,

    /// Include the error source chain in error responses
    pub verbose_errors: bool,

    /// Timeout for URL sources
    pub download_timeout_secs: u64,

    /// Size cap for URL sources
    pub max_download_bytes: u64,

    /// Request body size cap (base64 payloads count against it)
    pub max_body_bytes: usize,

    /// Models added to (or overriding) the builtin registry
    pub models: Vec<ModelSpec>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter used when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5730,
            data_dir: None,
            scratch_dir: None,
            input_dir: None,
            output_dir: None,
            python: "python3".to_string(),
            retain_intermediates: false,
            default_output_mode: OutputMode::Inline,
            verbose_errors: false,
            download_timeout_secs: 60,
            max_download_bytes: 256 * 1024 * 1024,
            max_body_bytes: 128 * 1024 * 1024,
            models: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{} in {}", e, path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Data directory, falling back to the platform default
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("scratch"))
    }

    pub fn input_dir(&self) -> PathBuf {
        self.input_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("inputs"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("outputs"))
    }

    /// Create the scratch, input and output directories
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.scratch_dir(), self.input_dir(), self.output_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

/// Load the TOML config
///
/// An explicit path (argument, then `CVP_CONFIG`) must exist. Without one,
/// the platform config file is used when present, otherwise defaults.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config(explicit)? {
        Some(path) => {
            info!("Loading config from {}", path.display());
            TomlConfig::from_file(&path)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Pick the TOML file to load without reading or logging it
///
/// Order: `explicit`, then `CVP_CONFIG`, then the platform config file.
/// An explicitly named file must exist; a missing platform file yields
/// `None`. Binaries call this before their subscriber is installed.
pub fn locate_config(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path));
    }

    Ok(default_config_path().filter(|path| path.exists()))
}

/// Platform config file location (e.g. ~/.config/cvp/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cvp").join("config.toml"))
}

/// OS-dependent default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cvp"))
        .unwrap_or_else(|| PathBuf::from("./cvp_data"))
}
