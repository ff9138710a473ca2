//! Runtime configuration for cvp-enhance
//!
//! Resolved once at startup from the bootstrap [`TomlConfig`] (after CLI and
//! environment overrides have been applied to it) and shared read-only.

use cvp_common::{OutputMode, TomlConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Route the output directory is served under
pub const OUTPUTS_ROUTE: &str = "/outputs";

/// Service settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub scratch_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub retain_intermediates: bool,
    pub default_output_mode: OutputMode,
    pub verbose_errors: bool,
    pub download_timeout: Duration,
    pub max_download_bytes: u64,
    pub max_body_bytes: usize,
}

impl ServiceConfig {
    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            scratch_dir: config.scratch_dir(),
            input_dir: config.input_dir(),
            output_dir: config.output_dir(),
            retain_intermediates: config.retain_intermediates,
            default_output_mode: config.default_output_mode,
            verbose_errors: config.verbose_errors,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            max_download_bytes: config.max_download_bytes,
            max_body_bytes: config.max_body_bytes,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}
