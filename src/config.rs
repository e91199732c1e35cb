use std::path::{Path, PathBuf};

use config::{Case, Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[cfg(not(test))]
use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};

/// Tunables for request reconstruction.
///
/// # Examples
///
/// ```toml
/// # How long a thread that released the tag may still contribute samples
/// grace-window-us = 100.0
///
/// # Subtracted from sampled return addresses to reach the call site
/// return-addr-bias = 5
///
/// # Mutex-holder panels with fewer samples than this are treated as noise
/// min-holder-samples = 2
/// ```
///
/// Config file location:
/// - Linux: `$XDG_CONFIG_HOME/tagtrace/config.toml` or `~/.config/tagtrace/config.toml`
/// - macOS: `$XDG_CONFIG_HOME/tagtrace/config.toml` or `~/.config/tagtrace/config.toml`
/// - Windows: `%APPDATA%\tagtrace\config.toml`
///
/// Environment variables: `TAGTRACE_GRACE_WINDOW_US`, `TAGTRACE_RETURN_ADDR_BIAS`,
/// `TAGTRACE_MIN_HOLDER_SAMPLES`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalyzerConfig {
    /// Microseconds after a tag release during which trailing samples count
    pub grace_window_us: f64,

    /// Samples record the return address; the call instruction precedes it.
    ///
    /// 5 is the length of an x86-64 `call rel32`. Other instruction sets (or
    /// indirect calls) need a different value.
    pub return_addr_bias: u64,

    /// Minimum attributed samples for a mutex holder to get its own panel
    pub min_holder_samples: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            grace_window_us: 100.0,
            return_addr_bias: 5,
            min_holder_samples: 2,
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from the user config file and environment variables.
    ///
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. Config file (see struct documentation for platform-specific paths)
    /// 3. Environment variables (TAGTRACE_*)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(get_config_path().as_deref())
    }

    /// Same as [`AnalyzerConfig::load`] with an explicit config file.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("grace-window-us", defaults.grace_window_us)?
            .set_default("return-addr-bias", defaults.return_addr_bias as i64)?
            .set_default("min-holder-samples", defaults.min_holder_samples as i64)?;

        if let Some(path) = config_path
            && path.exists()
        {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("TAGTRACE")
                .prefix_separator("_")
                .convert_case(Case::Kebab)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.grace_window_us.is_finite() || self.grace_window_us < 0.0 {
            return Err(ConfigError::Message(format!(
                "grace-window-us must be a non-negative number, got {}",
                self.grace_window_us
            )));
        }
        Ok(())
    }
}

/// Where the user config file lives, if anywhere.
pub fn get_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("TAGTRACE_CONFIG_PATH") {
        return Some(PathBuf::from(path));
    }

    // Unit tests must never read the developer's real config
    #[cfg(test)]
    return None;

    #[cfg(not(test))]
    {
        let strategy = choose_base_strategy().ok()?;
        Some(strategy.config_dir().join("tagtrace").join("config.toml"))
    }
}
