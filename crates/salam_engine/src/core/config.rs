//! # Bootstrap Configuration
//!
//! Everything the bootstrap needs to know before it touches the window system
//! or the driver. The defaults reproduce the compiled-in behaviour (an 800x600
//! window titled "Salam", Vulkan 1.3, diagnostics in debug builds), and a
//! `salam.toml` / `salam.ron` file can override any of it.

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// # Window Configuration
///
/// Parameters for the single application window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial client-area width in screen coordinates
    pub width: u32,
    /// Initial client-area height in screen coordinates
    pub height: u32,
    /// Create the window hidden; no surface exists until it is shown
    pub start_hidden: bool,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl WindowConfig {
    /// Create a window configuration with the given title and size
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Self::default()
        }
    }

    /// Start the window hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.start_hidden = true;
        self
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Salam".to_string(),
            width: 800,
            height: 600,
            start_hidden: false,
            resizable: true,
        }
    }
}

/// # Application Configuration
///
/// Application metadata handed to the driver at instance creation, and
/// whether driver diagnostics are wanted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name reported to the driver
    pub name: String,
    /// Application version (major, minor, patch)
    pub version: (u32, u32, u32),
    /// Requested Vulkan API version (major, minor)
    pub api_version: (u32, u32),
    /// Enable the validation layer and debug messenger; `None` follows the build type
    pub enable_diagnostics: Option<bool>,
}

impl ApplicationConfig {
    /// Whether diagnostics end up enabled for this build
    pub fn diagnostics_enabled(&self) -> bool {
        self.enable_diagnostics.unwrap_or(cfg!(debug_assertions))
    }

    /// Enable or disable diagnostics explicitly
    #[must_use]
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.enable_diagnostics = Some(enabled);
        self
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Salam".to_string(),
            version: (1, 0, 0),
            api_version: (1, 3),
            enable_diagnostics: None,
        }
    }
}

/// # Bootstrap Configuration
///
/// Top-level configuration consumed by [`crate::Bootstrap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Window parameters
    pub window: WindowConfig,
    /// Driver-facing application metadata
    pub application: ApplicationConfig,
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl BootstrapConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.title.is_empty() {
            return Err(ConfigError::Invalid("window title cannot be empty".to_string()));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if self.application.name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }

        match self.application.api_version {
            (1, 0..=3) => {}
            (major, minor) => {
                return Err(ConfigError::Invalid(format!(
                    "unsupported Vulkan API version {major}.{minor}"
                )))
            }
        }

        Ok(())
    }

    /// Load and validate `path`, or the defaults when the file doesn't exist
    pub fn load_validated(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let config = Self::load_or_default(path)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            application: ApplicationConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config for BootstrapConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_compiled_in_window() {
        let config = BootstrapConfig::default();
        assert_eq!(config.window.title, "Salam");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert!(!config.window.start_hidden);
        assert_eq!(config.application.api_version, (1, 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut config = BootstrapConfig::default();
        config.window.height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unsupported_api_version_rejected() {
        let mut config = BootstrapConfig::default();
        config.application.api_version = (2, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: BootstrapConfig = toml::from_str(
            r#"
            [window]
            title = "Probe"
            start_hidden = true
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "Probe");
        assert!(config.window.start_hidden);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.application, ApplicationConfig::default());
    }

    #[test]
    fn test_diagnostics_override() {
        let app = ApplicationConfig::default().with_diagnostics(false);
        assert!(!app.diagnostics_enabled());
    }
}
