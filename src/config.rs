use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options passed to the provider SDK's one-time `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub version: String,
    /// Routes every call to the provider's non-production environment.
    pub sandbox: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            sandbox: true,
        }
    }
}

/// What `login()` does while an earlier login has not resolved yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginPolicy {
    /// Both run; the most recently started login's result wins.
    #[default]
    Replace,
    /// The second call fails with `AuthError::LoginInFlight`.
    Reject,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub provider: ProviderConfig,
    pub login_policy: LoginPolicy,
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or
    /// fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string. Missing keys take defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.version.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider.version must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
