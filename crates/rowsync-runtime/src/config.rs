#![forbid(unsafe_code)]

//! Consumer-side policy for mirror bindings.
//!
//! [`MirrorConfig`] decides what a [`MirrorBinding`](crate::MirrorBinding)
//! does when a mutation cannot be applied, and whether it checks the
//! advertised window after each apply.
//!
//! With the `policy-config` feature the configuration can be loaded from a
//! TOML or JSON file:
//!
//! ```toml
//! error_policy = "panic"
//! check_window = false
//! ```

use std::env;

/// Environment variable read by [`MirrorConfig::from_env`].
pub const ERROR_POLICY_ENV: &str = "ROWSYNC_ERROR_POLICY";

/// What a binding does when a delivered mutation fails to apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ErrorPolicy {
    /// Log the error, keep the last good state, and ignore further
    /// mutations.
    #[default]
    Halt,
    /// Panic on the spot.
    Panic,
}

impl ErrorPolicy {
    /// Parse a policy name, case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("halt") {
            Some(Self::Halt)
        } else if raw.eq_ignore_ascii_case("panic") {
            Some(Self::Panic)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Halt => "halt",
            Self::Panic => "panic",
        }
    }
}

/// Mirror binding configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "policy-config",
    derive(serde::Deserialize),
    serde(default, deny_unknown_fields)
)]
pub struct MirrorConfig {
    /// Reaction to a failed apply.
    pub error_policy: ErrorPolicy,
    /// Warn when the materialized sections overrun the advertised total.
    pub check_window: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Halt,
            check_window: true,
        }
    }
}

impl MirrorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    #[must_use]
    pub fn with_check_window(mut self, check: bool) -> Self {
        self.check_window = check;
        self
    }

    /// Defaults, with the error policy overridden by `ROWSYNC_ERROR_POLICY`
    /// when it names a known policy.
    #[must_use]
    pub fn from_env() -> Self {
        let raw = env::var(ERROR_POLICY_ENV).ok();
        Self::from_env_value(raw.as_deref())
    }

    fn from_env_value(raw: Option<&str>) -> Self {
        let mut config = Self::default();
        match raw.map(|r| (r, ErrorPolicy::parse(r))) {
            Some((_, Some(policy))) => config.error_policy = policy,
            Some((r, None)) => {
                tracing::warn!(env = ERROR_POLICY_ENV, value = r, "ignoring unknown error policy");
            }
            None => {}
        }
        config
    }
}

#[cfg(feature = "policy-config")]
pub use loading::ConfigError;

#[cfg(feature = "policy-config")]
mod loading {
    use std::path::{Path, PathBuf};

    use super::MirrorConfig;

    /// Failure to load a [`MirrorConfig`] from text or a file.
    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("failed to read {}: {source}", path.display())]
        Io {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("invalid TOML mirror config: {0}")]
        Toml(#[from] toml::de::Error),
        #[error("invalid JSON mirror config: {0}")]
        Json(#[from] serde_json::Error),
        #[error("unsupported config format for {} (expected .toml or .json)", .0.display())]
        UnsupportedFormat(PathBuf),
    }

    impl MirrorConfig {
        /// Parse from TOML text. Missing keys take their defaults.
        pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
            Ok(toml::from_str(text)?)
        }

        /// Parse from JSON text. Missing keys take their defaults.
        pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
            Ok(serde_json::from_str(text)?)
        }

        /// Load from a `.toml` or `.json` file.
        pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
            let path = path.as_ref();
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase);
            let parse: fn(&str) -> Result<Self, ConfigError> = match extension.as_deref() {
                Some("toml") => Self::from_toml_str,
                Some("json") => Self::from_json_str,
                _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
            };
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let config = parse(&text)?;
            tracing::debug!(
                path = %path.display(),
                error_policy = config.error_policy.as_str(),
                check_window = config.check_window,
                "loaded mirror config"
            );
            Ok(config)
        }
    }
}
