//! Analysis configuration.
//!
//! Loaded from a TOML file (`trail.toml` by convention); every key is
//! optional and falls back to the defaults below.
//!
//! ```toml
//! conflict-policy = "report"
//! box-primitive-guards = true
//! fold-literals = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration or navigator manifests.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("malformed type name `{0}`")]
    BadType(String),
    #[error("unknown class `{class}` referenced by {context}")]
    UnknownClass { class: String, context: String },
    #[error("navigator on `{declaring}`: {reason}")]
    BadNavigator { declaring: String, reason: String },
}

/// What the navigator registry does when a second navigator is registered
/// for an occupied (type, axis, test) slot. The first registration is kept
/// either way.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Drop the newcomer silently.
    #[default]
    FirstWins,
    /// Drop the newcomer and surface a warning diagnostic.
    Report,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SemaConfig {
    pub conflict_policy: ConflictPolicy,
    /// Box primitive chain links so they can take part in null guards.
    /// When off, primitive links are never guarded since they cannot be null.
    pub box_primitive_guards: bool,
    /// Fold numeric operations whose operands are both literals.
    pub fold_literals: bool,
}

impl Default for SemaConfig {
    fn default() -> Self {
        SemaConfig {
            conflict_policy: ConflictPolicy::FirstWins,
            box_primitive_guards: true,
            fold_literals: true,
        }
    }
}

impl SemaConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = read(path)?;
        Self::from_toml_str(&src)
    }
}

pub(crate) fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
