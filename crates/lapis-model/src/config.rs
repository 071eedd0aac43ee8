use std::path::Path;

use lapis_types::validate_prefix;
use serde::{Deserialize, Serialize};

use crate::error::{LapisError, LapisResult};
use crate::resolver::DEFAULT_MAX_ALIAS_HOPS;

/// Configuration for an [`Infrastructure`](crate::Infrastructure).
///
/// Loaded from TOML; every field is optional.
///
/// ```toml
/// prefix = "10876"
/// identifier_infix = "test-"
/// max_alias_hops = 8
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfraConfig {
    /// Prefix for randomly generated identifiers.
    pub prefix: Option<String>,
    /// Inserted between prefix and suffix of every identifier handled.
    pub identifier_infix: Option<String>,
    /// Seed for the identifier generator. Unset means OS entropy.
    pub random_seed: Option<u64>,
    /// Maximum alias hops followed by one lookup.
    pub max_alias_hops: u32,
    /// Attempts at finding an unused random identifier.
    pub max_create_attempts: u32,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            identifier_infix: None,
            random_seed: None,
            max_alias_hops: DEFAULT_MAX_ALIAS_HOPS,
            max_create_attempts: 64,
        }
    }
}

impl InfraConfig {
    /// A configuration generating identifiers under `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Default::default()
        }
    }

    pub fn from_toml_str(s: &str) -> LapisResult<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| LapisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LapisResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LapisError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> LapisResult<()> {
        if let Some(prefix) = &self.prefix {
            validate_prefix(prefix).map_err(|e| LapisError::Config(e.to_string()))?;
        }
        if let Some(infix) = &self.identifier_infix {
            if infix.contains('/') {
                return Err(LapisError::Config(format!(
                    "identifier infix must not contain '/': {infix:?}"
                )));
            }
        }
        if self.max_alias_hops == 0 {
            return Err(LapisError::Config("max_alias_hops must be at least 1".into()));
        }
        if self.max_create_attempts == 0 {
            return Err(LapisError::Config(
                "max_create_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = InfraConfig::default();
        assert!(c.prefix.is_none());
        assert_eq!(c.max_alias_hops, 16);
        assert_eq!(c.max_create_attempts, 64);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let c = InfraConfig::from_toml_str("prefix = \"10876\"\nrandom_seed = 7\n").unwrap();
        assert_eq!(c.prefix.as_deref(), Some("10876"));
        assert_eq!(c.random_seed, Some(7));
        assert_eq!(c.max_alias_hops, 16);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            InfraConfig::from_toml_str("prefix = \"abc\""),
            Err(LapisError::Config(_))
        ));
        assert!(matches!(
            InfraConfig::from_toml_str("max_alias_hops = 0"),
            Err(LapisError::Config(_))
        ));
        assert!(matches!(
            InfraConfig::from_toml_str("identifier_infix = \"a/b\""),
            Err(LapisError::Config(_))
        ));
        assert!(matches!(
            InfraConfig::from_toml_str("prefix = 12"),
            Err(LapisError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lapis.toml");
        std::fs::write(&path, "prefix = \"0.TEST\"\nmax_create_attempts = 3\n").unwrap();
        let c = InfraConfig::load(&path).unwrap();
        assert_eq!(c, InfraConfig {
            prefix: Some("0.TEST".into()),
            max_create_attempts: 3,
            ..Default::default()
        });
        assert!(InfraConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
