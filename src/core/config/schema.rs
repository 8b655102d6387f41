//! core::config::schema
//!
//! Configuration file schema.
//!
//! # Example
//!
//! ```toml
//! [browse]
//! page_size = 64
//! max_pages = 4096
//!
//! [serialization]
//! pretty = true
//! default_provider = "json"
//!
//! [space]
//! namespace = 2
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Serializer providers known to [`create_serializer`](crate::serializer::create_serializer).
pub const SERIALIZER_PROVIDERS: &[&str] = &["memory", "json"];

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub browse: BrowseConfig,
    pub serialization: SerializationConfig,
    pub space: SpaceConfig,
}

impl FileConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.browse.validate()?;
        self.serialization.validate()?;
        Ok(())
    }
}

/// Store browsing limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowseConfig {
    /// Results per page returned by the reference store.
    pub page_size: usize,
    /// Upper bound on pages followed for one browse.
    pub max_pages: usize,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            page_size: 64,
            max_pages: 4096,
        }
    }
}

impl BrowseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "browse.page_size must be greater than zero".into(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidValue(
                "browse.max_pages must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Serializer defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerializationConfig {
    /// Pretty-print JSON documents.
    pub pretty: bool,
    /// Provider used when none is named explicitly.
    pub default_provider: String,
}

impl Default for SerializationConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            default_provider: "memory".into(),
        }
    }
}

impl SerializationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SERIALIZER_PROVIDERS.contains(&self.default_provider.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "serialization.default_provider must be one of {:?}, got '{}'",
                SERIALIZER_PROVIDERS, self.default_provider
            )));
        }
        Ok(())
    }
}

/// Address space settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpaceConfig {
    /// Namespace index for generated node ids.
    pub namespace: u16,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self { namespace: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FileConfig::default();
        assert_eq!(config.browse.page_size, 64);
        assert_eq!(config.browse.max_pages, 4096);
        assert!(config.serialization.pretty);
        assert_eq!(config.serialization.default_provider, "memory");
        assert_eq!(config.space.namespace, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: FileConfig = toml::from_str("[browse]\npage_size = 8\n").unwrap();
        assert_eq!(config.browse.page_size, 8);
        assert_eq!(config.browse.max_pages, 4096);
        assert_eq!(config.space.namespace, 1);
    }

    #[test]
    fn zero_page_size_rejected() {
        let config: FileConfig = toml::from_str("[browse]\npage_size = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let config: FileConfig =
            toml::from_str("[serialization]\ndefault_provider = \"xml\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let result: Result<FileConfig, _> = toml::from_str("[browse]\npagesize = 3\n");
        assert!(result.is_err());
    }

    #[test]
    fn roundtrip() {
        let mut config = FileConfig::default();
        config.space.namespace = 7;
        config.serialization.default_provider = "json".into();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: FileConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
