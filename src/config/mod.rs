//! Configuration loading
//!
//! Layered via figment: built-in defaults, then an optional TOML file, then
//! `CLOAKSTREAM_`-prefixed environment variables. Every field has a default
//! so a missing config file is never an error.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::scan::MaskPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "cloakstream.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloakstreamConfig {
    /// Directory served by the HTTP boundary; stream targets resolve inside it.
    pub uploads_dir: String,

    /// Bind address for `serve`.
    pub bind_addr: String,

    /// Fail sessions on the first malformed row instead of skipping.
    pub strict: bool,

    /// Detect but never mask.
    pub preserve_pii: bool,

    /// Which PII categories get masked.
    pub mask_policy: MaskPolicy,
}

impl Default for CloakstreamConfig {
    fn default() -> Self {
        Self {
            uploads_dir: "./uploads".to_string(),
            bind_addr: "127.0.0.1:3001".to_string(),
            strict: false,
            preserve_pii: false,
            mask_policy: MaskPolicy::default(),
        }
    }
}

impl CloakstreamConfig {
    /// Load configuration, optionally from an explicit file path.
    ///
    /// With no explicit path, `cloakstream.toml` in the working directory is
    /// used when present and silently skipped otherwise.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = path.unwrap_or(DEFAULT_CONFIG_FILE);
        Figment::from(Serialized::defaults(CloakstreamConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("CLOAKSTREAM_"))
            .extract()
            .with_context(|| format!("failed to load configuration from {file}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CloakstreamConfig::default();
        assert_eq!(config.uploads_dir, "./uploads");
        assert_eq!(config.bind_addr, "127.0.0.1:3001");
        assert!(!config.strict);
        assert!(config.mask_policy.email);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = CloakstreamConfig::load(Some("/nonexistent/cloakstream.toml")).unwrap();
        assert_eq!(config.uploads_dir, "./uploads");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloakstream.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "uploads_dir = \"/srv/data\"\nstrict = true").unwrap();
        writeln!(file, "[mask_policy]\nemail = false").unwrap();

        let config = CloakstreamConfig::load(path.to_str()).unwrap();
        assert_eq!(config.uploads_dir, "/srv/data");
        assert!(config.strict);
        assert!(!config.mask_policy.email);
        // Untouched keys keep their defaults.
        assert_eq!(config.bind_addr, "127.0.0.1:3001");
        assert!(config.mask_policy.phone);
    }
}
