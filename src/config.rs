//! Engine configuration

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Storage, tool and resource configuration for the conversion engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the artifact store; `uploads/` and `converted/` live below it
    pub storage_dir: PathBuf,
    /// LibreOffice executable used for office-engine conversions
    pub office_binary: String,
    /// ImageMagick executable used to rasterize PDF pages
    pub rasterizer_binary: String,
    /// Ghostscript executable used for PDF compression
    pub compressor_binary: String,
    /// Wall-clock limit for a single external tool invocation (default: 120s)
    pub tool_timeout: Duration,
    /// Maximum accepted input size in bytes (default: 25MB)
    pub max_input_bytes: u64,
    /// Directories source paths must live under. Empty means no restriction.
    pub resource_dirs: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./storage"),
            office_binary: "soffice".to_string(),
            rasterizer_binary: "convert".to_string(),
            compressor_binary: "gs".to_string(),
            tool_timeout: Duration::from_secs(120),
            max_input_bytes: 25 * 1024 * 1024, // 25MB
            resource_dirs: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Build a config from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(bin) = lookup("DOCSHIFT_SOFFICE") {
            config.office_binary = bin;
        }
        if let Some(bin) = lookup("DOCSHIFT_CONVERT") {
            config.rasterizer_binary = bin;
        }
        if let Some(bin) = lookup("DOCSHIFT_GS") {
            config.compressor_binary = bin;
        }
        if let Some(secs) = lookup("DOCSHIFT_TOOL_TIMEOUT_SECS") {
            let secs: u64 = parse_number("DOCSHIFT_TOOL_TIMEOUT_SECS", &secs)?;
            if secs == 0 {
                return Err(Error::Config {
                    reason: "DOCSHIFT_TOOL_TIMEOUT_SECS must be positive".to_string(),
                });
            }
            config.tool_timeout = Duration::from_secs(secs);
        }
        if let Some(max) = lookup("DOCSHIFT_MAX_INPUT_BYTES") {
            config.max_input_bytes = parse_number("DOCSHIFT_MAX_INPUT_BYTES", &max)?;
        }
        if let Some(dirs) = lookup("DOCSHIFT_RESOURCE_DIRS") {
            config.resource_dirs = dirs
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.storage_dir.join("uploads")
    }

    pub fn converted_dir(&self) -> PathBuf {
        self.storage_dir.join("converted")
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| Error::Config {
        reason: format!("{} must be a non-negative integer, got {:?}", key, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from("./storage"));
        assert_eq!(config.office_binary, "soffice");
        assert_eq!(config.rasterizer_binary, "convert");
        assert_eq!(config.compressor_binary, "gs");
        assert_eq!(config.tool_timeout, Duration::from_secs(120));
        assert_eq!(config.max_input_bytes, 25 * 1024 * 1024);
        assert!(config.resource_dirs.is_empty());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            ("STORAGE_DIR", "/app/storage"),
            ("DOCSHIFT_SOFFICE", "/opt/libreoffice/program/soffice"),
            ("DOCSHIFT_TOOL_TIMEOUT_SECS", "30"),
            ("DOCSHIFT_MAX_INPUT_BYTES", "1024"),
            ("DOCSHIFT_RESOURCE_DIRS", "/data/in, /data/shared,"),
        ]))
        .unwrap();

        assert_eq!(config.storage_dir, PathBuf::from("/app/storage"));
        assert_eq!(config.uploads_dir(), PathBuf::from("/app/storage/uploads"));
        assert_eq!(config.converted_dir(), PathBuf::from("/app/storage/converted"));
        assert_eq!(config.office_binary, "/opt/libreoffice/program/soffice");
        assert_eq!(config.rasterizer_binary, "convert");
        assert_eq!(config.tool_timeout, Duration::from_secs(30));
        assert_eq!(config.max_input_bytes, 1024);
        assert_eq!(config.resource_dirs, vec!["/data/in", "/data/shared"]);
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let err = EngineConfig::from_lookup(lookup_from(&[("DOCSHIFT_TOOL_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));

        let err = EngineConfig::from_lookup(lookup_from(&[("DOCSHIFT_TOOL_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
