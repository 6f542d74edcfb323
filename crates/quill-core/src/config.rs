//! Configuration management for Quill tools.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (QUILL__ prefix, `__` separator)
//! 2. Config file (quill.toml by default)
//! 3. Defaults of the requested section type

use serde::de::DeserializeOwned;

use crate::error::CoreError;

/// Environment variable prefix for all sections.
pub const ENV_PREFIX: &str = "QUILL";

/// Default config file prefix (`quill.toml`, `quill.yaml`, ...).
pub const DEFAULT_FILE_PREFIX: &str = "quill";

/// Build the layered configuration source.
pub fn layered(file_prefix: &str) -> Result<config::Config, CoreError> {
    config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| CoreError::Config(e.to_string()))
}

/// Load one section (e.g. `api`, `ingest`). A missing section yields its defaults;
/// a present but malformed one is an error.
pub fn load_section<T>(file_prefix: &str, section: &str) -> Result<T, CoreError>
where
    T: DeserializeOwned + Default,
{
    let cfg = layered(file_prefix)?;
    match cfg.get::<T>(section) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section, "Config section not found, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(CoreError::Config(format!("[{section}]: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Sample {
        #[serde(default)]
        name: String,
        #[serde(default)]
        retries: u32,
    }

    #[test]
    fn test_missing_file_and_section_fall_back_to_defaults() {
        let sample: Sample = load_section("does-not-exist-quill", "sample").unwrap();
        assert_eq!(sample, Sample::default());
    }

    #[test]
    fn test_reads_section_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill-test.toml");
        std::fs::write(&path, "[sample]\nname = \"lighthouse\"\nretries = 3\n").unwrap();

        let prefix = dir.path().join("quill-test");
        let sample: Sample = load_section(prefix.to_str().unwrap(), "sample").unwrap();
        assert_eq!(sample.name, "lighthouse");
        assert_eq!(sample.retries, 3);
    }

    #[test]
    fn test_malformed_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill-bad.toml");
        std::fs::write(&path, "[sample]\nretries = \"many\"\n").unwrap();

        let prefix = dir.path().join("quill-bad");
        let result: Result<Sample, _> = load_section(prefix.to_str().unwrap(), "sample");
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
