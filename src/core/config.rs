use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_path: Option<PathBuf>,          // None keeps everything in memory

    pub chunk_size_threshold: usize,            // Posting chunk body size that triggers a split
    pub value_chunk_size_threshold: usize,      // Same for value stream chunks

    pub flush_threshold: usize,                 // Buffered document changes before auto commit
    pub max_revisions: usize,                   // Revisions kept addressable by number
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: None,
            chunk_size_threshold: 2000,
            value_chunk_size_threshold: 2000,
            flush_threshold: 10_000,
            max_revisions: 16,
        }
    }
}

impl Config {
    pub fn in_dir(path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: Some(path.into()),
            ..Config::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// `TERMSTORE_FLUSH_THRESHOLD` overrides the flush threshold when it parses.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(value) = std::env::var("TERMSTORE_FLUSH_THRESHOLD")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&v| v > 0)
        {
            self.flush_threshold = value;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size_threshold == 0 || self.value_chunk_size_threshold == 0 {
            return Err(Error::invalid_argument("chunk size thresholds must be positive"));
        }
        if self.flush_threshold == 0 {
            return Err(Error::invalid_argument("flush_threshold must be positive"));
        }
        if self.max_revisions == 0 {
            return Err(Error::invalid_argument("max_revisions must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chunk_size_threshold": 64 }}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.chunk_size_threshold, 64);
        assert_eq!(config.value_chunk_size_threshold, 2000);
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "flush_threshold": 0 }}"#).unwrap();

        let err = Config::from_json_file(file.path()).unwrap_err();
        assert_eq!(err.kind, crate::core::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn flush_threshold_follows_the_environment() {
        let set = |value: &str| unsafe { std::env::set_var("TERMSTORE_FLUSH_THRESHOLD", value) };

        set(" 250 ");
        assert_eq!(Config::default().with_env_overrides().flush_threshold, 250);

        set("lots");
        assert_eq!(Config::default().with_env_overrides().flush_threshold, 10_000);

        set("0");
        assert_eq!(Config::default().with_env_overrides().flush_threshold, 10_000);

        unsafe { std::env::remove_var("TERMSTORE_FLUSH_THRESHOLD") };
        assert_eq!(Config::default().with_env_overrides().flush_threshold, 10_000);
    }
}
