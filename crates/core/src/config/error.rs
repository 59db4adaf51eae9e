//! Errors raised while reading the `.qa-pipeline/` directory.
//!
//! Every variant carries the offending path so the CLI can point the user
//! at the file to fix.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// `config.toml` or a pipeline file exists but could not be read.
    #[error("Cannot read .qa-pipeline file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config.toml at {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Malformed pipeline definition at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The `pipelines/` directory could not be listed.
    #[error("Cannot list pipeline definitions in {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Parsed fine, but violates a rule the runner depends on (empty or
    /// repeated step names, duplicate pipelines, zero event buffer).
    #[error("Rejected .qa-pipeline configuration {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_file() {
        let err = ConfigError::InvalidConfig {
            path: PathBuf::from(".qa-pipeline/pipelines/checklist.yaml"),
            reason: "step 'PII Masking' is defined twice".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Rejected .qa-pipeline configuration .qa-pipeline/pipelines/checklist.yaml: step 'PII Masking' is defined twice"
        );

        let err = ConfigError::FileRead {
            path: PathBuf::from(".qa-pipeline/config.toml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("Cannot read .qa-pipeline file .qa-pipeline/config.toml"));
    }
}
