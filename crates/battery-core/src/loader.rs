use crate::binder::bind_config;
use crate::{Config, ConfigError, ConfigFormatError};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Encoding of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEncoding {
    Yaml,
    Json,
}

impl DocumentEncoding {
    /// `.json` files are JSON; anything else is read as YAML, which also
    /// accepts JSON documents.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentEncoding::Json,
            _ => DocumentEncoding::Yaml,
        }
    }
}

pub fn parse_document(raw: &str, encoding: DocumentEncoding) -> Result<Value, ConfigFormatError> {
    match encoding {
        DocumentEncoding::Json => {
            serde_json::from_str(raw).map_err(|e| ConfigFormatError::new("<root>", e.to_string()))
        }
        DocumentEncoding::Yaml => {
            serde_yaml::from_str(raw).map_err(|e| ConfigFormatError::new("<root>", e.to_string()))
        }
    }
}

pub fn parse_config_str(raw: &str, encoding: DocumentEncoding) -> Result<Config, ConfigFormatError> {
    bind_config(parse_document(raw, encoding)?)
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config_str(&raw, DocumentEncoding::from_path(path)).map_err(|source| {
        ConfigError::Format {
            path: path.display().to_string(),
            source,
        }
    })
}
