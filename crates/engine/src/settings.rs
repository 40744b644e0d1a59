//! Site-level settings for the metadata subsystem.
//!
//! Loaded from a TOML file when present, compiled defaults otherwise, then
//! `METAFIELD_*` environment variables override individual keys:
//!
//! ```toml
//! wwwroot = "https://lms.example.org"
//! default_language = "en"
//!
//! [course]
//! metadata_enabled = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const ENV_WWWROOT: &str = "METAFIELD_WWWROOT";
pub const ENV_COURSE_METADATA_ENABLED: &str = "METAFIELD_COURSE_METADATA_ENABLED";
pub const ENV_LANGUAGE: &str = "METAFIELD_LANGUAGE";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("wwwroot is not an absolute url: {0}")]
    InvalidWwwroot(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Base URL of the host site.
    pub wwwroot: String,
    /// Used when neither the course nor the request names a language.
    pub default_language: String,
    pub course: CourseContextSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourseContextSettings {
    /// Shows the metadata entry in course navigation.
    pub metadata_enabled: bool,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            wwwroot: "http://localhost".to_string(),
            default_language: "en".to_string(),
            course: CourseContextSettings::default(),
        }
    }
}

impl MetadataSettings {
    /// `wwwroot` as a base URL that relative paths join under.
    pub fn wwwroot_url(&self) -> Result<Url, url::ParseError> {
        if self.wwwroot.ends_with('/') {
            Url::parse(&self.wwwroot)
        } else {
            Url::parse(&format!("{}/", self.wwwroot))
        }
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(wwwroot) = lookup(ENV_WWWROOT) {
            debug!(%wwwroot, "wwwroot overridden from environment");
            self.wwwroot = wwwroot;
        }
        if let Some(language) = lookup(ENV_LANGUAGE) {
            self.default_language = language;
        }
        if let Some(raw) = lookup(ENV_COURSE_METADATA_ENABLED) {
            self.course.metadata_enabled = parse_flag(ENV_COURSE_METADATA_ENABLED, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        match self.wwwroot_url() {
            Ok(url) if url.has_host() => Ok(()),
            _ => Err(SettingsError::InvalidWwwroot(self.wwwroot.clone())),
        }
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, SettingsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

/// Reads `path` (defaults when missing), applies environment overrides and
/// validates the result.
pub fn load_settings(path: &Path) -> Result<MetadataSettings, SettingsError> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<MetadataSettings, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)?
    } else {
        info!(?path, "settings file not found, using defaults");
        MetadataSettings::default()
    };
    settings.apply_overrides(lookup)?;
    settings.validate()?;
    Ok(settings)
}
