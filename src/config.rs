//! Layered settings: defaults, then `dicom_xml.toml` (or an explicit file),
//! then `DICOM_XML__*` environment variables.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::decoder::DecodeOptions;
use crate::encoder::EncodeOptions;
use crate::error::Result;
use crate::model::TagId;
use crate::redact;

pub const DEFAULT_CONFIG_FILE: &str = "dicom_xml.toml";
pub const ENV_PREFIX: &str = "DICOM_XML";

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];
const IMAGE_FORMATS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub document: DocumentSettings,
    #[serde(default)]
    pub encode: ParallelSettings,
    #[serde(default)]
    pub decode: ParallelSettings,
    #[serde(default)]
    pub redact: RedactSettings,
    #[serde(default)]
    pub image: ImageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentSettings {
    #[serde(default = "default_indent")]
    pub indent: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParallelSettings {
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedactSettings {
    /// Keywords or `(GGGG,EEEE)` renderings.
    #[serde(default = "default_redacted_tags")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSettings {
    #[serde(default = "default_image_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_indent() -> usize {
    2
}

fn default_redacted_tags() -> Vec<String> {
    [
        "PatientName",
        "PatientID",
        "PatientAge",
        "PatientAddress",
        "PatientTelephoneNumbers",
        "PatientInsurancePlanCodeSequence",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_image_format() -> String {
    "jpg".into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            document: DocumentSettings::default(),
            encode: ParallelSettings::default(),
            decode: ParallelSettings::default(),
            redact: RedactSettings::default(),
            image: ImageSettings::default(),
        }
    }
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            indent: default_indent(),
        }
    }
}

impl Default for RedactSettings {
    fn default() -> Self {
        Self {
            tags: default_redacted_tags(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            format: default_image_format(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> std::result::Result<(), String> {
        let level = self.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(format!("log_level must be one of {LOG_LEVELS:?}"));
        }
        if !IMAGE_FORMATS.contains(&self.image.format.to_ascii_lowercase().as_str()) {
            return Err(format!("image.format must be one of {IMAGE_FORMATS:?}"));
        }
        if self.document.indent > 16 {
            return Err("document.indent must be <= 16".into());
        }
        Ok(())
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            parallel: self.encode.parallel,
        }
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            parallel: self.decode.parallel,
        }
    }

    pub fn redacted_tags(&self) -> Result<BTreeSet<TagId>> {
        redact::resolve_tags(&self.redact.tags)
    }
}

/// Loads settings. An explicitly given file must exist; the default file is
/// optional.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(path) => File::from(path.to_path_buf()).required(true),
        None => File::from(PathBuf::from(DEFAULT_CONFIG_FILE)).required(false),
    };

    // e.g. DICOM_XML__DECODE__PARALLEL=true
    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("redact.tags"),
        )
        .build()?
        .try_deserialize()?;

    settings.validate().map_err(ConfigError::Message)?;
    Ok(settings)
}
