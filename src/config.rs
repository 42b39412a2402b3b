//! Build parameters.
//!
//! Parameters are read from a JSON file in the repository. Secrets can also be
//! supplied through the environment so they stay out of version control.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const DEFAULT_CONFIG_FILE: &str = "langpack.json";
pub const TRANSLATION_TOKEN_ENV: &str = "LANGPACK_TRANSLATION_TOKEN";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Parameters {
    /// Where archives and index.html are written; relative paths are resolved
    /// against the repository root
    pub output_directory: PathBuf,
    /// e.g. "example_soft"
    pub package_name: String,
    /// URL slug of the package, e.g. "example_soft"
    pub package_name_url: String,
    /// e.g. "Example Software"
    pub software_name: String,
    /// e.g. "component", "plugin", "software"
    #[serde(default = "default_software_type")]
    pub software_type: String,
    pub version: String,
    pub author_name: String,
    pub author_url: String,
    pub license: String,

    /// Skip languages translated below this percentage; 0 disables filtering
    #[serde(default)]
    pub min_percent: f64,
    #[serde(default)]
    pub upload: bool,
    #[serde(default = "default_true")]
    pub keep_output: bool,
    #[serde(default)]
    pub quiet: bool,

    #[serde(default)]
    pub translation: TranslationService,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub installer_payload: InstallerPayload,
    #[serde(default)]
    pub templates: Templates,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TranslationService {
    /// e.g. "https://translate.example.com"
    pub url: String,
    pub project: String,
    pub api_key: Option<String>,
}

/// S3 bucket the packages are uploaded to. Credentials are taken from the
/// standard AWS environment, never from this file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Storage {
    /// S3-compatible endpoint, e.g. "https://minio.example.com"; AWS when unset
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_storage_region")]
    pub region: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub path: String,
    /// Public host the uploaded files are served from
    #[serde(default)]
    pub cdn_hostname: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_storage_region(),
            bucket: String::new(),
            path: String::new(),
            cdn_hostname: String::new(),
        }
    }
}

/// Pre-built installer files shipped with every language package.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InstallerPayload {
    /// Glob relative to the output directory; no payload when unset
    #[serde(default)]
    pub glob: Option<String>,
    /// Folder inside the archive
    #[serde(default = "default_payload_dir")]
    pub virtual_dir: String,
    /// Install target of the payload files
    #[serde(default = "default_payload_target")]
    pub target: String,
}

impl Default for InstallerPayload {
    fn default() -> Self {
        Self {
            glob: None,
            virtual_dir: default_payload_dir(),
            target: default_payload_target(),
        }
    }
}

/// HTML index templates, relative to the repository root.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Templates {
    pub page: Option<PathBuf>,
    pub row: Option<PathBuf>,
}

fn default_software_type() -> String {
    "software".to_string()
}

fn default_true() -> bool {
    true
}

fn default_storage_region() -> String {
    "us-east-1".to_string()
}

fn default_payload_dir() -> String {
    "angie".to_string()
}

fn default_payload_target() -> String {
    "administrator/components/com_akeeba/Master/Installers".to_string()
}

impl Parameters {
    /// Load parameters from `path`, then apply environment overrides and
    /// resolve the output directory against `repository_root`.
    #[tracing::instrument(skip(runtime, path, repository_root))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path, repository_root: &Path) -> Result<Self> {
        debug!("Loading parameters from {:?}", path);

        let content = runtime
            .read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        let mut params: Parameters = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {:?}", path))?;

        if let Ok(token) = runtime.env_var(TRANSLATION_TOKEN_ENV) {
            debug!("Using {} for the translation service", TRANSLATION_TOKEN_ENV);
            params.translation.api_key = Some(token);
        }

        if params.output_directory.is_relative() {
            params.output_directory = repository_root.join(&params.output_directory);
        }

        Ok(params)
    }

    /// Whether packages are filtered by translation completion.
    pub fn filters_by_completion(&self) -> bool {
        self.min_percent > 0.0
    }

    /// File name of the archive for `code`, e.g. "example_soft-de-DE.zip".
    pub fn archive_name(&self, code: &str) -> String {
        format!("{}-{}.zip", self.package_name, code)
    }
}
