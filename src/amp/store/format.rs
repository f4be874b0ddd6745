//! On-disk format selection and save options

use std::path::Path;

/// Text format of a persisted configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Detect from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Detect from a path, falling back to JSON
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl std::str::FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("Unknown config format: {s}. Use: json, yaml"))
    }
}

/// Options for [`super::ConfigStore::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Explicit format; detected from the extension when `None`
    pub format: Option<ConfigFormat>,
    /// Pretty-print JSON
    pub pretty: bool,
    /// Persist the raw min/max statistics next to the parameters
    pub include_stats: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            format: None,
            pretty: true,
            include_stats: false,
        }
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: ConfigFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_stats(mut self, include_stats: bool) -> Self {
        self.include_stats = include_stats;
        self
    }

    /// Format to use for `path`
    pub fn resolve_format(&self, path: &Path) -> ConfigFormat {
        self.format.unwrap_or_else(|| ConfigFormat::from_path(path))
    }
}
