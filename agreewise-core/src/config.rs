use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing;

use contracts::{Rulebook, Scorer, default_rulebook, load_rulebook_from_file};

pub const CONFIG_FILE_NAME: &str = "agreewise.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// File the config was read from; `None` when defaults were used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl CoreConfig {
    /// Read `agreewise.toml` under `root`, or fall back to defaults.
    /// Call [`CoreConfig::log_source`] once a subscriber is installed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        let mut cfg = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let mut cfg = Self::from_toml_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            cfg.source = Some(path);
            cfg
        } else {
            CoreConfig::default()
        };
        cfg.resolve_paths(root);
        Ok(cfg)
    }

    pub fn log_source(&self, root: &Path) {
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {}", path.display()),
            None => tracing::info!(
                "No config file found at {}. Using CoreConfig::default().",
                root.join(CONFIG_FILE_NAME).display()
            ),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str::<CoreConfig>(text)?)
    }

    fn resolve_paths(&mut self, root: &Path) {
        self.audit.path = absolutize(root, &self.audit.path);
        if let Some(path) = self.rules.path.take() {
            self.rules.path = Some(absolutize(root, &path));
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_name")]
    pub name: String,
    #[serde(default = "SystemConfig::default_version")]
    pub version: String,
}

impl SystemConfig {
    fn default_name() -> String {
        "agreewise".to_string()
    }

    fn default_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            version: Self::default_version(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Applies to uploads and to JSON bodies alike.
    #[serde(default = "IngestConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "IngestConfig::default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default = "IngestConfig::default_pdftotext_bin")]
    pub pdftotext_bin: String,
}

impl IngestConfig {
    fn default_max_upload_bytes() -> usize {
        10 * 1024 * 1024
    }

    fn default_allowed_extensions() -> Vec<String> {
        vec!["pdf".to_string()]
    }

    fn default_pdftotext_bin() -> String {
        "pdftotext".to_string()
    }

    /// Limit in whole megabytes, rounded up, for user-facing messages.
    pub fn max_upload_mb(&self) -> usize {
        self.max_upload_bytes.div_ceil(1024 * 1024)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: Self::default_max_upload_bytes(),
            allowed_extensions: Self::default_allowed_extensions(),
            pdftotext_bin: Self::default_pdftotext_bin(),
        }
    }
}

/// A single fixed-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max: u32,
    pub window: Duration,
}

impl RateLimit {
    pub fn per_minute(max: u32) -> Self {
        Self { max, window: Duration::from_secs(60) }
    }

    pub fn per_hour(max: u32) -> Self {
        Self { max, window: Duration::from_secs(60 * 60) }
    }

    pub fn per_day(max: u32) -> Self {
        Self { max, window: Duration::from_secs(24 * 60 * 60) }
    }
}

/// Per-client request limits. A route with its own limit does not also get
/// the defaults; a route limit of 0 falls back to them.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "LimitsConfig::default_per_day")]
    pub default_per_day: u32,
    #[serde(default = "LimitsConfig::default_per_hour")]
    pub default_per_hour: u32,
    #[serde(default = "LimitsConfig::default_upload_per_minute")]
    pub upload_per_minute: u32,
    #[serde(default = "LimitsConfig::default_analyze_per_minute")]
    pub analyze_per_minute: u32,
}

impl LimitsConfig {
    fn default_per_day() -> u32 {
        200
    }

    fn default_per_hour() -> u32 {
        50
    }

    fn default_upload_per_minute() -> u32 {
        10
    }

    fn default_analyze_per_minute() -> u32 {
        20
    }

    pub fn default_limits(&self) -> Vec<RateLimit> {
        vec![
            RateLimit::per_day(self.default_per_day),
            RateLimit::per_hour(self.default_per_hour),
        ]
    }

    pub fn upload_limits(&self) -> Vec<RateLimit> {
        self.route_limits(self.upload_per_minute)
    }

    pub fn analyze_limits(&self) -> Vec<RateLimit> {
        self.route_limits(self.analyze_per_minute)
    }

    fn route_limits(&self, per_minute: u32) -> Vec<RateLimit> {
        if per_minute == 0 {
            self.default_limits()
        } else {
            vec![RateLimit::per_minute(per_minute)]
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_per_day: Self::default_per_day(),
            default_per_hour: Self::default_per_hour(),
            upload_per_minute: Self::default_upload_per_minute(),
            analyze_per_minute: Self::default_analyze_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    /// Custom rulebook TOML. The compiled-in rulebook is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl RulesConfig {
    pub fn load_rulebook(&self) -> Result<Rulebook> {
        match &self.path {
            Some(path) => {
                let path_str = path.to_string_lossy();
                let book = load_rulebook_from_file(&path_str)
                    .with_context(|| format!("loading rulebook {}", path.display()))?;
                tracing::info!(
                    rulebook = %book.name,
                    rules = book.len(),
                    "Loaded custom rulebook from {}",
                    path.display()
                );
                Ok(book)
            }
            None => Ok(default_rulebook().clone()),
        }
    }

    pub fn scorer(&self) -> Result<Scorer<'static>> {
        match &self.path {
            Some(_) => Ok(Scorer::with_owned(self.load_rulebook()?)),
            None => Ok(Scorer::default()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "AuditConfig::default_path")]
    pub path: PathBuf,
}

impl AuditConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("logbook/requests.jsonl")
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: Self::default_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
}

fn absolutize(root: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        root.join(value)
    }
}
