//! Configuration types for the rollcall service.

use chrono::Weekday;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RollcallConfig {
    /// HTTP listener and public address.
    pub server: ServerConfig,
    /// LINE Messaging API credentials.
    pub line: LineConfig,
    /// Administrator receiving weekly exports.
    pub admin: AdminConfig,
    /// How chat text becomes a registration.
    pub registration: RegistrationConfig,
    /// Roster export and delivery settings.
    pub export: ExportConfig,
    /// Weekly cycle cadence.
    pub schedule: ScheduleConfig,
    /// Log filter and optional file output.
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Externally reachable base URL used to build download links
    /// (e.g. `https://bot.example.com`).
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            public_base_url: String::new(),
        }
    }
}

/// LINE Messaging API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// API base URL. Overridable for tests and proxies.
    pub api_base_url: String,
    /// Long-lived channel access token.
    pub channel_access_token: String,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.line.me".to_owned(),
            channel_access_token: String::new(),
            request_timeout_secs: 10,
        }
    }
}

/// Administrator account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Platform user id that receives the weekly rosters.
    pub user_id: String,
}

/// What to do with text that contains no recognizable date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparsedPolicy {
    /// Register under the raw text as an opaque bucket key.
    Opaque,
    /// Ignore silently.
    Drop,
    /// Reply with a usage hint and ignore.
    #[default]
    Hint,
}

/// Registration grammar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Handling of text that does not normalize to a date.
    pub unparsed_policy: UnparsedPolicy,
    /// When set, only messages starting with this prefix register
    /// (e.g. `参加`); the rest of the message is the date text.
    pub command_prefix: Option<String>,
}

/// How the administrator receives an exported roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Persist the file and push a download link.
    #[default]
    Link,
    /// Push the CSV content as message text.
    Inline,
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory holding persisted artifacts for download links.
    pub directory: PathBuf,
    /// Artifact name prefix: `<prefix>_<date>.csv`.
    pub file_prefix: String,
    /// Resolve display names through the profile API.
    pub enrich_display_names: bool,
    /// Timeout for each profile lookup.
    pub lookup_timeout_secs: u64,
    /// Prepend a UTF-8 byte order mark so spreadsheet apps detect encoding.
    pub utf8_bom: bool,
    /// Delete the persisted artifact when its date is evicted.
    pub prune_on_evict: bool,
    /// Delivery shape.
    pub delivery: DeliveryMode,
    /// Timeout for the push carrying each artifact.
    pub delivery_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: default_export_dir(),
            file_prefix: "roster".to_owned(),
            enrich_display_names: true,
            lookup_timeout_secs: 5,
            utf8_bom: true,
            prune_on_evict: false,
            delivery: DeliveryMode::Link,
            delivery_timeout_secs: 15,
        }
    }
}

/// Weekly cycle cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Day of week (`Mon` .. `Sun`).
    pub weekday: Weekday,
    /// Hour of day (0-23) in `timezone`.
    pub hour: u32,
    /// Minute of hour (0-59).
    pub minute: u32,
    /// IANA timezone name used for the cadence and for "today".
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            hour: 9,
            minute: 0,
            timezone: "Asia/Tokyo".to_owned(),
        }
    }
}

impl ScheduleConfig {
    /// Parse the configured timezone.
    pub fn tz(&self) -> crate::Result<Tz> {
        self.timezone.trim().parse::<Tz>().map_err(|e| {
            crate::RollcallError::Config(format!("invalid timezone `{}`: {e}", self.timezone))
        })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// When set, also write daily-rotated log files here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "rollcall=info".to_owned(),
            directory: None,
        }
    }
}

/// Returns the default artifact directory.
fn default_export_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("rollcall").join("exports"))
        .unwrap_or_else(|| PathBuf::from("/tmp/rollcall-exports"))
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

/// Issue found by [`RollcallConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub id: String,
    pub title: String,
    pub severity: ConfigSeverity,
    pub summary: String,
}

impl ConfigIssue {
    fn new(id: &str, title: &str, severity: ConfigSeverity, summary: impl Into<String>) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            severity,
            summary: summary.into(),
        }
    }
}

impl RollcallConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::RollcallError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::RollcallError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/rollcall/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("rollcall").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("/tmp/rollcall-config/config.toml"))
    }

    /// Apply `ROLLCALL_*` and `PORT` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = value("ROLLCALL_CHANNEL_ACCESS_TOKEN") {
            self.line.channel_access_token = token.trim().to_owned();
        }
        if let Some(admin) = value("ROLLCALL_ADMIN_USER_ID") {
            self.admin.user_id = admin.trim().to_owned();
        }
        if let Some(base) = value("ROLLCALL_PUBLIC_BASE_URL") {
            self.server.public_base_url = base.trim().to_owned();
        }
        if let Some(port) = value("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("ignoring invalid PORT value `{port}`"),
            }
        }
    }

    /// Validate configuration without network calls.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        use ConfigSeverity::{Error, Warning};

        let mut issues = Vec::new();

        if self.line.channel_access_token.trim().is_empty() {
            issues.push(ConfigIssue::new(
                "line-missing-access-token",
                "LINE access token missing",
                Error,
                "Set line.channel_access_token or ROLLCALL_CHANNEL_ACCESS_TOKEN.",
            ));
        }

        if self.admin.user_id.trim().is_empty() {
            issues.push(ConfigIssue::new(
                "admin-missing-user-id",
                "Administrator missing",
                Error,
                "Set admin.user_id or ROLLCALL_ADMIN_USER_ID; weekly rosters have no recipient.",
            ));
        }

        if let Err(err) = self.schedule.tz() {
            issues.push(ConfigIssue::new(
                "schedule-invalid-timezone",
                "Schedule timezone invalid",
                Error,
                err.to_string(),
            ));
        }

        if self.schedule.hour > 23 || self.schedule.minute > 59 {
            issues.push(ConfigIssue::new(
                "schedule-invalid-time",
                "Schedule time out of range",
                Error,
                format!(
                    "{:02}:{:02} is not a time of day.",
                    self.schedule.hour, self.schedule.minute
                ),
            ));
        }

        let base = self.server.public_base_url.trim();
        if self.export.delivery == DeliveryMode::Link && base.is_empty() {
            issues.push(ConfigIssue::new(
                "export-link-without-base-url",
                "Download links need a public base URL",
                Error,
                "Set server.public_base_url or switch export.delivery to `inline`.",
            ));
        }
        if !base.is_empty() && !(base.starts_with("https://") || base.starts_with("http://")) {
            issues.push(ConfigIssue::new(
                "server-base-url-not-http",
                "Public base URL is not an http(s) URL",
                Warning,
                format!("`{base}` will produce links the administrator cannot open."),
            ));
        }

        if self
            .registration
            .command_prefix
            .as_deref()
            .is_some_and(|prefix| prefix.trim().is_empty())
        {
            issues.push(ConfigIssue::new(
                "registration-empty-command-prefix",
                "Command prefix is empty",
                Warning,
                "An empty command prefix behaves like free-text registration.",
            ));
        }

        if self.export.file_prefix.trim().is_empty() {
            issues.push(ConfigIssue::new(
                "export-empty-file-prefix",
                "Artifact prefix is empty",
                Warning,
                "Artifacts will be named `_<date>.csv`.",
            ));
        }

        let sample = crate::export::artifact_name(
            &self.export.file_prefix,
            &crate::roster::RosterKey::Opaque("sample".to_owned()),
        );
        if !crate::artifacts::ArtifactStore::is_valid_name(&sample) {
            issues.push(ConfigIssue::new(
                "export-invalid-file-prefix",
                "Artifact prefix not a plain file name",
                Error,
                format!(
                    "export.file_prefix {:?} yields artifact names like {sample:?}, \
                     which cannot be stored or downloaded.",
                    self.export.file_prefix
                ),
            ));
        }

        issues
    }

    /// Whether any issue blocks startup.
    #[must_use]
    pub fn has_blocking_issues(issues: &[ConfigIssue]) -> bool {
        issues
            .iter()
            .any(|issue| issue.severity == ConfigSeverity::Error)
    }
}
