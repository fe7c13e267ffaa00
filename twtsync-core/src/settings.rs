//! Settings file: API environments, active mode, and sync options.
//!
//! # Storage layout
//!
//! ```text
//! ~/.twtsync/
//!   settings.yaml   (mode 0600)
//!   content/        (see [`crate::store`])
//!   products/
//!   hashes.json
//! ```
//!
//! # API pattern
//!
//! Every function touching disk has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{settings_io_err, SettingsError};

/// Number of dash-separated segments in a valid API key.
pub const API_KEY_SEGMENTS: usize = 5;

/// Default container path for created performances.
pub const DEFAULT_CONTAINER: &str = "performances";

/// Default purchase link; `{id}` is replaced by the performance id.
pub const DEFAULT_PURCHASE_URL_TEMPLATE: &str =
    "https://tickets.hetpark.nl/mtTicketingShop/performance/{id}";

const URL_PATTERN: &str = concat!(
    r"(?i)^(?:http|ftp)s?://",
    r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|",
    r"localhost|",
    r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
    r"(?::\d+)?",
    r"(?:/?|[/?]\S+)$",
);

// ---------------------------------------------------------------------------
// 1. Types
// ---------------------------------------------------------------------------

/// Which API environment requests go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    #[default]
    Test,
    Prod,
}

impl ApiMode {
    pub fn all() -> &'static [ApiMode] {
        &[ApiMode::Test, ApiMode::Prod]
    }
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMode::Test => write!(f, "test"),
            ApiMode::Prod => write!(f, "prod"),
        }
    }
}

impl FromStr for ApiMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_api_mode(s)
    }
}

/// Raw environment entry as written in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Validated endpoint for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub api_key: String,
}

/// Validated API settings: both environments plus the active mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub test: Endpoint,
    pub prod: Endpoint,
    pub mode: ApiMode,
    pub timeout_secs: u64,
}

impl ApiSettings {
    pub fn endpoint(&self, mode: ApiMode) -> &Endpoint {
        match mode {
            ApiMode::Test => &self.test,
            ApiMode::Prod => &self.prod,
        }
    }

    pub fn active(&self) -> &Endpoint {
        self.endpoint(self.mode)
    }
}

/// Periodic scheduling for the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default = "default_list_interval")]
    pub list_interval_minutes: u64,
    #[serde(default = "default_availability_interval")]
    pub availability_interval_minutes: u64,
    /// Length of the default sync window, starting today.
    #[serde(default = "default_window_years")]
    pub window_years: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule {
            list_interval_minutes: default_list_interval(),
            availability_interval_minutes: default_availability_interval(),
            window_years: default_window_years(),
        }
    }
}

/// One row of a field-mapping override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore: bool,
}

/// Root of `settings.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub test: Option<EnvironmentSettings>,
    #[serde(default)]
    pub prod: Option<EnvironmentSettings>,
    #[serde(default)]
    pub api_mode: Option<String>,
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_purchase_url_template")]
    pub purchase_url_template: String,
    #[serde(default = "default_pinned_subjects")]
    pub pinned_subjects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Vec<MappingEntry>>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            test: None,
            prod: None,
            api_mode: None,
            container: default_container(),
            purchase_url_template: default_purchase_url_template(),
            pinned_subjects: default_pinned_subjects(),
            template_dir: None,
            timeout_secs: default_timeout(),
            schedule: Schedule::default(),
            mapping: None,
        }
    }
}

impl Settings {
    /// Validate the API part of the settings.
    ///
    /// Any failure here is a setup error: no sync may start.
    pub fn api_settings(&self) -> Result<ApiSettings, SettingsError> {
        let test = validate_environment("test", self.test.as_ref())?;
        let prod = validate_environment("prod", self.prod.as_ref())?;
        let mode = match self.api_mode.as_deref() {
            Some(mode) if !mode.trim().is_empty() => validate_api_mode(mode)?,
            _ => return Err(SettingsError::MissingMode),
        };
        Ok(ApiSettings {
            test,
            prod,
            mode,
            timeout_secs: self.timeout_secs,
        })
    }
}

fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

fn default_purchase_url_template() -> String {
    DEFAULT_PURCHASE_URL_TEMPLATE.to_string()
}

fn default_pinned_subjects() -> Vec<String> {
    vec!["featured".to_string()]
}

fn default_timeout() -> u64 {
    30
}

fn default_list_interval() -> u64 {
    60
}

fn default_availability_interval() -> u64 {
    5
}

fn default_window_years() -> u32 {
    20
}

// ---------------------------------------------------------------------------
// 2. Validation
// ---------------------------------------------------------------------------

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("URL pattern is a valid regex"))
}

/// Accepts http(s)/ftp(s) URLs on a domain, `localhost` or an IPv4 address.
pub fn validate_url(url: &str) -> Result<&str, SettingsError> {
    if url_regex().is_match(url) {
        Ok(url)
    } else {
        Err(SettingsError::InvalidUrl(url.to_string()))
    }
}

/// API keys are exactly [`API_KEY_SEGMENTS`] dash-separated segments.
pub fn validate_api_key(api_key: &str) -> Result<&str, SettingsError> {
    if api_key.split('-').count() == API_KEY_SEGMENTS {
        Ok(api_key)
    } else {
        Err(SettingsError::InvalidApiKey(api_key.to_string()))
    }
}

pub fn validate_api_mode(mode: &str) -> Result<ApiMode, SettingsError> {
    match mode.trim() {
        "test" => Ok(ApiMode::Test),
        "prod" => Ok(ApiMode::Prod),
        other => Err(SettingsError::InvalidMode(other.to_string())),
    }
}

fn validate_environment(
    name: &str,
    env: Option<&EnvironmentSettings>,
) -> Result<Endpoint, SettingsError> {
    let env = env.ok_or_else(|| SettingsError::MissingEnvironment(name.to_string()))?;

    let url = match env.url.as_deref() {
        Some(url) if !url.is_empty() => validate_url(url)?,
        _ => return Err(SettingsError::MissingUrl(name.to_string())),
    };
    let api_key = match env.api_key.as_deref() {
        Some(key) if !key.is_empty() => validate_api_key(key)?,
        _ => return Err(SettingsError::MissingApiKey(name.to_string())),
    };

    Ok(Endpoint {
        url: url.to_string(),
        api_key: api_key.to_string(),
    })
}

// ---------------------------------------------------------------------------
// 3. Paths
// ---------------------------------------------------------------------------

/// `<home>/.twtsync/`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".twtsync")
}

/// `<home>/.twtsync/settings.yaml`: pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    root_at(home).join("settings.yaml")
}

// ---------------------------------------------------------------------------
// 4. Load / save
// ---------------------------------------------------------------------------

/// Load `<home>/.twtsync/settings.yaml`.
///
/// Returns `SettingsError::NotFound` if absent and `SettingsError::Parse`
/// (with path + line context) if malformed.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Err(SettingsError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| settings_io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| SettingsError::Parse { path, source: e })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, SettingsError> {
    load_at(&home()?)
}

/// Atomically save settings: serialize → `.yaml.tmp` → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let root = root_at(home);
    std::fs::create_dir_all(&root).map_err(|e| settings_io_err(&root, e))?;
    let path = settings_path_at(home);
    let tmp_path = path.with_file_name("settings.yaml.tmp");

    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| settings_io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| settings_io_err(&path, e))?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<(), SettingsError> {
    save_at(&home()?, settings)
}

/// Scaffold a settings file with empty environments.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
pub fn init_at(home: &Path, mode: ApiMode) -> Result<Settings, SettingsError> {
    if settings_path_at(home).exists() {
        return load_at(home);
    }
    let settings = Settings {
        test: Some(EnvironmentSettings::default()),
        prod: Some(EnvironmentSettings::default()),
        api_mode: Some(mode.to_string()),
        ..Settings::default()
    };
    save_at(home, &settings)?;
    Ok(settings)
}

/// `init_at` convenience wrapper.
pub fn init(mode: ApiMode) -> Result<Settings, SettingsError> {
    init_at(&home()?, mode)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub fn home() -> Result<PathBuf, SettingsError> {
    dirs::home_dir().ok_or(SettingsError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| settings_io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn env(url: &str, key: &str) -> Option<EnvironmentSettings> {
        Some(EnvironmentSettings {
            url: Some(url.to_string()),
            api_key: Some(key.to_string()),
        })
    }

    fn valid() -> Settings {
        Settings {
            test: env("https://hetpark.tst3.ticketworks.nl/mtTicketingAPI", "d437c0cb-34ab-480f-851f-aba9a"),
            prod: env("https://hetpark.ticketworks.nl/mtTicketingAPI", "a1-b2-c3-d4-e5"),
            api_mode: Some("prod".to_string()),
            ..Settings::default()
        }
    }

    #[rstest]
    #[case("https://hetpark.tst3.ticketworks.nl/mtTicketingAPI")]
    #[case("http://localhost:8080/api")]
    #[case("https://10.0.0.12")]
    #[case("ftp://files.example.com/")]
    fn accepts_well_formed_urls(#[case] url: &str) {
        assert!(validate_url(url).is_ok(), "{url} should be valid");
    }

    #[rstest]
    #[case("hetpark.ticketworks.nl")]
    #[case("https://")]
    #[case("mailto:someone@example.com")]
    #[case("https://exa mple.com")]
    fn rejects_malformed_urls(#[case] url: &str) {
        assert!(matches!(validate_url(url), Err(SettingsError::InvalidUrl(_))));
    }

    #[rstest]
    #[case("d437c0cb-34ab-480f-851f-aba9a", true)]
    #[case("a-b-c-d-e", true)]
    #[case("a-b-c-d", false)]
    #[case("a-b-c-d-e-f", false)]
    #[case("nodashes", false)]
    fn api_key_segment_count(#[case] key: &str, #[case] ok: bool) {
        assert_eq!(validate_api_key(key).is_ok(), ok);
    }

    #[test]
    fn api_settings_resolve_active_endpoint() {
        let api = valid().api_settings().expect("valid settings");
        assert_eq!(api.mode, ApiMode::Prod);
        assert_eq!(api.active().url, "https://hetpark.ticketworks.nl/mtTicketingAPI");
    }

    #[test]
    fn missing_environment_is_reported_by_name() {
        let settings = Settings { prod: None, ..valid() };
        let err = settings.api_settings().unwrap_err();
        assert!(matches!(err, SettingsError::MissingEnvironment(ref e) if e == "prod"));
    }

    #[test]
    fn missing_or_unknown_mode_is_rejected() {
        let no_mode = Settings { api_mode: None, ..valid() };
        assert!(matches!(no_mode.api_settings(), Err(SettingsError::MissingMode)));

        let bad_mode = Settings { api_mode: Some("staging".into()), ..valid() };
        assert!(matches!(bad_mode.api_settings(), Err(SettingsError::InvalidMode(_))));
    }

    #[test]
    fn empty_url_counts_as_missing() {
        let settings = Settings { test: env("", "a-b-c-d-e"), ..valid() };
        assert!(matches!(settings.api_settings(), Err(SettingsError::MissingUrl(_))));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().expect("tempdir");
        save_at(home.path(), &valid()).expect("save");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, valid());
        assert!(!settings_path_at(home.path()).with_file_name("settings.yaml.tmp").exists());
    }

    #[test]
    fn init_is_idempotent() {
        let home = TempDir::new().expect("tempdir");
        let first = init_at(home.path(), ApiMode::Test).expect("init");
        let mut edited = first.clone();
        edited.container = "agenda".into();
        save_at(home.path(), &edited).expect("save");

        let second = init_at(home.path(), ApiMode::Prod).expect("init again");
        assert_eq!(second.container, "agenda", "existing settings must be kept");
    }

    #[test]
    fn defaults_fill_missing_optional_keys() {
        let settings: Settings = serde_yaml::from_str("api_mode: test\n").expect("parse");
        assert_eq!(settings.container, DEFAULT_CONTAINER);
        assert_eq!(settings.pinned_subjects, vec!["featured".to_string()]);
        assert_eq!(settings.schedule.window_years, 20);
        assert!(settings.mapping.is_none());
    }
}
