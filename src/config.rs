//! TOML-based configuration system.
//!
//! Loads the kiosk policy from a `config.toml` file, falling back to
//! defaults for anything missing. Every struct implements `Default` so a
//! missing or partial config file still produces a locked-down kiosk.
//!
//! ## Config file search order
//!
//! 1. `SURIKIOSK_CONFIG` environment variable (explicit override)
//! 2. Next to the executable (`<exe_dir>/config.toml`)
//! 3. Platform config directory (`%APPDATA%\SuriKiosk\config.toml` on Windows)
//! 4. Current working directory (`./config.toml`)
//! 5. No file found → `Config::default()`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::coordinator::CoordinatorOptions;
use crate::error::ConfigError;
use crate::keyboard::DEFAULT_EXIT_HOTKEY;
use crate::keyutils::key_code_from_name;
use crate::rules::{RuleSet, RuleSetBuilder, normalize_domain};
use crate::window::DEFAULT_RECONCILE_INTERVAL;

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub access: AccessConfig,
    pub exit: ExitConfig,
    pub keyboard: KeyboardConfig,
    pub window: WindowConfig,
    pub logging: LoggingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Page loaded by the browser at startup.
    pub app_url: String,
    /// Always-allowed domain. Empty = host of `app_url`.
    pub base_domain: String,
    pub window_title: String,
}

/// URL access policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub allowed_domains: Vec<String>,
    pub blocked_domains: Vec<String>,
    pub allowed_url_patterns: Vec<String>,
    pub blocked_url_patterns: Vec<String>,
    pub strict_mode: bool,
}

/// Exit detection and the password-protected exit hotkey.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub detection_enabled: bool,
    pub patterns: Vec<String>,
    pub hotkey: String,
    /// Empty = the hotkey prompt never accepts.
    pub password: String,
}

impl std::fmt::Debug for ExitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitConfig")
            .field("detection_enabled", &self.detection_enabled)
            .field("patterns", &self.patterns)
            .field("hotkey", &self.hotkey)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub filter_enabled: bool,
    pub developer_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Reconciliation period in milliseconds. 0 = default.
    pub reconcile_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    /// Daily rolling log files go here. Empty = stderr.
    pub directory: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Default impls
// ─────────────────────────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_url: "https://example.com".to_string(),
            base_domain: String::new(),
            window_title: "SuriKiosk".to_string(),
        }
    }
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            detection_enabled: true,
            patterns: Vec::new(),
            hotkey: "F10".to_string(),
            password: String::new(),
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            filter_enabled: true,
            developer_mode: false,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: DEFAULT_RECONCILE_INTERVAL.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config loading
// ─────────────────────────────────────────────────────────────────────────────

/// Result of [`Config::load`]. Problems are kept rather than logged because
/// loading runs before the subscriber exists: call [`LoadedConfig::report`]
/// once logging is up.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the config came from, `None` for built-in defaults.
    pub source: Option<PathBuf>,
    pub problems: Vec<ConfigError>,
}

impl LoadedConfig {
    pub fn report(&self) {
        for problem in &self.problems {
            warn!(error = %problem, "Configuration problem");
        }
        match (&self.source, self.problems.iter().any(ConfigError::is_file_error)) {
            (Some(path), false) => info!(path = %path.display(), "Configuration loaded"),
            (Some(_), true) => warn!("Invalid config, using defaults"),
            (None, _) => info!("No config file found, using defaults"),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file. Never panics: defaults are
    /// used if no file is found or if parsing fails.
    pub fn load() -> LoadedConfig {
        Self::load_with_override(std::env::var_os(CONFIG_ENV).map(PathBuf::from))
    }

    fn load_with_override(override_path: Option<PathBuf>) -> LoadedConfig {
        let mut problems = Vec::new();
        let source = find_config_path(override_path, &mut problems);
        let config = match source.as_deref().map(Self::load_from) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                problems.push(e);
                Config::default()
            }
            None => Config::default(),
        };
        LoadedConfig {
            config,
            source,
            problems,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the rule set. Bad patterns and empty domains are dropped with
    /// a warning; everything else stays active.
    pub fn rule_set(&self) -> RuleSet {
        let access = &self.access;
        let mut builder = RuleSetBuilder::default()
            .strict_mode(access.strict_mode)
            .exit_detection(self.exit.detection_enabled)
            .keyboard_filter(self.keyboard.filter_enabled)
            .developer_mode(self.keyboard.developer_mode);

        for domain in &access.allowed_domains {
            builder = builder.allow_domain(domain);
        }
        for domain in &access.blocked_domains {
            builder = builder.block_domain(domain);
        }
        for pattern in &access.allowed_url_patterns {
            builder = builder.allow_url_pattern(pattern);
        }
        for pattern in &access.blocked_url_patterns {
            builder = builder.block_url_pattern(pattern);
        }
        for pattern in &self.exit.patterns {
            builder = builder.exit_pattern(pattern);
        }

        let (rules, errors) = builder.build_with_report();
        if !errors.is_empty() {
            warn!(count = errors.len(), "Some URL patterns were ignored");
        }
        rules
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        let exit_hotkey = key_code_from_name(&self.exit.hotkey).unwrap_or_else(|| {
            warn!(hotkey = %self.exit.hotkey, "Unknown exit hotkey, using F10");
            DEFAULT_EXIT_HOTKEY
        });

        let reconcile_interval = match self.window.reconcile_interval_ms {
            0 => {
                warn!("reconcile_interval_ms = 0, using default");
                DEFAULT_RECONCILE_INTERVAL
            }
            ms => Duration::from_millis(ms),
        };

        CoordinatorOptions {
            base_domain: self.base_domain(),
            exit_hotkey,
            reconcile_interval,
        }
    }

    /// `general.base_domain`, or the host of `general.app_url` when empty.
    pub fn base_domain(&self) -> Option<String> {
        if let Some(domain) = normalize_domain(&self.general.base_domain) {
            return Some(domain);
        }
        let host = Url::parse(&self.general.app_url)
            .ok()?
            .host_str()
            .map(str::to_string)?;
        normalize_domain(&host)
    }
}

const CONFIG_ENV: &str = "SURIKIOSK_CONFIG";

/// Searches for a config file in the standard locations.
fn find_config_path(
    override_path: Option<PathBuf>,
    problems: &mut Vec<ConfigError>,
) -> Option<PathBuf> {
    // 1. Explicit env var override
    if let Some(p) = override_path {
        if p.is_file() {
            return Some(p);
        }
        problems.push(ConfigError::MissingOverride { path: p });
    }

    // 2. Next to the executable
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 3. Platform config directory
    if let Some(dir) = platform_config_dir() {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 4. Current working directory
    let p = PathBuf::from("config.toml");
    if p.is_file() {
        return Some(p);
    }

    None
}

/// Returns the platform config directory without adding a dependency.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("SuriKiosk"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| format!("{h}/.config")))
            .map(|dir| PathBuf::from(dir).join("surikiosk"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use winit::keyboard::KeyCode;

    use super::*;

    #[test]
    fn test_default_is_locked_down() {
        let c = Config::default();
        assert_eq!(c.general.window_title, "SuriKiosk");
        assert!(c.exit.detection_enabled);
        assert_eq!(c.exit.hotkey, "F10");
        assert!(c.exit.password.is_empty());
        assert!(c.keyboard.filter_enabled);
        assert!(!c.keyboard.developer_mode);
        assert!(!c.access.strict_mode);
        assert_eq!(c.window.reconcile_interval_ms, 1500);
        assert_eq!(c.logging.filter, "info");
    }

    #[test]
    fn test_empty_toml_returns_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.keyboard.filter_enabled);
        assert_eq!(config.window.reconcile_interval_ms, 1500);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
[access]
allowed_domains = ["exam.edu"]
strict_mode = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.access.allowed_domains, vec!["exam.edu"]);
        assert!(config.access.strict_mode);
        assert!(config.exit.detection_enabled); // default
        assert_eq!(config.exit.hotkey, "F10"); // default
    }

    #[test]
    fn test_rule_set_from_toml() {
        let toml = r#"
[access]
allowed_domains = ["*.Exam.edu", "  "]
blocked_domains = ["social.com."]
blocked_url_patterns = ["tracker", "(unclosed"]

[exit]
patterns = ['^https?://[^/]+/#/login_s$']

[keyboard]
developer_mode = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let rules = config.rule_set();

        assert!(rules.allowed_domains.contains("exam.edu"));
        assert_eq!(rules.allowed_domains.len(), 1);
        assert!(rules.blocked_domains.contains("social.com"));
        assert_eq!(rules.blocked_url_patterns.len(), 1);
        assert_eq!(rules.exit_patterns.len(), 1);
        assert!(rules.developer_mode_enabled);
        assert!(rules.keyboard_filter_enabled);
    }

    #[test]
    fn test_base_domain_from_app_url() {
        let mut config = Config::default();
        config.general.app_url = "https://Portal.Exam.edu/start".to_string();
        assert_eq!(config.base_domain().as_deref(), Some("portal.exam.edu"));

        config.general.base_domain = "exam.edu".to_string();
        assert_eq!(config.base_domain().as_deref(), Some("exam.edu"));
    }

    #[test]
    fn test_base_domain_none_for_unparseable_url() {
        let mut config = Config::default();
        config.general.app_url = "not a url".to_string();
        assert_eq!(config.base_domain(), None);
    }

    #[test]
    fn test_coordinator_options() {
        let toml = r#"
[exit]
hotkey = "pause"

[window]
reconcile_interval_ms = 500
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let options = config.coordinator_options();
        assert_eq!(options.exit_hotkey, KeyCode::Pause);
        assert_eq!(options.reconcile_interval, Duration::from_millis(500));
        assert_eq!(options.base_domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_bad_hotkey_and_zero_interval_fall_back() {
        let mut config = Config::default();
        config.exit.hotkey = "Ctrl+Q".to_string();
        config.window.reconcile_interval_ms = 0;
        let options = config.coordinator_options();
        assert_eq!(options.exit_hotkey, DEFAULT_EXIT_HOTKEY);
        assert_eq!(options.reconcile_interval, DEFAULT_RECONCILE_INTERVAL);
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = Config::default();
        config.exit.password = "hunter2".to_string();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nwindow_title = \"Exam\"").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.general.window_title, "Exam");
    }

    #[test]
    fn test_override_with_invalid_file_keeps_the_problem() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general\nwindow_title = ").unwrap();
        let loaded = Config::load_with_override(Some(file.path().to_path_buf()));
        assert_eq!(loaded.source.as_deref(), Some(file.path()));
        assert!(matches!(loaded.problems[..], [ConfigError::Parse { .. }]));
        assert_eq!(loaded.config.general.window_title, "SuriKiosk");
        loaded.report();
    }

    #[test]
    fn test_override_to_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let loaded = Config::load_with_override(Some(missing.clone()));
        assert!(matches!(
            loaded.problems.first(),
            Some(ConfigError::MissingOverride { path }) if *path == missing
        ));
        assert_ne!(loaded.source.as_deref(), Some(missing.as_path()));
    }

    #[test]
    fn test_override_with_valid_file_has_no_problems() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general]\nwindow_title = \"Exam\"").unwrap();
        let loaded = Config::load_with_override(Some(file.path().to_path_buf()));
        assert!(loaded.problems.is_empty());
        assert_eq!(loaded.config.general.window_title, "Exam");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[general\nwindow_title = ").unwrap();
        assert!(matches!(
            Config::load_from(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load_from(&dir.path().join("absent.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_full_toml_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.exit.hotkey, config.exit.hotkey);
        assert_eq!(
            deserialized.window.reconcile_interval_ms,
            config.window.reconcile_interval_ms
        );
    }
}
