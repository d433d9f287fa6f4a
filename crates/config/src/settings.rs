// Application settings
// Loaded from ~/.config/secmatrix/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::grid::GridConfig;

/// Error type for settings I/O.
#[derive(Debug)]
pub enum ConfigError {
    /// Could not read or write the settings file
    Io(String),
    /// Settings file is not valid JSON for [`Settings`]
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Server
    #[serde(rename = "server.baseUrl")]
    pub base_url: String,

    #[serde(rename = "server.timeoutSecs")]
    pub timeout_secs: u64,

    /// Budget for the redundant logout request. Logout never waits longer.
    #[serde(rename = "server.logoutTimeoutSecs")]
    pub logout_timeout_secs: u64,

    // Session
    #[serde(rename = "session.accessCode")]
    pub access_code: Option<String>,

    /// Location of the matrix view; the access code is derived from it when
    /// `session.accessCode` is unset.
    #[serde(rename = "session.matrixPath")]
    pub matrix_path: String,

    #[serde(rename = "session.inactivityTimeoutSecs")]
    pub inactivity_timeout_secs: u64,

    #[serde(rename = "session.autoSaveIntervalSecs")]
    pub auto_save_interval_secs: u64,

    /// Extra synthetic history entries pushed once fully armed.
    #[serde(rename = "session.historyBuffer")]
    pub history_buffer: u32,

    /// Where the logout sequence sends the user.
    #[serde(rename = "session.landingPath")]
    pub landing_path: String,

    /// Where an exit confirmed before full initialization goes.
    #[serde(rename = "session.emergencyLandingPath")]
    pub emergency_landing_path: String,

    // Auth
    /// Raw `Cookie` header (session id + csrftoken).
    #[serde(rename = "auth.cookie", skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,

    /// Token rendered in the page's hidden form field; used when no cookie carries one.
    #[serde(rename = "auth.csrfToken", skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,

    // Notifications
    #[serde(rename = "notifications.dismissAfterMs")]
    pub notification_dismiss_ms: u64,

    // Grid
    #[serde(rename = "grid", default)]
    pub grid: GridConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Server
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 30,
            logout_timeout_secs: 3,
            // Session
            access_code: None,
            matrix_path: "/secure/matrix-view/".to_string(),
            inactivity_timeout_secs: 30 * 60,
            auto_save_interval_secs: 30,
            history_buffer: 3,
            landing_path: "/secure/logout-secure/".to_string(),
            emergency_landing_path: "/".to_string(),
            // Auth
            cookie: None,
            csrf_token: None,
            // Notifications
            notification_dismiss_ms: 4000,
            // Grid
            grid: GridConfig::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        crate::config_dir().join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults.
    /// Writes a commented default file on first run.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{} ({}), using default settings", e, path.display());
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file. Lines starting with `//` are comments.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save settings to an explicit file, creating the directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;

        fs::write(path, json).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Overlay `SECMATRIX_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("SECMATRIX_BASE_URL") {
            self.base_url = url;
        }
        if let Some(code) = non_empty("SECMATRIX_ACCESS_CODE") {
            self.access_code = Some(code);
        }
        if let Some(cookie) = non_empty("SECMATRIX_COOKIE") {
            self.cookie = Some(cookie);
        }
        if let Some(token) = non_empty("SECMATRIX_CSRF_TOKEN") {
            self.csrf_token = Some(token);
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn logout_timeout(&self) -> Duration {
        Duration::from_secs(self.logout_timeout_secs.max(1))
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs.max(1))
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_secs(self.auto_save_interval_secs.max(1))
    }

    pub fn notification_dismiss(&self) -> Duration {
        Duration::from_millis(self.notification_dismiss_ms)
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Server
    "server.baseUrl": "http://127.0.0.1:8000",
    "server.timeoutSecs": 30,
    "server.logoutTimeoutSecs": 3,

    // Session (accessCode is derived from matrixPath when null)
    "session.accessCode": null,
    "session.matrixPath": "/secure/matrix-view/",
    "session.inactivityTimeoutSecs": 1800,
    "session.autoSaveIntervalSecs": 30,
    "session.historyBuffer": 3,
    "session.landingPath": "/secure/logout-secure/",
    "session.emergencyLandingPath": "/",

    // Auth: prefer SECMATRIX_COOKIE / SECMATRIX_CSRF_TOKEN over storing secrets here

    // Notifications
    "notifications.dismissAfterMs": 4000,

    // Grid (sizes in pixels: 10 px per terminal column, 25 px per line)
    "grid": {
        "sheetName": "Hoja1",
        "rows": 50,
        "cols": 26,
        "rowHeight": 25,
        "colWidth": 100,
        "indexWidth": 60,
        "minWidth": 60,
        "showToolbar": true,
        "showGrid": true,
        "style": {
            "align": "left",
            "valign": "middle",
            "strike": false,
            "underline": false,
            "font": { "bold": false, "italic": false }
        }
    }
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("Error writing default settings.json: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_session_timers() {
        let s = Settings::default();
        assert_eq!(s.inactivity_timeout(), Duration::from_secs(1800));
        assert_eq!(s.auto_save_interval(), Duration::from_secs(30));
        assert_eq!(s.history_buffer, 3);
        assert_eq!(s.notification_dismiss(), Duration::from_millis(4000));
        assert_eq!(s.grid.sheet_name, "Hoja1");
        assert_eq!((s.grid.rows, s.grid.cols), (50, 26));
    }

    #[test]
    fn zero_durations_are_clamped() {
        let s = Settings {
            inactivity_timeout_secs: 0,
            auto_save_interval_secs: 0,
            timeout_secs: 0,
            ..Settings::default()
        };
        assert_eq!(s.inactivity_timeout(), Duration::from_secs(1));
        assert_eq!(s.auto_save_interval(), Duration::from_secs(1));
        assert_eq!(s.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn load_strips_comment_lines_and_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
    // comment
    "server.baseUrl": "https://books.example",
    "session.accessCode": "k3y",
    "grid": { "rows": 10 }
}"#,
        )
        .unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.base_url, "https://books.example");
        assert_eq!(s.access_code.as_deref(), Some("k3y"));
        assert_eq!(s.grid.rows, 10);
        assert_eq!(s.grid.cols, 26);
        assert_eq!(s.auto_save_interval_secs, 30);
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Settings::load_from(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            Settings::load_from(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn default_file_loads_back_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::default().create_default_file(&path);

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.grid, GridConfig::default());
        assert_eq!(loaded.inactivity_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut s = Settings::default();
        s.history_buffer = 5;
        s.cookie = Some("csrftoken=abc".into());
        s.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.history_buffer, 5);
        assert_eq!(loaded.cookie.as_deref(), Some("csrftoken=abc"));
    }

    #[test]
    fn env_overrides_ignore_blank_values() {
        let vars: HashMap<&str, &str> = [
            ("SECMATRIX_BASE_URL", "http://10.0.0.2:9000"),
            ("SECMATRIX_ACCESS_CODE", "  "),
            ("SECMATRIX_CSRF_TOKEN", "hidden"),
        ]
        .into_iter()
        .collect();

        let mut s = Settings::default();
        s.apply_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(s.base_url, "http://10.0.0.2:9000");
        assert_eq!(s.access_code, None);
        assert_eq!(s.csrf_token.as_deref(), Some("hidden"));
        assert_eq!(s.cookie, None);
    }
}
