//! Host for one-shot commands (`save`, `undo`, `redo`, `load`, `logout`).
//!
//! There is no screen: the grid is an in-memory sheet, dialogs decline,
//! and notifications are collected for the command to report.

use secmatrix_client::{CookieJar, TokenSource};
use secmatrix_config::Settings;
use secmatrix_core::{
    Dialogs, GridWidget, History, NotificationKind, Notifier, Sheet,
};

pub(crate) struct HeadlessHost {
    path: String,
    jar: CookieJar,
    sheets: Vec<Sheet>,
    notes: Vec<(NotificationKind, String)>,
    navigated: Option<String>,
    reloaded: bool,
}

impl HeadlessHost {
    pub(crate) fn new(path: impl Into<String>, jar: CookieJar) -> Self {
        Self {
            path: path.into(),
            jar,
            sheets: Vec::new(),
            notes: Vec::new(),
            navigated: None,
            reloaded: false,
        }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.matrix_path.clone(), cookie_jar(settings))
    }

    /// Most recent notification, if any.
    pub(crate) fn last_note(&self) -> Option<&(NotificationKind, String)> {
        self.notes.last()
    }

    pub(crate) fn navigated(&self) -> Option<&str> {
        self.navigated.as_deref()
    }

    pub(crate) fn reloaded(&self) -> bool {
        self.reloaded
    }
}

/// Cookie header plus the hidden-field token, as the page would carry them.
pub(crate) fn cookie_jar(settings: &Settings) -> CookieJar {
    CookieJar::parse(settings.cookie.as_deref().unwrap_or(""))
        .with_hidden_token(settings.csrf_token.clone())
}

impl History for HeadlessHost {
    fn current_path(&self) -> String {
        self.path.clone()
    }

    fn push_state(&mut self, _path: &str) {}

    fn navigate(&mut self, location: &str) {
        log::debug!("Navigate to {}", location);
        self.navigated = Some(location.to_string());
    }

    fn reload(&mut self) {
        self.reloaded = true;
    }
}

impl Dialogs for HeadlessHost {
    fn confirm(&mut self, message: &str) -> bool {
        log::info!("Declined (non-interactive): {}", message);
        false
    }

    fn alert(&mut self, message: &str) {
        log::warn!("{}", message);
    }
}

impl Notifier for HeadlessHost {
    fn notify(&mut self, kind: NotificationKind, message: &str) {
        log::debug!("[{}] {}", kind.as_str(), message);
        self.notes.push((kind, message.to_string()));
    }
}

impl GridWidget for HeadlessHost {
    fn load_data(&mut self, sheets: &[Sheet]) {
        self.sheets = sheets.to_vec();
    }

    fn get_data(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.sheets).ok()
    }

    fn resize(&mut self) {}
}

impl TokenSource for HeadlessHost {
    fn cookie(&self, name: &str) -> Option<String> {
        self.jar.cookie(name)
    }

    fn form_field(&self, name: &str) -> Option<String> {
        self.jar.form_field(name)
    }
}
