//! Host capabilities the session depends on.
//!
//! A host (terminal UI, test fake) implements these; the session never
//! touches a terminal, window or network socket directly.

use std::time::Instant;

use secmatrix_client::TokenSource;

use crate::grid::Sheet;

/// Navigation history of the host view.
pub trait History {
    /// Path (plus query) of the current location, e.g. `/secure/k3y/matrix-view/`.
    fn current_path(&self) -> String;
    /// Add a synthetic entry for `path` without navigating.
    fn push_state(&mut self, path: &str);
    /// Leave the current view for `location`.
    fn navigate(&mut self, location: &str);
    /// Reload the current view from the server.
    fn reload(&mut self);
}

/// Blocking dialogs. `confirm` returns once the user has answered.
pub trait Dialogs {
    fn confirm(&mut self, message: &str) -> bool;
    fn alert(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Info => "info",
            NotificationKind::Warning => "warning",
        }
    }
}

pub trait Notifier {
    fn notify(&mut self, kind: NotificationKind, message: &str);
}

/// The spreadsheet widget, opaque apart from these operations.
pub trait GridWidget {
    fn load_data(&mut self, sheets: &[Sheet]);
    /// Current contents in the widget's native shape (an array of sheets).
    fn get_data(&self) -> Option<serde_json::Value>;
    fn resize(&mut self);
}

/// Clock abstraction for testability.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Everything a session needs from its host.
pub trait Host: History + Dialogs + Notifier + GridWidget + TokenSource {}

impl<T: History + Dialogs + Notifier + GridWidget + TokenSource> Host for T {}
