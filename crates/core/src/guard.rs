//! Exit guard.
//!
//! ```text
//! Unguarded ──construct──▶ EmergencyArmed ──structure ready──▶ FullyArmed
//!                               │                                  │
//!                               └──────── exit confirmed ──────────┴──▶ Exiting
//! ```
//!
//! The emergency phase covers the window before the grid exists: back asks
//! with the locked text and leaves for the emergency landing page, unload
//! always asks. Once fully armed, every exit path (back, refresh, close,
//! Escape, the logout control) goes through one confirmation whose text
//! depends on unsaved changes, and a confirmed exit asks the session to run
//! the logout sequence.

use crate::messages;
use crate::ports::{Dialogs, History};
use crate::shortcuts::{KeyInput, ShortcutAction, ShortcutMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardPhase {
    Unguarded,
    EmergencyArmed,
    FullyArmed,
    Exiting,
}

/// Work the guard hands back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardAction {
    Logout,
    Save,
    Undo,
    Redo,
    UnloadBeacon,
}

/// What the host should do with the event that was handled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardResponse {
    /// Suppress the host's native handling (navigation, menu, drop, key).
    pub prevent_default: bool,
    /// Ask the user before unloading. Hosts may show their own text instead.
    pub unload_confirmation: Option<String>,
    pub action: Option<GuardAction>,
}

impl GuardResponse {
    fn pass() -> Self {
        Self::default()
    }

    fn prevented() -> Self {
        Self {
            prevent_default: true,
            ..Self::default()
        }
    }

    fn with_action(mut self, action: Option<GuardAction>) -> Self {
        self.action = action;
        self
    }

    fn confirm_unload(message: &str) -> Self {
        Self {
            prevent_default: true,
            unload_confirmation: Some(message.to_string()),
            action: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Extra history entries pushed when fully armed.
    pub history_buffer: usize,
    /// Where the emergency back handler sends a confirmed exit.
    pub emergency_landing: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            history_buffer: 3,
            emergency_landing: "/".to_string(),
        }
    }
}

pub struct SessionGuard {
    phase: GuardPhase,
    config: GuardConfig,
    shortcuts: ShortcutMap,
    unload_prompted: bool,
}

impl SessionGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            phase: GuardPhase::Unguarded,
            config,
            shortcuts: ShortcutMap::new(),
            unload_prompted: false,
        }
    }

    pub fn phase(&self) -> GuardPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.phase, GuardPhase::EmergencyArmed | GuardPhase::FullyArmed)
    }

    /// Minimal protection while the page is still being built.
    pub fn arm_emergency<H: History + ?Sized>(&mut self, history: &mut H) {
        if self.phase != GuardPhase::Unguarded {
            return;
        }
        let path = history.current_path();
        history.push_state(&path);
        self.phase = GuardPhase::EmergencyArmed;
        log::debug!("Emergency exit guard armed");
    }

    /// Replace the emergency handlers with the full guard.
    pub fn arm_full<H: History + ?Sized>(&mut self, history: &mut H) {
        if !matches!(self.phase, GuardPhase::Unguarded | GuardPhase::EmergencyArmed) {
            return;
        }
        let path = history.current_path();
        history.push_state(&path);
        for _ in 0..self.config.history_buffer {
            history.push_state(&path);
        }
        self.phase = GuardPhase::FullyArmed;
        self.unload_prompted = false;
        log::info!(
            "Exit guard fully armed ({} buffered history entries)",
            self.config.history_buffer
        );
    }

    /// Confirm an exit. On yes the guard moves to `Exiting` and asks for logout.
    pub fn request_exit<D: Dialogs + ?Sized>(&mut self, dialogs: &mut D, dirty: bool) -> Option<GuardAction> {
        if self.phase == GuardPhase::Exiting {
            return None;
        }
        if dialogs.confirm(messages::exit_confirm(dirty)) {
            self.phase = GuardPhase::Exiting;
            Some(GuardAction::Logout)
        } else {
            None
        }
    }

    /// Exit without asking (inactivity timeout).
    pub fn force_exit(&mut self) {
        self.phase = GuardPhase::Exiting;
    }

    /// Back navigation, or the hash-change fallback for hosts without popstate.
    pub fn on_back<H: History + Dialogs + ?Sized>(&mut self, host: &mut H, dirty: bool) -> GuardResponse {
        match self.phase {
            GuardPhase::Unguarded => GuardResponse::pass(),
            GuardPhase::EmergencyArmed => {
                if host.confirm(messages::EXIT_CONFIRM_LOCKED) {
                    self.phase = GuardPhase::Exiting;
                    host.navigate(&self.config.emergency_landing);
                } else {
                    let path = host.current_path();
                    host.push_state(&path);
                }
                GuardResponse::prevented()
            }
            GuardPhase::FullyArmed => {
                // Re-push before asking so the view stays put while the dialog is open.
                let path = host.current_path();
                host.push_state(&path);
                GuardResponse::prevented().with_action(self.request_exit(host, dirty))
            }
            GuardPhase::Exiting => GuardResponse::prevented(),
        }
    }

    pub fn on_before_unload(&mut self, dirty: bool) -> GuardResponse {
        match self.phase {
            GuardPhase::EmergencyArmed => GuardResponse::confirm_unload(messages::UNLOAD_CONFIRM_GENERIC),
            GuardPhase::FullyArmed if !self.unload_prompted => {
                self.unload_prompted = true;
                GuardResponse::confirm_unload(messages::unload_confirm(dirty))
            }
            _ => GuardResponse::pass(),
        }
    }

    /// The host is going away for real.
    pub fn on_unload(&mut self) -> GuardResponse {
        if self.phase == GuardPhase::Unguarded {
            return GuardResponse::pass();
        }
        GuardResponse::pass().with_action(Some(GuardAction::UnloadBeacon))
    }

    pub fn on_visibility(&mut self, hidden: bool, dirty: bool) -> GuardResponse {
        if self.phase != GuardPhase::FullyArmed {
            return GuardResponse::pass();
        }
        if hidden {
            let action = dirty.then_some(GuardAction::Save);
            GuardResponse::pass().with_action(action)
        } else {
            self.unload_prompted = false;
            GuardResponse::pass()
        }
    }

    /// Context menu, drag-over and drop.
    pub fn on_blocked_gesture(&self) -> GuardResponse {
        if self.is_armed() {
            GuardResponse::prevented()
        } else {
            GuardResponse::pass()
        }
    }

    pub fn on_key<D: Dialogs + ?Sized>(&mut self, dialogs: &mut D, input: &KeyInput, dirty: bool) -> GuardResponse {
        if self.phase != GuardPhase::FullyArmed {
            return GuardResponse::pass();
        }
        let Some(shortcut) = self.shortcuts.resolve(input) else {
            return GuardResponse::pass();
        };

        let action = match shortcut {
            ShortcutAction::Refresh | ShortcutAction::CloseWindow | ShortcutAction::Logout => {
                self.request_exit(dialogs, dirty)
            }
            ShortcutAction::Save => Some(GuardAction::Save),
            ShortcutAction::Undo => Some(GuardAction::Undo),
            ShortcutAction::Redo => Some(GuardAction::Redo),
        };
        GuardResponse::prevented().with_action(action)
    }
}
