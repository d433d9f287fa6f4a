//! Keyboard shortcuts the session intercepts.
//!
//! Bindings are stored as normalized combos (`ctrl+shift+alt+meta+key`) the
//! way user keybindings are stored elsewhere in this workspace. Lookup falls
//! back from the exact combo to the combo without shift, then to the bare key,
//! so `F5` matches with any modifiers and `Ctrl+Shift+R` still refreshes.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Char(char),
    F(u8),
    Escape,
    Other(String),
}

impl Key {
    fn name(&self) -> String {
        match self {
            Key::Char(c) => c.to_lowercase().collect(),
            Key::F(n) => format!("f{}", n),
            Key::Escape => "escape".to_string(),
            Key::Other(name) => name.to_lowercase(),
        }
    }
}

/// A key press as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    /// Cmd on macOS.
    pub meta: bool,
}

impl KeyInput {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            alt: false,
            shift: false,
            meta: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    fn combo(&self, with_shift: bool) -> String {
        let mut result = String::new();
        if self.ctrl { result.push_str("ctrl+"); }
        if self.shift && with_shift { result.push_str("shift+"); }
        if self.alt { result.push_str("alt+"); }
        if self.meta { result.push_str("meta+"); }
        result.push_str(&self.key.name());
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    /// F5 / Ctrl+R: confirm, then log out instead of reloading.
    Refresh,
    /// Alt+F4: confirm, then log out.
    CloseWindow,
    /// Escape: the explicit logout control.
    Logout,
    Save,
    Undo,
    Redo,
}

#[derive(Debug, Clone)]
pub struct ShortcutMap {
    bindings: HashMap<String, ShortcutAction>,
}

impl Default for ShortcutMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortcutMap {
    pub fn new() -> Self {
        let mut map = Self {
            bindings: HashMap::new(),
        };
        for (combo, action) in default_shortcuts() {
            map.bind(combo, *action);
        }
        map
    }

    pub fn bind(&mut self, combo: &str, action: ShortcutAction) {
        self.bindings.insert(normalize_key(combo), action);
    }

    pub fn resolve(&self, input: &KeyInput) -> Option<ShortcutAction> {
        self.bindings
            .get(&input.combo(true))
            .or_else(|| self.bindings.get(&input.combo(false)))
            .or_else(|| self.bindings.get(&input.key.name()))
            .copied()
    }
}

/// Normalize key string to canonical form: "ctrl+shift+alt+meta+key"
pub fn normalize_key(key: &str) -> String {
    let key = key.to_lowercase();

    let mut has_ctrl = false;
    let mut has_shift = false;
    let mut has_alt = false;
    let mut has_meta = false;
    let mut main_key = "";

    for part in key.split('+') {
        match part.trim() {
            "ctrl" | "control" => has_ctrl = true,
            "shift" => has_shift = true,
            "alt" | "option" => has_alt = true,
            "meta" | "cmd" | "command" | "super" => has_meta = true,
            other => main_key = other,
        }
    }

    let mut result = String::new();
    if has_ctrl { result.push_str("ctrl+"); }
    if has_shift { result.push_str("shift+"); }
    if has_alt { result.push_str("alt+"); }
    if has_meta { result.push_str("meta+"); }
    result.push_str(main_key);
    result
}

fn default_shortcuts() -> &'static [(&'static str, ShortcutAction)] {
    &[
        // Exit paths
        ("f5", ShortcutAction::Refresh),
        ("ctrl+r", ShortcutAction::Refresh),
        ("alt+f4", ShortcutAction::CloseWindow),
        ("escape", ShortcutAction::Logout),

        // Persistence
        ("ctrl+s", ShortcutAction::Save),
        ("cmd+s", ShortcutAction::Save),
        ("ctrl+z", ShortcutAction::Undo),
        ("cmd+z", ShortcutAction::Undo),
        ("ctrl+shift+z", ShortcutAction::Redo),
        ("cmd+shift+z", ShortcutAction::Redo),
        ("ctrl+y", ShortcutAction::Redo),
        ("cmd+y", ShortcutAction::Redo),
    ]
}
