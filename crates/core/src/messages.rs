//! User-facing texts shown by the session.

pub const EXIT_CONFIRM_DIRTY: &str =
    "You have unsaved changes. Leaving will log you out of secure mode and the changes will be lost. Log out anyway?";

pub const EXIT_CONFIRM_CLEAN: &str =
    "Leaving this page will log you out of secure mode. Log out now?";

/// Shown by the emergency back handler, before the page is fully set up.
pub const EXIT_CONFIRM_LOCKED: &str =
    "Secure mode is active. Going back will end the secure session. Continue?";

pub const UNLOAD_CONFIRM_DIRTY: &str = "You have unsaved changes. Are you sure you want to leave?";

pub const UNLOAD_CONFIRM_CLEAN: &str = "Leaving will end the secure session.";

pub const UNLOAD_CONFIRM_GENERIC: &str = "Are you sure you want to leave secure mode?";

pub const INACTIVITY_LOGOUT: &str =
    "Your secure session has expired due to inactivity. You will be logged out.";

pub const NOTHING_TO_SAVE: &str = "No changes to save";

pub const SAVE_FAILED: &str = "Error saving the matrix";

pub const UNDO_DONE: &str = "Action undone";

pub const UNDO_FAILED: &str = "Error undoing the action";

pub const REDO_DONE: &str = "Action redone";

pub const REDO_FAILED: &str = "Error redoing the action";

pub const LOAD_FAILED: &str = "Error loading the matrix";

pub fn saved(cells_updated: u64) -> String {
    format!("Matrix saved: {} cells updated", cells_updated)
}

pub fn exit_confirm(dirty: bool) -> &'static str {
    if dirty {
        EXIT_CONFIRM_DIRTY
    } else {
        EXIT_CONFIRM_CLEAN
    }
}

pub fn unload_confirm(dirty: bool) -> &'static str {
    if dirty {
        UNLOAD_CONFIRM_DIRTY
    } else {
        UNLOAD_CONFIRM_CLEAN
    }
}
