//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain      | Description                              |
//! |---------|-------------|------------------------------------------|
//! | 0       | Universal   | Success                                  |
//! | 1       | Universal   | General error (unspecified)              |
//! | 2       | Universal   | CLI usage error (bad args, missing file) |
//! | 3-9     | input       | Local files and settings                 |
//! | 20-29   | matrix      | Secure matrix requests                   |
//! | 30-39   | terminal    | Interactive session                      |

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Input (3-9)
// =============================================================================

/// Input file or settings file could not be read.
pub const EXIT_IO: u8 = 3;

/// Input file or settings file is not valid JSON.
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// Matrix (20-29)
// =============================================================================

/// Save failed: unreachable server, HTTP error, or `success: false`.
pub const EXIT_SAVE_FAILED: u8 = 20;

/// Undo or redo failed.
pub const EXIT_HISTORY_FAILED: u8 = 21;

/// Loading cells failed.
pub const EXIT_LOAD_FAILED: u8 = 22;

/// Logout beacon could not be flushed before the deadline.
pub const EXIT_LOGOUT_INCOMPLETE: u8 = 23;

// =============================================================================
// Terminal (30-39)
// =============================================================================

/// Terminal could not be set up (not a TTY, raw mode refused).
pub const EXIT_TERMINAL: u8 = 30;
