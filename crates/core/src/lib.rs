//! Secure matrix session core.
//!
//! Host-agnostic logic for one guarded editing session: the two-phase exit
//! guard, dirty tracking and auto-save, the inactivity timeout, and the
//! persistence client that saves, steps history and logs out.
//!
//! Everything the host provides (history, dialogs, notifications, the grid
//! widget, cookies) comes in through the traits in [`ports`]. The CLI's
//! terminal UI is one host; tests use fakes.

pub mod autosave;
pub mod endpoints;
pub mod grid;
pub mod guard;
pub mod inactivity;
pub mod messages;
pub mod persistence;
pub mod ports;
pub mod session;
pub mod shortcuts;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use autosave::AutoSave;
pub use endpoints::{access_code_from_path, Endpoints};
pub use grid::{GridAdapter, Sheet, SheetCell, SheetRow};
pub use guard::{GuardAction, GuardConfig, GuardPhase, GuardResponse, SessionGuard};
pub use inactivity::InactivityMonitor;
pub use persistence::{
    HistoryOutcome, LoadOutcome, PersistenceClient, SaveCompletion, SaveDispatch, SaveJob,
    SaveOutcome, SavePrepared,
};
pub use ports::{Clock, Dialogs, GridWidget, History, Host, NotificationKind, Notifier, RealClock};
pub use session::{
    ActivityKind, EventResponse, PageEvent, SecureMatrixSession, SessionConfig, TickOutcome,
    Visibility,
};
pub use shortcuts::{Key, KeyInput, ShortcutAction, ShortcutMap};
pub use state::{SaveTicket, SessionState};

pub use secmatrix_client::{resolve_csrf_token, Beacon, ClientError, MatrixApi, TokenSource};
pub use secmatrix_protocol::MatrixData;
