//! One guarded secure matrix session.
//!
//! The host feeds page events into [`SecureMatrixSession::dispatch`] and calls
//! [`SecureMatrixSession::tick`] from its event loop; the session answers with
//! what the host must suppress and drives the guard, timers and persistence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use secmatrix_client::{Beacon, MatrixApi};
use secmatrix_config::Settings;
use secmatrix_protocol::{LoadCellsRequest, MatrixData};

use crate::autosave::AutoSave;
use crate::endpoints::Endpoints;
use crate::grid::GridAdapter;
use crate::guard::{GuardAction, GuardConfig, GuardPhase, GuardResponse, SessionGuard};
use crate::inactivity::InactivityMonitor;
use crate::messages;
use crate::persistence::{
    HistoryOutcome, LoadOutcome, PersistenceClient, SaveCompletion, SaveDispatch, SaveOutcome,
};
use crate::ports::{Clock, Host, RealClock};
use crate::shortcuts::KeyInput;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Input that resets the inactivity timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    PopState,
    HashChange,
    BeforeUnload,
    Unload,
    VisibilityChange(Visibility),
    ContextMenu,
    DragOver,
    Drop,
    /// Also counts as activity.
    KeyDown(KeyInput),
    Activity(ActivityKind),
    GridChanged,
    Resize,
    SaveClicked,
    LogoutClicked,
}

/// How the host must treat the event it just dispatched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventResponse {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
    pub unload_confirmation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    AutoSaved(SaveOutcome),
    /// The inactivity timeout ran the logout sequence.
    LoggedOut,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Overrides the code found in the current location.
    pub access_code: Option<String>,
    pub inactivity_timeout: Duration,
    pub auto_save_interval: Duration,
    pub history_buffer: usize,
    pub landing_path: String,
    pub emergency_landing_path: String,
    pub sheet_name: String,
    /// Cells requested when no initial data is supplied.
    pub load_window: LoadCellsRequest,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_code: None,
            inactivity_timeout: Duration::from_secs(30 * 60),
            auto_save_interval: Duration::from_secs(30),
            history_buffer: 3,
            landing_path: "/secure/logout-secure/".to_string(),
            emergency_landing_path: "/".to_string(),
            sheet_name: "Hoja1".to_string(),
            load_window: LoadCellsRequest::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            access_code: settings.access_code.clone(),
            inactivity_timeout: settings.inactivity_timeout(),
            auto_save_interval: settings.auto_save_interval(),
            history_buffer: settings.history_buffer as usize,
            landing_path: settings.landing_path.clone(),
            emergency_landing_path: settings.emergency_landing_path.clone(),
            sheet_name: settings.grid.sheet_name.clone(),
            load_window: LoadCellsRequest {
                start_row: 0,
                end_row: settings.grid.rows,
                start_col: 0,
                end_col: settings.grid.cols,
            },
        }
    }
}

pub struct SecureMatrixSession<H, A, B, C: Clock = RealClock> {
    host: H,
    persistence: PersistenceClient<A, B>,
    guard: SessionGuard,
    inactivity: InactivityMonitor<C>,
    autosave: AutoSave<C>,
    state: Arc<SessionState>,
    load_window: LoadCellsRequest,
    listening: bool,
}

impl<H, A, B> SecureMatrixSession<H, A, B, RealClock>
where
    H: Host,
    A: MatrixApi + Clone + Send + 'static,
    B: Beacon,
{
    pub fn new(host: H, api: A, beacon: B, config: SessionConfig) -> Self {
        Self::with_clock(host, api, beacon, config, RealClock)
    }
}

impl<H, A, B, C> SecureMatrixSession<H, A, B, C>
where
    H: Host,
    A: MatrixApi + Clone + Send + 'static,
    B: Beacon,
    C: Clock + Clone,
{
    /// Create the session and arm the emergency guard right away.
    pub fn with_clock(mut host: H, api: A, beacon: B, config: SessionConfig, clock: C) -> Self {
        let state = SessionState::new();
        let endpoints = Endpoints::resolve(config.access_code.as_deref(), &host.current_path());
        log::info!(
            "Secure matrix session for {}",
            endpoints.access_code().unwrap_or("<unknown access code>")
        );

        let persistence = PersistenceClient::new(
            api,
            beacon,
            Arc::clone(&state),
            endpoints,
            GridAdapter::new(config.sheet_name.as_str()),
            config.landing_path.as_str(),
        );

        let mut guard = SessionGuard::new(GuardConfig {
            history_buffer: config.history_buffer,
            emergency_landing: config.emergency_landing_path.clone(),
        });
        guard.arm_emergency(&mut host);

        Self {
            host,
            persistence,
            guard,
            inactivity: InactivityMonitor::with_clock(config.inactivity_timeout, clock.clone()),
            autosave: AutoSave::with_clock(config.auto_save_interval, clock),
            state,
            load_window: config.load_window,
            listening: false,
        }
    }

    pub fn set_save_dispatch(&mut self, dispatch: SaveDispatch) {
        self.persistence.set_dispatch(dispatch);
    }

    /// The host finished building the view. Loads `initial` (or fetches the
    /// configured window when `None`), arms the full guard and starts timers.
    pub fn on_structure_ready(&mut self, initial: Option<&MatrixData>) -> Option<LoadOutcome> {
        let loaded = match initial {
            Some(data) => {
                self.persistence.load_data(&mut self.host, data);
                None
            }
            None => Some(self.persistence.load_initial(&mut self.host, &self.load_window)),
        };

        self.initialize_security();
        self.autosave.start();
        self.listening = true;
        loaded
    }

    /// Arm the full guard and the inactivity timer. Runs once per session.
    pub fn initialize_security(&mut self) -> bool {
        if !self.state.mark_security_initialized() {
            log::debug!("Security already initialized");
            return false;
        }
        self.guard.arm_full(&mut self.host);
        self.inactivity.arm();
        true
    }

    pub fn dispatch(&mut self, event: PageEvent) -> EventResponse {
        let dirty = self.state.is_dirty();
        let stops = matches!(
            event,
            PageEvent::PopState | PageEvent::HashChange | PageEvent::KeyDown(_)
        );

        let resp = match event {
            PageEvent::PopState | PageEvent::HashChange => self.guard.on_back(&mut self.host, dirty),
            PageEvent::BeforeUnload => self.guard.on_before_unload(dirty),
            PageEvent::Unload => self.guard.on_unload(),
            PageEvent::VisibilityChange(v) => {
                self.guard.on_visibility(v == Visibility::Hidden, dirty)
            }
            PageEvent::ContextMenu | PageEvent::DragOver | PageEvent::Drop => {
                self.guard.on_blocked_gesture()
            }
            PageEvent::KeyDown(input) => {
                self.inactivity.record_activity();
                self.guard.on_key(&mut self.host, &input, dirty)
            }
            PageEvent::Activity(_) => {
                self.inactivity.record_activity();
                GuardResponse::default()
            }
            PageEvent::GridChanged => {
                if self.listening && !self.state.is_logging_out() {
                    self.state.mark_dirty();
                }
                GuardResponse::default()
            }
            PageEvent::Resize => {
                self.host.resize();
                GuardResponse::default()
            }
            PageEvent::SaveClicked => {
                let action = (!self.state.is_saving()).then_some(GuardAction::Save);
                GuardResponse { action, ..GuardResponse::default() }
            }
            PageEvent::LogoutClicked => {
                let action = self.guard.request_exit(&mut self.host, dirty);
                GuardResponse { action, ..GuardResponse::default() }
            }
        };

        if let Some(action) = resp.action {
            self.perform(action);
        }

        EventResponse {
            default_prevented: resp.prevent_default,
            propagation_stopped: resp.prevent_default && stops,
            unload_confirmation: resp.unload_confirmation,
        }
    }

    fn perform(&mut self, action: GuardAction) {
        match action {
            GuardAction::Logout => {
                self.persistence.logout(&mut self.host);
            }
            GuardAction::Save => {
                self.save();
            }
            GuardAction::Undo => {
                self.undo();
            }
            GuardAction::Redo => {
                self.redo();
            }
            GuardAction::UnloadBeacon => {
                self.persistence.send_unload_beacon(&self.host);
            }
        }
    }

    /// Advance timers: inactivity first, then auto-save.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state.is_logging_out() {
            return TickOutcome::Idle;
        }

        if self.inactivity.poll() {
            self.host.alert(messages::INACTIVITY_LOGOUT);
            self.guard.force_exit();
            self.persistence.logout(&mut self.host);
            return TickOutcome::LoggedOut;
        }

        if self.autosave.poll(self.state.is_dirty()) {
            log::debug!("Auto-save tick with unsaved changes");
            return TickOutcome::AutoSaved(self.save());
        }

        TickOutcome::Idle
    }

    pub fn save(&mut self) -> SaveOutcome {
        self.persistence.save(&mut self.host)
    }

    /// Apply a background save result handed back by the host.
    pub fn finish_save(&mut self, completion: SaveCompletion) -> SaveOutcome {
        self.persistence.finish_save(&mut self.host, completion)
    }

    pub fn undo(&mut self) -> HistoryOutcome {
        self.persistence.undo(&mut self.host)
    }

    pub fn redo(&mut self) -> HistoryOutcome {
        self.persistence.redo(&mut self.host)
    }

    /// Fetch the configured window again, for hosts that honor
    /// [`History::reload`](crate::ports::History::reload) in place.
    pub fn reload_view(&mut self) -> LoadOutcome {
        self.persistence.load_initial(&mut self.host, &self.load_window)
    }

    /// The explicit logout control: confirm, then run the logout sequence.
    pub fn logout_secure(&mut self) -> bool {
        let dirty = self.state.is_dirty();
        match self.guard.request_exit(&mut self.host, dirty) {
            Some(action) => {
                self.perform(action);
                true
            }
            None => false,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn phase(&self) -> GuardPhase {
        self.guard.phase()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    pub fn is_saving(&self) -> bool {
        self.state.is_saving()
    }

    pub fn is_logging_out(&self) -> bool {
        self.state.is_logging_out()
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.state.last_update()
    }

    pub fn endpoints(&self) -> &Endpoints {
        self.persistence.endpoints()
    }

    pub fn persistence(&self) -> &PersistenceClient<A, B> {
        &self.persistence
    }
}
