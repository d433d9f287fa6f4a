//! Save, undo/redo, initial load and the logout sequence.
//!
//! A save runs in three steps so the network never holds up the event loop:
//! [`PersistenceClient::prepare_save`] on the loop (snapshot, empty check,
//! in-flight slot), [`SaveJob::run`] on any thread, and
//! [`PersistenceClient::finish_save`] back on the loop. [`PersistenceClient::save`]
//! strings them together according to the configured [`SaveDispatch`].

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use chrono::Local;

use secmatrix_client::{resolve_csrf_token, Beacon, ClientError, MatrixApi, TokenSource};
use secmatrix_protocol::{logout_form, LoadCellsRequest, MatrixData, SaveMatrixRequest, SaveMatrixResponse};

use crate::endpoints::Endpoints;
use crate::grid::GridAdapter;
use crate::messages;
use crate::ports::{GridWidget, History, Host, NotificationKind, Notifier};
use crate::state::{SaveTicket, SessionState};

/// Where the HTTP part of a save runs.
#[derive(Debug, Clone, Default)]
pub enum SaveDispatch {
    /// On the calling thread; `save` returns the final outcome.
    #[default]
    Inline,
    /// On a worker thread; the completion is sent here and the host hands it
    /// back through `finish_save`.
    Background(Sender<SaveCompletion>),
}

/// Result of [`PersistenceClient::prepare_save`].
#[derive(Debug)]
pub enum SavePrepared {
    Ready(SaveJob),
    NothingToSave,
    InFlight,
    LoggingOut,
}

/// A snapshot ready to be sent. Holds the in-flight slot until its
/// completion is finished or dropped.
#[derive(Debug)]
pub struct SaveJob {
    path: String,
    request: SaveMatrixRequest,
    csrf_token: String,
    generation: u64,
    ticket: SaveTicket,
}

impl SaveJob {
    pub fn cell_count(&self) -> usize {
        self.request.matrix_data.cell_count()
    }

    pub fn run<A: MatrixApi + ?Sized>(self, api: &A) -> SaveCompletion {
        log::debug!("Saving {} cells to {}", self.cell_count(), self.path);
        let result = api.save_matrix(&self.path, &self.request, &self.csrf_token);
        SaveCompletion {
            result,
            generation: self.generation,
            ticket: self.ticket,
        }
    }
}

/// Server answer for a [`SaveJob`], not yet applied to the session.
#[derive(Debug)]
pub struct SaveCompletion {
    result: Result<SaveMatrixResponse, ClientError>,
    generation: u64,
    ticket: SaveTicket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { cells_updated: u64 },
    NothingToSave,
    Failed(String),
    /// Another save holds the slot.
    Busy,
    /// Running on a worker; the completion arrives later.
    Pending,
    /// Logout already began; nothing was sent or applied.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// Snapshot loaded into the grid.
    Reloaded { cells: usize },
    /// No snapshot in the answer; the host view was reloaded instead.
    ViewReloaded,
    Failed(String),
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { cells: usize },
    Failed(String),
}

pub struct PersistenceClient<A, B> {
    api: A,
    beacon: B,
    state: Arc<SessionState>,
    endpoints: Endpoints,
    grid: GridAdapter,
    landing_path: String,
    dispatch: SaveDispatch,
}

impl<A: MatrixApi, B: Beacon> PersistenceClient<A, B> {
    pub fn new(
        api: A,
        beacon: B,
        state: Arc<SessionState>,
        endpoints: Endpoints,
        grid: GridAdapter,
        landing_path: impl Into<String>,
    ) -> Self {
        Self {
            api,
            beacon,
            state,
            endpoints,
            grid,
            landing_path: landing_path.into(),
            dispatch: SaveDispatch::Inline,
        }
    }

    pub fn set_dispatch(&mut self, dispatch: SaveDispatch) {
        self.dispatch = dispatch;
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn grid(&self) -> &GridAdapter {
        &self.grid
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn beacon(&self) -> &B {
        &self.beacon
    }

    // ── Save ────────────────────────────────────────────────────────

    /// Snapshot the grid and claim the save slot.
    ///
    /// An empty snapshot clears dirty and notifies without touching the
    /// network.
    pub fn prepare_save<H: GridWidget + Notifier + TokenSource + ?Sized>(
        &self,
        host: &mut H,
    ) -> SavePrepared {
        if self.state.is_logging_out() {
            return SavePrepared::LoggingOut;
        }
        let Some(ticket) = self.state.begin_save() else {
            log::debug!("Save skipped: another save is in flight");
            return SavePrepared::InFlight;
        };

        let generation = self.state.edit_generation();
        let matrix_data = self.grid.extract(&*host);
        if matrix_data.is_empty() {
            drop(ticket);
            self.state.clear_dirty_since(generation);
            host.notify(NotificationKind::Info, messages::NOTHING_TO_SAVE);
            return SavePrepared::NothingToSave;
        }

        SavePrepared::Ready(SaveJob {
            path: self.endpoints.save(),
            request: SaveMatrixRequest { matrix_data },
            csrf_token: resolve_csrf_token(&*host),
            generation,
            ticket,
        })
    }

    /// Apply a save result. Results that arrive after logout began are dropped.
    pub fn finish_save<H: Notifier + ?Sized>(
        &self,
        host: &mut H,
        completion: SaveCompletion,
    ) -> SaveOutcome {
        let SaveCompletion {
            result,
            generation,
            ticket,
        } = completion;

        if self.state.is_logging_out() {
            log::debug!("Save result ignored: logout in progress");
            return SaveOutcome::Ignored;
        }

        let outcome = match result {
            Ok(resp) if resp.success => {
                let cells_updated = resp.cells_updated.unwrap_or(0);
                if !self.state.clear_dirty_since(generation) {
                    log::debug!("Grid edited while saving; keeping dirty flag");
                }
                self.state.stamp_update(Local::now());
                log::info!("Matrix saved: {} cells updated", cells_updated);
                host.notify(NotificationKind::Success, &messages::saved(cells_updated));
                SaveOutcome::Saved { cells_updated }
            }
            Ok(resp) => {
                let msg = resp
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| messages::SAVE_FAILED.to_string());
                log::warn!("Save rejected by server: {}", msg);
                host.notify(NotificationKind::Error, &msg);
                SaveOutcome::Failed(msg)
            }
            Err(e) => {
                let msg = failure_message(messages::SAVE_FAILED, &e);
                log::warn!("Save failed: {}", e);
                host.notify(NotificationKind::Error, &msg);
                SaveOutcome::Failed(msg)
            }
        };

        drop(ticket);
        outcome
    }

    // ── Undo / Redo ─────────────────────────────────────────────────

    pub fn undo<H: Host + ?Sized>(&self, host: &mut H) -> HistoryOutcome {
        self.history_step(host, &self.endpoints.undo(), messages::UNDO_DONE, messages::UNDO_FAILED)
    }

    pub fn redo<H: Host + ?Sized>(&self, host: &mut H) -> HistoryOutcome {
        self.history_step(host, &self.endpoints.redo(), messages::REDO_DONE, messages::REDO_FAILED)
    }

    fn history_step<H: Host + ?Sized>(
        &self,
        host: &mut H,
        path: &str,
        done: &str,
        failed: &str,
    ) -> HistoryOutcome {
        if self.state.is_logging_out() {
            return HistoryOutcome::Ignored;
        }

        let csrf = resolve_csrf_token(&*host);
        match self.api.history_step(path, &csrf) {
            Ok(resp) if resp.success => match resp.matrix_data {
                Some(data) => {
                    self.grid.load(host, &data);
                    host.notify(NotificationKind::Success, done);
                    HistoryOutcome::Reloaded {
                        cells: data.cell_count(),
                    }
                }
                None => {
                    host.notify(NotificationKind::Success, done);
                    host.reload();
                    HistoryOutcome::ViewReloaded
                }
            },
            Ok(resp) => {
                let msg = resp
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| failed.to_string());
                host.notify(NotificationKind::Error, &msg);
                HistoryOutcome::Failed(msg)
            }
            Err(e) => {
                log::warn!("History step {} failed: {}", path, e);
                let msg = failure_message(failed, &e);
                host.notify(NotificationKind::Error, &msg);
                HistoryOutcome::Failed(msg)
            }
        }
    }

    // ── Load ────────────────────────────────────────────────────────

    /// Put `data` into the grid as-is.
    pub fn load_data<W: GridWidget + ?Sized>(&self, widget: &mut W, data: &MatrixData) {
        self.grid.load(widget, data);
    }

    /// Fetch a window of cells from the server and load it into the grid.
    pub fn load_initial<H: Host + ?Sized>(
        &self,
        host: &mut H,
        window: &LoadCellsRequest,
    ) -> LoadOutcome {
        let csrf = resolve_csrf_token(&*host);
        match self.api.load_cells(&self.endpoints.load_cells(), window, &csrf) {
            Ok(resp) if resp.success => {
                let cells = resp.cells.cell_count();
                log::info!(
                    "Loaded {} cells (rows {}..{}, cols {}..{})",
                    cells,
                    window.start_row,
                    window.end_row,
                    window.start_col,
                    window.end_col
                );
                self.grid.load(host, &resp.cells);
                LoadOutcome::Loaded { cells }
            }
            Ok(resp) => {
                let msg = resp
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| messages::LOAD_FAILED.to_string());
                host.notify(NotificationKind::Error, &msg);
                LoadOutcome::Failed(msg)
            }
            Err(e) => {
                log::warn!("Load failed: {}", e);
                let msg = failure_message(messages::LOAD_FAILED, &e);
                host.notify(NotificationKind::Error, &msg);
                LoadOutcome::Failed(msg)
            }
        }
    }

    // ── Logout ──────────────────────────────────────────────────────

    /// Beacon sent when the host is torn down without a logout sequence.
    pub fn send_unload_beacon<H: TokenSource + ?Sized>(&self, host: &H) -> bool {
        if self.state.is_logging_out() {
            return false;
        }
        let form = logout_form(&resolve_csrf_token(host));
        self.beacon.send_beacon(&self.endpoints.logout_beacon(), &form)
    }

    /// Run the logout sequence once: beacon, redundant logout request,
    /// clear dirty, navigate to the landing page. Neither request's result
    /// can stop the navigation. Returns false if a sequence already ran.
    pub fn logout<H: History + TokenSource + ?Sized>(&self, host: &mut H) -> bool {
        if !self.state.begin_logout() {
            log::debug!("Logout already in progress");
            return false;
        }
        log::info!("Secure logout started");

        let csrf = resolve_csrf_token(&*host);
        let logout_path = self.endpoints.logout();

        if !self.beacon.send_beacon(&logout_path, &logout_form(&csrf)) {
            log::warn!("Logout beacon could not be queued");
        }

        match self.api.logout(&logout_path, &csrf) {
            Ok(status) => log::info!("Logout request answered with HTTP {}", status),
            Err(e) => log::warn!("Logout request failed: {}", e),
        }

        self.state.clear_dirty();
        host.navigate(&self.landing_path);
        true
    }
}

impl<A, B> PersistenceClient<A, B>
where
    A: MatrixApi + Clone + Send + 'static,
    B: Beacon,
{
    /// Save the grid. With [`SaveDispatch::Background`] this returns
    /// [`SaveOutcome::Pending`] and the host finishes the save later.
    pub fn save<H: Host + ?Sized>(&self, host: &mut H) -> SaveOutcome {
        let job = match self.prepare_save(host) {
            SavePrepared::Ready(job) => job,
            SavePrepared::NothingToSave => return SaveOutcome::NothingToSave,
            SavePrepared::InFlight => return SaveOutcome::Busy,
            SavePrepared::LoggingOut => return SaveOutcome::Ignored,
        };

        match &self.dispatch {
            SaveDispatch::Inline => {
                let completion = job.run(&self.api);
                self.finish_save(host, completion)
            }
            SaveDispatch::Background(tx) => {
                let api = self.api.clone();
                let tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name("secmatrix-save".into())
                    .spawn(move || {
                        // A closed receiver drops the completion, which frees the slot.
                        let _ = tx.send(job.run(&api));
                    });
                match spawned {
                    Ok(_) => SaveOutcome::Pending,
                    Err(e) => {
                        log::error!("Could not spawn save worker: {}", e);
                        let msg = messages::SAVE_FAILED.to_string();
                        host.notify(NotificationKind::Error, &msg);
                        SaveOutcome::Failed(msg)
                    }
                }
            }
        }
    }
}

/// Server text when the server sent one, otherwise the generic text plus cause.
fn failure_message(generic: &str, err: &ClientError) -> String {
    match err.server_message() {
        Some(msg) => msg.to_string(),
        None => format!("{}: {}", generic, err),
    }
}
