//! End-to-end session flow through the public API, with a host written the
//! way an embedding application would write one.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use secmatrix_core::{
    Beacon, ClientError, Clock, Dialogs, GridWidget, History, MatrixApi, MatrixData,
    NotificationKind, Notifier, PageEvent, SecureMatrixSession, SessionConfig, Sheet, TickOutcome,
    TokenSource,
};
use secmatrix_protocol::{
    HistoryResponse, LoadCellsRequest, LoadCellsResponse, SaveMatrixRequest, SaveMatrixResponse,
};

#[derive(Default)]
struct Page {
    sheets: Vec<Sheet>,
    confirm: bool,
    navigated: Vec<String>,
    notes: Vec<(NotificationKind, String)>,
    alerts: usize,
}

/// Host sharing its page with the test so the test can edit cells.
#[derive(Clone, Default)]
struct SharedHost(Rc<RefCell<Page>>);

impl SharedHost {
    fn edit(&self, row: u32, col: u32, text: &str) {
        let mut page = self.0.borrow_mut();
        let sheet = &mut page.sheets[0];
        sheet
            .rows
            .entry(row)
            .or_default()
            .cells
            .insert(col, secmatrix_core::SheetCell { text: text.into() });
    }
}

impl History for SharedHost {
    fn current_path(&self) -> String {
        "/secure/abc123/matrix-view/".into()
    }
    fn push_state(&mut self, _path: &str) {}
    fn navigate(&mut self, location: &str) {
        self.0.borrow_mut().navigated.push(location.into());
    }
    fn reload(&mut self) {}
}

impl Dialogs for SharedHost {
    fn confirm(&mut self, _message: &str) -> bool {
        self.0.borrow().confirm
    }
    fn alert(&mut self, _message: &str) {
        self.0.borrow_mut().alerts += 1;
    }
}

impl Notifier for SharedHost {
    fn notify(&mut self, kind: NotificationKind, message: &str) {
        self.0.borrow_mut().notes.push((kind, message.into()));
    }
}

impl GridWidget for SharedHost {
    fn load_data(&mut self, sheets: &[Sheet]) {
        self.0.borrow_mut().sheets = sheets.to_vec();
    }
    fn get_data(&self) -> Option<serde_json::Value> {
        serde_json::to_value(&self.0.borrow().sheets).ok()
    }
    fn resize(&mut self) {}
}

impl TokenSource for SharedHost {
    fn cookie(&self, name: &str) -> Option<String> {
        (name == "csrftoken").then(|| "csrf-1".to_string())
    }
    fn form_field(&self, _name: &str) -> Option<String> {
        None
    }
}

#[derive(Clone, Default)]
struct RecordingApi {
    saved: Arc<Mutex<Vec<serde_json::Value>>>,
    logouts: Arc<Mutex<usize>>,
}

impl MatrixApi for RecordingApi {
    fn save_matrix(
        &self,
        _path: &str,
        request: &SaveMatrixRequest,
        _csrf_token: &str,
    ) -> Result<SaveMatrixResponse, ClientError> {
        self.saved.lock().unwrap().push(serde_json::to_value(request).unwrap());
        Ok(SaveMatrixResponse {
            success: true,
            cells_updated: Some(1),
            ..Default::default()
        })
    }

    fn history_step(&self, _path: &str, _csrf_token: &str) -> Result<HistoryResponse, ClientError> {
        Err(ClientError::Network("not used".into()))
    }

    fn load_cells(
        &self,
        _path: &str,
        _request: &LoadCellsRequest,
        _csrf_token: &str,
    ) -> Result<LoadCellsResponse, ClientError> {
        Err(ClientError::Network("not used".into()))
    }

    fn logout(&self, _path: &str, _csrf_token: &str) -> Result<u16, ClientError> {
        *self.logouts.lock().unwrap() += 1;
        Err(ClientError::Network("offline".into()))
    }
}

#[derive(Default)]
struct CountingBeacon(Mutex<Vec<String>>);

impl Beacon for &CountingBeacon {
    fn send_beacon(&self, path: &str, _form: &[(&'static str, String)]) -> bool {
        self.0.lock().unwrap().push(path.into());
        true
    }
}

#[derive(Clone)]
struct StepClock {
    base: Instant,
    secs: Arc<AtomicU64>,
}

impl StepClock {
    fn new() -> Self {
        Self { base: Instant::now(), secs: Arc::new(AtomicU64::new(0)) }
    }
    fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for StepClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_secs(self.secs.load(Ordering::SeqCst))
    }
}

fn initial() -> MatrixData {
    let mut data = MatrixData::new();
    data.insert(0, 0, "100");
    data.insert(0, 1, "200");
    data
}

#[test]
fn edit_save_then_idle_logout() {
    let host = SharedHost::default();
    let api = RecordingApi::default();
    let beacon = CountingBeacon::default();
    let clock = StepClock::new();

    let mut session = SecureMatrixSession::with_clock(
        host.clone(),
        api.clone(),
        &beacon,
        SessionConfig::default(),
        clock.clone(),
    );
    session.on_structure_ready(Some(&initial()));

    host.edit(0, 1, "250");
    session.dispatch(PageEvent::GridChanged);
    assert!(session.is_dirty());

    clock.advance(30);
    assert!(matches!(session.tick(), TickOutcome::AutoSaved(_)));
    assert_eq!(
        api.saved.lock().unwrap()[0],
        serde_json::json!({ "matrix_data": { "0": { "0": "100", "1": "250" } } })
    );
    assert!(!session.is_dirty());
    assert!(host.0.borrow().notes.last().unwrap().1.contains("1 cells updated"));

    clock.advance(30 * 60);
    assert_eq!(session.tick(), TickOutcome::LoggedOut);
    clock.advance(30 * 60);
    assert_eq!(session.tick(), TickOutcome::Idle);

    assert_eq!(host.0.borrow().alerts, 1);
    assert_eq!(*api.logouts.lock().unwrap(), 1);
    assert_eq!(host.0.borrow().navigated, vec!["/secure/logout-secure/".to_string()]);
    assert_eq!(
        *beacon.0.lock().unwrap(),
        vec!["/secure/abc123/logout-secure/".to_string()]
    );
}

#[test]
fn declined_back_keeps_the_session() {
    let host = SharedHost::default();
    let beacon = CountingBeacon::default();
    let mut session = SecureMatrixSession::new(
        host.clone(),
        RecordingApi::default(),
        &beacon,
        SessionConfig::default(),
    );
    session.on_structure_ready(Some(&initial()));

    let resp = session.dispatch(PageEvent::PopState);
    assert!(resp.default_prevented);
    assert!(host.0.borrow().navigated.is_empty());
    assert!(!session.is_logging_out());
    assert!(beacon.0.lock().unwrap().is_empty());
}
