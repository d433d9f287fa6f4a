//! Fake ports for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use secmatrix_client::{Beacon, ClientError, CookieJar, MatrixApi, TokenSource};
use secmatrix_protocol::{
    HistoryResponse, LoadCellsRequest, LoadCellsResponse, SaveMatrixRequest, SaveMatrixResponse,
};

use crate::grid::Sheet;
use crate::ports::{Clock, Dialogs, GridWidget, History, NotificationKind, Notifier};

pub(crate) struct FakeHost {
    pub path: String,
    pub pushed: Vec<String>,
    pub navigations: Vec<String>,
    pub reloads: usize,
    pub confirm_answers: VecDeque<bool>,
    pub confirms: Vec<String>,
    pub alerts: Vec<String>,
    pub notes: Vec<(NotificationKind, String)>,
    pub loaded_sheets: Vec<Sheet>,
    pub data: Option<Value>,
    pub resizes: usize,
    pub jar: CookieJar,
}

impl FakeHost {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            pushed: Vec::new(),
            navigations: Vec::new(),
            reloads: 0,
            confirm_answers: VecDeque::new(),
            confirms: Vec::new(),
            alerts: Vec::new(),
            notes: Vec::new(),
            loaded_sheets: Vec::new(),
            data: None,
            resizes: 0,
            jar: CookieJar::parse("sessionid=s1; csrftoken=tok"),
        }
    }

    /// Queue the answer for the next confirm dialog. Unanswered dialogs decline.
    pub fn answer(&mut self, yes: bool) {
        self.confirm_answers.push_back(yes);
    }

    /// Edit a cell the way the widget would.
    pub fn set_cell(&mut self, row: u32, col: u32, text: &str) {
        let data = self
            .data
            .get_or_insert_with(|| json!([{ "name": "Hoja1", "rows": {} }]));
        data[0]["rows"][row.to_string()]["cells"][col.to_string()] = json!({ "text": text });
    }

    pub fn last_note(&self) -> Option<&(NotificationKind, String)> {
        self.notes.last()
    }
}

impl History for FakeHost {
    fn current_path(&self) -> String {
        self.path.clone()
    }

    fn push_state(&mut self, path: &str) {
        self.pushed.push(path.to_string());
    }

    fn navigate(&mut self, location: &str) {
        self.navigations.push(location.to_string());
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}

impl Dialogs for FakeHost {
    fn confirm(&mut self, message: &str) -> bool {
        self.confirms.push(message.to_string());
        self.confirm_answers.pop_front().unwrap_or(false)
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}

impl Notifier for FakeHost {
    fn notify(&mut self, kind: NotificationKind, message: &str) {
        self.notes.push((kind, message.to_string()));
    }
}

impl GridWidget for FakeHost {
    fn load_data(&mut self, sheets: &[Sheet]) {
        self.loaded_sheets = sheets.to_vec();
        self.data = serde_json::to_value(sheets).ok();
    }

    fn get_data(&self) -> Option<Value> {
        self.data.clone()
    }

    fn resize(&mut self) {
        self.resizes += 1;
    }
}

impl TokenSource for FakeHost {
    fn cookie(&self, name: &str) -> Option<String> {
        self.jar.cookie(name)
    }

    fn form_field(&self, name: &str) -> Option<String> {
        self.jar.form_field(name)
    }
}

#[derive(Default)]
pub(crate) struct ApiLog {
    pub saves: Vec<(String, SaveMatrixRequest, String)>,
    pub save_responses: VecDeque<Result<SaveMatrixResponse, ClientError>>,
    pub history: Vec<String>,
    pub history_responses: VecDeque<Result<HistoryResponse, ClientError>>,
    pub loads: Vec<(String, LoadCellsRequest)>,
    pub load_responses: VecDeque<Result<LoadCellsResponse, ClientError>>,
    pub logouts: Vec<String>,
    pub logout_fails: bool,
}

/// Records every call. Empty response queues answer with success.
#[derive(Clone, Default)]
pub(crate) struct FakeApi {
    pub log: Arc<Mutex<ApiLog>>,
}

impl FakeApi {
    pub fn respond_save(&self, resp: Result<SaveMatrixResponse, ClientError>) {
        self.log.lock().unwrap().save_responses.push_back(resp);
    }

    pub fn respond_history(&self, resp: Result<HistoryResponse, ClientError>) {
        self.log.lock().unwrap().history_responses.push_back(resp);
    }

    pub fn respond_load(&self, resp: Result<LoadCellsResponse, ClientError>) {
        self.log.lock().unwrap().load_responses.push_back(resp);
    }

    pub fn save_count(&self) -> usize {
        self.log.lock().unwrap().saves.len()
    }

    pub fn last_save(&self) -> Option<(String, SaveMatrixRequest, String)> {
        self.log.lock().unwrap().saves.last().cloned()
    }

    pub fn history_calls(&self) -> Vec<String> {
        self.log.lock().unwrap().history.clone()
    }

    pub fn logout_count(&self) -> usize {
        self.log.lock().unwrap().logouts.len()
    }
}

impl MatrixApi for FakeApi {
    fn save_matrix(
        &self,
        path: &str,
        request: &SaveMatrixRequest,
        csrf_token: &str,
    ) -> Result<SaveMatrixResponse, ClientError> {
        let mut log = self.log.lock().unwrap();
        log.saves
            .push((path.to_string(), request.clone(), csrf_token.to_string()));
        log.save_responses.pop_front().unwrap_or_else(|| {
            Ok(SaveMatrixResponse {
                success: true,
                cells_updated: Some(request.matrix_data.cell_count() as u64),
                ..Default::default()
            })
        })
    }

    fn history_step(&self, path: &str, _csrf_token: &str) -> Result<HistoryResponse, ClientError> {
        let mut log = self.log.lock().unwrap();
        log.history.push(path.to_string());
        log.history_responses.pop_front().unwrap_or_else(|| {
            Ok(HistoryResponse {
                success: true,
                ..Default::default()
            })
        })
    }

    fn load_cells(
        &self,
        path: &str,
        request: &LoadCellsRequest,
        _csrf_token: &str,
    ) -> Result<LoadCellsResponse, ClientError> {
        let mut log = self.log.lock().unwrap();
        log.loads.push((path.to_string(), *request));
        log.load_responses.pop_front().unwrap_or_else(|| {
            Ok(LoadCellsResponse {
                success: true,
                ..Default::default()
            })
        })
    }

    fn logout(&self, path: &str, _csrf_token: &str) -> Result<u16, ClientError> {
        let mut log = self.log.lock().unwrap();
        log.logouts.push(path.to_string());
        if log.logout_fails {
            Err(ClientError::Network("connection refused".into()))
        } else {
            Ok(302)
        }
    }
}

pub(crate) type SentBeacon = (String, Vec<(&'static str, String)>);

#[derive(Clone, Default)]
pub(crate) struct FakeBeacon {
    pub sent: Arc<Mutex<Vec<SentBeacon>>>,
}

impl FakeBeacon {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl Beacon for FakeBeacon {
    fn send_beacon(&self, path: &str, form: &[(&'static str, String)]) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((path.to_string(), form.to_vec()));
        true
    }
}

#[derive(Clone)]
pub(crate) struct MockClock {
    base: Instant,
    offset_nanos: Arc<AtomicU64>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}
