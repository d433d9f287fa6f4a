//! Secure matrix HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Paths are absolute server paths (`/secure/<code>/api/save-matrix/`);
//! the client only owns the base URL, timeouts and the session cookie.

use std::time::Duration;

use secmatrix_protocol::{
    logout_form, HistoryResponse, LoadCellsRequest, LoadCellsResponse, SaveMatrixRequest,
    SaveMatrixResponse, CSRF_HEADER,
};

/// Error type for secure matrix requests.
#[derive(Debug)]
pub enum ClientError {
    /// Transport failure (connection refused, timeout, TLS)
    Network(String),
    /// Non-2xx response without a usable error message
    Http(u16, String),
    /// Server answered with a message explaining the failure
    Server(String),
    /// Response body was not the expected JSON
    Parse(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Http(code, _) => write!(f, "HTTP {}", code),
            ClientError::Server(msg) => write!(f, "{}", msg),
            ClientError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl ClientError {
    /// Message supplied by the server, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Server(msg) => Some(msg),
            _ => None,
        }
    }
}

/// Ordinary request port used by the session for save, undo/redo, load and logout.
///
/// Responses with `success: false` are returned as `Ok`; only transport and
/// protocol failures are errors.
pub trait MatrixApi {
    fn save_matrix(
        &self,
        path: &str,
        request: &SaveMatrixRequest,
        csrf_token: &str,
    ) -> Result<SaveMatrixResponse, ClientError>;

    /// Undo or redo, depending on `path`. No request body.
    fn history_step(&self, path: &str, csrf_token: &str) -> Result<HistoryResponse, ClientError>;

    fn load_cells(
        &self,
        path: &str,
        request: &LoadCellsRequest,
        csrf_token: &str,
    ) -> Result<LoadCellsResponse, ClientError>;

    /// Redundant logout request. Returns the HTTP status; any status counts as delivered.
    fn logout(&self, path: &str, csrf_token: &str) -> Result<u16, ClientError>;
}

/// Connection settings for [`MatrixClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Scheme + host (+ port), e.g. `https://books.example`
    pub base_url: String,
    /// Raw `Cookie` header carrying the authenticated session
    pub cookie: Option<String>,
    pub timeout: Duration,
    pub logout_timeout: Duration,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            cookie: None,
            timeout: Duration::from_secs(30),
            logout_timeout: Duration::from_secs(3),
        }
    }
}

/// Secure matrix API client (blocking).
#[derive(Clone)]
pub struct MatrixClient {
    http: reqwest::blocking::Client,
    /// Separate client for logout: short timeout, redirects not followed
    /// (the server answers logout with a redirect to the landing page).
    logout_http: reqwest::blocking::Client,
    base_url: String,
    cookie: Option<String>,
}

impl MatrixClient {
    pub fn new(opts: ClientOptions) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent())
            .timeout(opts.timeout)
            .build()
            .expect("Failed to create HTTP client");

        let logout_http = reqwest::blocking::Client::builder()
            .user_agent(user_agent())
            .timeout(opts.logout_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            logout_http,
            base_url: opts.base_url.trim_end_matches('/').to_string(),
            cookie: opts.cookie.filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Absolute URL for a server path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn post(&self, path: &str, csrf_token: &str) -> reqwest::blocking::RequestBuilder {
        let mut req = self.http.post(self.url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        if !csrf_token.is_empty() {
            req = req.header(CSRF_HEADER, csrf_token);
        }
        if let Some(ref cookie) = self.cookie {
            req = req.header(reqwest::header::COOKIE, cookie.as_str());
        }
        req
    }

    fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = req.send().map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| ClientError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            log::debug!("HTTP {} body: {}", status, body);
            return Err(match server_error_message(&body) {
                Some(msg) => ClientError::Server(msg),
                None => ClientError::Http(status, body),
            });
        }

        serde_json::from_str(&body).map_err(|e| ClientError::Parse(e.to_string()))
    }
}

impl MatrixApi for MatrixClient {
    fn save_matrix(
        &self,
        path: &str,
        request: &SaveMatrixRequest,
        csrf_token: &str,
    ) -> Result<SaveMatrixResponse, ClientError> {
        self.send_json(self.post(path, csrf_token).json(request))
    }

    fn history_step(&self, path: &str, csrf_token: &str) -> Result<HistoryResponse, ClientError> {
        self.send_json(
            self.post(path, csrf_token)
                .header(reqwest::header::CONTENT_TYPE, "application/json"),
        )
    }

    fn load_cells(
        &self,
        path: &str,
        request: &LoadCellsRequest,
        csrf_token: &str,
    ) -> Result<LoadCellsResponse, ClientError> {
        self.send_json(self.post(path, csrf_token).json(request))
    }

    fn logout(&self, path: &str, csrf_token: &str) -> Result<u16, ClientError> {
        let mut req = self.logout_http.post(self.url(path))
            .form(&logout_form(""));
        if !csrf_token.is_empty() {
            req = req.header(CSRF_HEADER, csrf_token);
        }
        if let Some(ref cookie) = self.cookie {
            req = req.header(reqwest::header::COOKIE, cookie.as_str());
        }

        let response = req.send().map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

pub(crate) fn user_agent() -> String {
    format!("secmatrix/{}", env!("CARGO_PKG_VERSION"))
}

/// Pull `error` out of a JSON error body, if the server sent one.
fn server_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json["error"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}
