//! Secure Matrix wire format.
//!
//! This crate defines the JSON bodies exchanged between a secure-matrix
//! session and the server: full-matrix save, undo/redo snapshots, windowed
//! cell loading and the logout form fields.
//!
//! # Matrix data
//!
//! Cell contents travel as a sparse two-level object keyed by string-encoded
//! integer indices:
//!
//! ```json
//! { "0": { "0": "100", "1": "250" }, "4": { "2": "Total" } }
//! ```
//!
//! Only non-empty cells are ever present. An absent key means an empty cell.
//!
//! # Usage
//!
//! ```ignore
//! use secmatrix_protocol::{MatrixData, SaveMatrixRequest};
//!
//! let mut data = MatrixData::new();
//! data.insert(0, 1, "250");
//! let body = serde_json::to_string(&SaveMatrixRequest { matrix_data: data })?;
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Header carrying the cross-site-request-forgery token.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Cookie the server sets with the CSRF token.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Hidden form field rendered into the page with the CSRF token.
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";

/// Form field flagging a logout request.
pub const LOGOUT_FIELD: &str = "logout";

// =============================================================================
// Matrix data
// =============================================================================

/// Sparse `row → (col → text)` mapping.
///
/// Empty strings are never stored: inserting one clears the cell instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatrixData(BTreeMap<u32, BTreeMap<u32, String>>);

impl MatrixData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cell. Empty text removes the cell. Returns true if a value is now stored.
    pub fn insert(&mut self, row: u32, col: u32, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.is_empty() {
            self.remove(row, col);
            return false;
        }
        self.0.entry(row).or_default().insert(col, text);
        true
    }

    /// Clear a cell, dropping the row entry when it becomes empty.
    pub fn remove(&mut self, row: u32, col: u32) -> Option<String> {
        let cells = self.0.get_mut(&row)?;
        let removed = cells.remove(&col);
        if cells.is_empty() {
            self.0.remove(&row);
        }
        removed
    }

    pub fn get(&self, row: u32, col: u32) -> Option<&str> {
        self.0.get(&row)?.get(&col).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Rows in ascending index order.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &BTreeMap<u32, String>)> {
        self.0.iter().map(|(row, cells)| (*row, cells))
    }

    /// Every stored cell as `(row, col, text)`, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, &str)> {
        self.0.iter().flat_map(|(row, cells)| {
            cells.iter().map(move |(col, text)| (*row, *col, text.as_str()))
        })
    }

    /// Build from an untrusted JSON object.
    ///
    /// Non-object input yields an empty matrix. Keys that are not integer
    /// indices are skipped. Numbers and booleans are kept as their text form;
    /// null and empty strings are dropped.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let mut data = Self::new();
        let Some(rows) = value.as_object() else {
            return data;
        };

        for (row_key, row) in rows {
            let Some(row_idx) = parse_index(row_key) else { continue };
            let Some(cells) = row.as_object() else { continue };
            for (col_key, cell) in cells {
                let Some(col_idx) = parse_index(col_key) else { continue };
                if let Some(text) = cell_text(cell) {
                    data.insert(row_idx, col_idx, text);
                }
            }
        }

        data
    }
}

impl<'de> Deserialize<'de> for MatrixData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

impl FromIterator<(u32, u32, String)> for MatrixData {
    fn from_iter<I: IntoIterator<Item = (u32, u32, String)>>(iter: I) -> Self {
        let mut data = Self::new();
        for (row, col, text) in iter {
            data.insert(row, col, text);
        }
        data
    }
}

/// Parse a string-encoded row/column index.
pub fn parse_index(key: &str) -> Option<u32> {
    let key = key.trim();
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

fn cell_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// =============================================================================
// Save
// =============================================================================

/// Body of `POST …/api/save-matrix/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMatrixRequest {
    pub matrix_data: MatrixData,
}

/// Response of `POST …/api/save-matrix/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaveMatrixResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells_updated: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Undo / Redo
// =============================================================================

/// Response of `POST …/matrix/undo/` and `POST …/matrix/redo/`.
///
/// `matrix_data` is the full snapshot after the history step. When it is
/// absent the client falls back to reloading the whole view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_data: Option<MatrixData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Load cells
// =============================================================================

/// Body of `POST …/api/load-cells/`. Bounds are half-open: `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCellsRequest {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl Default for LoadCellsRequest {
    fn default() -> Self {
        Self { start_row: 0, end_row: 50, start_col: 0, end_col: 26 }
    }
}

/// Response of `POST …/api/load-cells/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadCellsResponse {
    pub success: bool,
    #[serde(default)]
    pub cells: MatrixData,
    #[serde(default)]
    pub start_row: u32,
    #[serde(default)]
    pub end_row: u32,
    #[serde(default)]
    pub start_col: u32,
    #[serde(default)]
    pub end_col: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Logout
// =============================================================================

/// Form fields of a logout beacon / logout request.
pub fn logout_form(csrf_token: &str) -> Vec<(&'static str, String)> {
    let mut form = vec![(LOGOUT_FIELD, "true".to_string())];
    if !csrf_token.is_empty() {
        form.push((CSRF_FORM_FIELD, csrf_token.to_string()));
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_data_serializes_with_string_keys() {
        let mut data = MatrixData::new();
        data.insert(0, 0, "100");
        data.insert(0, 1, "250");
        data.insert(3, 2, "x");

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "0": { "0": "100", "1": "250" }, "3": { "2": "x" } })
        );
    }

    #[test]
    fn empty_text_is_never_stored() {
        let mut data = MatrixData::new();
        assert!(!data.insert(1, 1, ""));
        assert!(data.is_empty());

        data.insert(1, 1, "a");
        data.insert(1, 1, "");
        assert!(data.is_empty(), "clearing the last cell drops the row");
    }

    #[test]
    fn from_value_is_defensive() {
        let value = serde_json::json!({
            "0": { "0": "100", "1": "", "2": null, "3": 42 },
            "len": 100,
            "x": { "0": "skipped" },
            "2": "not an object",
            "5": { "col": "skipped", "1": true }
        });
        let data = MatrixData::from_value(&value);

        assert_eq!(data.get(0, 0), Some("100"));
        assert_eq!(data.get(0, 1), None);
        assert_eq!(data.get(0, 2), None);
        assert_eq!(data.get(0, 3), Some("42"));
        assert_eq!(data.get(5, 1), Some("true"));
        assert_eq!(data.cell_count(), 3);

        assert!(MatrixData::from_value(&serde_json::json!([1, 2])).is_empty());
        assert!(MatrixData::from_value(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn parse_index_rejects_non_digits() {
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index(" 7 "), Some(7));
        assert_eq!(parse_index("-1"), None);
        assert_eq!(parse_index("len"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn history_response_without_snapshot() {
        let resp: HistoryResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(resp.success);
        assert!(resp.matrix_data.is_none());

        let resp: HistoryResponse = serde_json::from_str(
            r#"{"success": true, "matrix_data": {"1": {"0": "a"}}}"#,
        )
        .unwrap();
        assert_eq!(resp.matrix_data.unwrap().get(1, 0), Some("a"));
    }

    #[test]
    fn save_response_tolerates_missing_fields() {
        let resp: SaveMatrixResponse =
            serde_json::from_str(r#"{"success": false, "error": "Sesión inválida"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.cells_updated, None);
        assert_eq!(resp.error.as_deref(), Some("Sesión inválida"));
    }

    #[test]
    fn logout_form_includes_token_when_known() {
        assert_eq!(logout_form(""), vec![("logout", "true".to_string())]);
        assert_eq!(
            logout_form("tok"),
            vec![("logout", "true".to_string()), ("csrfmiddlewaretoken", "tok".to_string())]
        );
    }
}
