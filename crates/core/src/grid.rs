//! Translation between [`MatrixData`] and the grid widget's sheet shape.
//!
//! The widget holds an array of sheets, each
//! `{ name, rows: { "<row>": { cells: { "<col>": { text } } } } }`.
//! Bookkeeping keys such as `rows.len` are not indices and are skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use secmatrix_protocol::{parse_index, MatrixData};

use crate::ports::GridWidget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetCell {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub cells: BTreeMap<u32, SheetCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: BTreeMap<u32, SheetRow>,
}

impl Sheet {
    pub fn cell_text(&self, row: u32, col: u32) -> Option<&str> {
        self.rows.get(&row)?.cells.get(&col).map(|c| c.text.as_str())
    }
}

/// Loads matrices into a widget and reads them back out.
#[derive(Debug, Clone)]
pub struct GridAdapter {
    sheet_name: String,
}

impl Default for GridAdapter {
    fn default() -> Self {
        Self::new("Hoja1")
    }
}

impl GridAdapter {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// The single-sheet representation of `data`.
    pub fn to_sheets(&self, data: &MatrixData) -> Vec<Sheet> {
        let rows = data
            .rows()
            .map(|(row, cells)| {
                let cells = cells
                    .iter()
                    .map(|(col, text)| (*col, SheetCell { text: text.clone() }))
                    .collect();
                (row, SheetRow { cells })
            })
            .collect();

        vec![Sheet {
            name: self.sheet_name.clone(),
            rows,
        }]
    }

    pub fn load<W: GridWidget + ?Sized>(&self, widget: &mut W, data: &MatrixData) {
        log::debug!("Loading {} cells into grid", data.cell_count());
        widget.load_data(&self.to_sheets(data));
    }

    /// Current widget contents as a sparse matrix. Missing or malformed data
    /// yields an empty matrix.
    pub fn extract<W: GridWidget + ?Sized>(&self, widget: &W) -> MatrixData {
        match widget.get_data() {
            Some(raw) => extract_value(&raw),
            None => MatrixData::new(),
        }
    }
}

/// Reduce the widget's raw sheet array to non-empty cells of the first sheet.
pub fn extract_value(raw: &Value) -> MatrixData {
    let mut data = MatrixData::new();
    let Some(rows) = raw
        .as_array()
        .and_then(|sheets| sheets.first())
        .and_then(|sheet| sheet.get("rows"))
        .and_then(Value::as_object)
    else {
        return data;
    };

    for (row_key, row) in rows {
        let Some(row_idx) = parse_index(row_key) else { continue };
        let Some(cells) = row.get("cells").and_then(Value::as_object) else {
            continue;
        };
        for (col_key, cell) in cells {
            let Some(col_idx) = parse_index(col_key) else { continue };
            match cell.get("text") {
                Some(Value::String(text)) => {
                    data.insert(row_idx, col_idx, text.as_str());
                }
                Some(Value::Number(n)) => {
                    data.insert(row_idx, col_idx, n.to_string());
                }
                _ => {}
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn load_builds_single_named_sheet() {
        let mut data = MatrixData::new();
        data.insert(0, 0, "100");
        data.insert(0, 1, "200");
        data.insert(4, 2, "x");

        let sheets = GridAdapter::default().to_sheets(&data);
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Hoja1");
        assert_eq!(sheets[0].cell_text(0, 1), Some("200"));
        assert_eq!(sheets[0].cell_text(4, 2), Some("x"));

        let wire = serde_json::to_value(&sheets).unwrap();
        assert_eq!(wire[0]["rows"]["4"]["cells"]["2"]["text"], "x");
    }

    #[test]
    fn extract_skips_bookkeeping_and_empty_cells() {
        let raw = json!([{
            "name": "Hoja1",
            "rows": {
                "len": 100,
                "0": { "cells": { "0": { "text": "100" }, "1": { "text": "" } } },
                "2": { "cells": { "3": { "text": 7 }, "4": { "style": 1 } }, "height": 30 },
                "x": { "cells": { "0": { "text": "nope" } } }
            }
        }]);

        let data = extract_value(&raw);
        assert_eq!(data.cell_count(), 2);
        assert_eq!(data.get(0, 0), Some("100"));
        assert_eq!(data.get(0, 1), None);
        assert_eq!(data.get(2, 3), Some("7"));
    }

    #[test]
    fn extract_malformed_is_empty() {
        assert!(extract_value(&json!(null)).is_empty());
        assert!(extract_value(&json!([])).is_empty());
        assert!(extract_value(&json!([{ "name": "Hoja1" }])).is_empty());
        assert!(extract_value(&json!({ "rows": {} })).is_empty());
        assert!(extract_value(&json!([{ "rows": [1, 2] }])).is_empty());
    }

    #[test]
    fn widget_round_trip() {
        let adapter = GridAdapter::new("Ledger");
        let mut host = FakeHost::new("/secure/k3y/matrix-view/");
        let mut data = MatrixData::new();
        data.insert(1, 1, "a");

        adapter.load(&mut host, &data);
        assert_eq!(host.loaded_sheets[0].name, "Ledger");
        assert_eq!(adapter.extract(&host), data);
    }

    fn config_256() -> ProptestConfig {
        ProptestConfig::with_cases(256)
    }

    proptest! {
        #![proptest_config(config_256())]

        #[test]
        fn extract_of_load_keeps_non_empty_cells(
            cells in proptest::collection::vec((0u32..60, 0u32..30, "[a-z0-9 ]{0,6}"), 0..40)
        ) {
            let mut expected = MatrixData::new();
            for (row, col, text) in &cells {
                expected.insert(*row, *col, text.as_str());
            }

            let adapter = GridAdapter::default();
            let raw = serde_json::to_value(adapter.to_sheets(&expected)).unwrap();
            prop_assert_eq!(extract_value(&raw), expected);
        }
    }
}
