// Grid widget construction defaults

use serde::{Deserialize, Serialize};

/// Font defaults applied to every cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
}

/// Cell style defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridStyle {
    pub align: String,   // "left" | "center" | "right"
    pub valign: String,  // "top" | "middle" | "bottom"
    pub strike: bool,
    pub underline: bool,
    pub font: FontStyle,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            align: "left".to_string(),
            valign: "middle".to_string(),
            strike: false,
            underline: false,
            font: FontStyle::default(),
        }
    }
}

/// Configuration handed to the grid widget at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Name of the single sheet the matrix is loaded into.
    #[serde(rename = "sheetName")]
    pub sheet_name: String,

    pub rows: u32,

    pub cols: u32,

    #[serde(rename = "rowHeight")]
    pub row_height: u16,

    #[serde(rename = "colWidth")]
    pub col_width: u16,

    #[serde(rename = "indexWidth")]
    pub index_width: u16,

    #[serde(rename = "minWidth")]
    pub min_width: u16,

    #[serde(rename = "showToolbar")]
    pub show_toolbar: bool,

    #[serde(rename = "showGrid")]
    pub show_grid: bool,

    pub style: GridStyle,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Hoja1".to_string(),
            rows: 50,
            cols: 26,
            row_height: 25,
            col_width: 100,
            index_width: 60,
            min_width: 60,
            show_toolbar: true,
            show_grid: true,
            style: GridStyle::default(),
        }
    }
}

/// Pixels per terminal line when mapping row heights.
const LINE_PX: u16 = 25;

/// Pixels per terminal column when mapping widths.
const CHAR_PX: u16 = 10;

impl GridConfig {
    /// Column width in terminal cells, never below the minimum width.
    pub fn col_chars(&self) -> usize {
        (self.col_width.max(self.min_width) / CHAR_PX).max(3) as usize
    }

    /// Terminal lines per grid row.
    pub fn row_lines(&self) -> usize {
        (self.row_height / LINE_PX).max(1) as usize
    }

    /// Width of the row-number gutter in terminal cells.
    pub fn index_chars(&self) -> usize {
        (self.index_width / CHAR_PX) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_sizes_map_to_terminal_cells() {
        let grid = GridConfig::default();
        assert_eq!((grid.col_chars(), grid.row_lines(), grid.index_chars()), (10, 1, 6));

        let grid = GridConfig {
            col_width: 20,
            row_height: 60,
            index_width: 0,
            ..GridConfig::default()
        };
        assert_eq!(grid.col_chars(), 6, "min width wins");
        assert_eq!(grid.row_lines(), 2);
        assert_eq!(grid.index_chars(), 0);
    }

    #[test]
    fn style_keys_deserialize_with_defaults() {
        let grid: GridConfig = serde_json::from_str(
            r#"{ "showGrid": false, "style": { "align": "right", "font": { "bold": true } } }"#,
        )
        .unwrap();
        assert!(!grid.show_grid);
        assert!(grid.show_toolbar);
        assert_eq!(grid.style.align, "right");
        assert_eq!(grid.style.valign, "middle");
        assert!(grid.style.font.bold);
    }
}
