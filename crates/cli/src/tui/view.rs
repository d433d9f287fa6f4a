//! The spreadsheet widget of the terminal host: a single sheet with a
//! cursor, scrolling, and an in-cell edit buffer. Sizes and cell style come
//! from the grid settings, mapped from pixels to terminal cells.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use secmatrix_config::{GridConfig, GridStyle};
use secmatrix_core::{Sheet, SheetCell};

use crate::util::{self, Align};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VAlign {
    Top,
    Middle,
    Bottom,
}

impl VAlign {
    fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "top" => VAlign::Top,
            "bottom" => VAlign::Bottom,
            _ => VAlign::Middle,
        }
    }
}

pub(crate) struct GridView {
    sheet: Sheet,
    rows: u32,
    cols: u32,
    col_width: usize,
    row_lines: usize,
    index_width: usize,
    show_grid: bool,
    show_toolbar: bool,
    align: Align,
    valign: VAlign,
    modifier: Modifier,
    cursor_row: u32,
    cursor_col: u32,
    scroll_row: u32,
    scroll_col: u32,
    /// Text being typed into the cursor cell
    editing: Option<String>,
}

impl GridView {
    pub(crate) fn new(config: &GridConfig) -> Self {
        Self {
            sheet: empty_sheet(&config.sheet_name),
            rows: config.rows.max(1),
            cols: config.cols.max(1),
            col_width: config.col_chars(),
            row_lines: config.row_lines(),
            index_width: config.index_chars(),
            show_grid: config.show_grid,
            show_toolbar: config.show_toolbar,
            align: Align::parse(&config.style.align),
            valign: VAlign::parse(&config.style.valign),
            modifier: cell_modifier(&config.style),
            cursor_row: 0,
            cursor_col: 0,
            scroll_row: 0,
            scroll_col: 0,
            editing: None,
        }
    }

    /// Replace the contents with the first sheet. Dimensions grow to fit the data.
    pub(crate) fn load(&mut self, sheets: &[Sheet]) {
        let name = self.sheet.name.clone();
        self.sheet = sheets.first().cloned().unwrap_or_else(|| empty_sheet(&name));
        self.editing = None;

        for (row, cells) in &self.sheet.rows {
            self.rows = self.rows.max(row.saturating_add(1));
            if let Some(col) = cells.cells.keys().next_back() {
                self.cols = self.cols.max(col.saturating_add(1));
            }
        }
        self.cursor_row = self.cursor_row.min(self.rows - 1);
        self.cursor_col = self.cursor_col.min(self.cols - 1);
    }

    /// The widget's native data: an array holding the one sheet.
    pub(crate) fn data(&self) -> Option<serde_json::Value> {
        serde_json::to_value(std::slice::from_ref(&self.sheet)).ok()
    }

    pub(crate) fn sheet_name(&self) -> &str {
        &self.sheet.name
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub(crate) fn cursor(&self) -> (u32, u32) {
        (self.cursor_row, self.cursor_col)
    }

    pub(crate) fn cell_text(&self, row: u32, col: u32) -> &str {
        self.sheet.cell_text(row, col).unwrap_or("")
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub(crate) fn edit_buffer(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// Whether the save and logout controls are shown.
    pub(crate) fn shows_toolbar(&self) -> bool {
        self.show_toolbar
    }

    // ── Navigation ──────────────────────────────────────────────────

    pub(crate) fn move_by(&mut self, drow: i64, dcol: i64) {
        let clamp = |pos: u32, delta: i64, len: u32| -> u32 {
            (pos as i64 + delta).clamp(0, len as i64 - 1) as u32
        };
        self.cursor_row = clamp(self.cursor_row, drow, self.rows);
        self.cursor_col = clamp(self.cursor_col, dcol, self.cols);
    }

    /// Keep the cursor inside a viewport of the given size.
    pub(crate) fn ensure_visible(&mut self, visible_rows: u32, visible_cols: u32) {
        let visible_rows = visible_rows.max(1);
        let visible_cols = visible_cols.max(1);
        if self.cursor_row < self.scroll_row {
            self.scroll_row = self.cursor_row;
        } else if self.cursor_row >= self.scroll_row + visible_rows {
            self.scroll_row = self.cursor_row + 1 - visible_rows;
        }
        if self.cursor_col < self.scroll_col {
            self.scroll_col = self.cursor_col;
        } else if self.cursor_col >= self.scroll_col + visible_cols {
            self.scroll_col = self.cursor_col + 1 - visible_cols;
        }
    }

    // ── Editing ─────────────────────────────────────────────────────

    /// Start editing the cursor cell. A seed character replaces the
    /// contents, otherwise the current text is kept.
    pub(crate) fn begin_edit(&mut self, seed: Option<char>) {
        let text = match seed {
            Some(ch) => ch.to_string(),
            None => self.cell_text(self.cursor_row, self.cursor_col).to_string(),
        };
        self.editing = Some(text);
    }

    pub(crate) fn insert_str(&mut self, text: &str) {
        if let Some(buf) = self.editing.as_mut() {
            // Cells are single-line.
            buf.extend(text.chars().filter(|c| *c != '\n' && *c != '\r'));
        }
    }

    /// Bracketed paste. Outside an edit it replaces the cursor cell's text,
    /// like typing does.
    pub(crate) fn paste(&mut self, text: &str) {
        if self.editing.is_none() {
            self.editing = Some(String::new());
        }
        self.insert_str(text);
    }

    pub(crate) fn backspace(&mut self) {
        if let Some(buf) = self.editing.as_mut() {
            buf.pop();
        }
    }

    pub(crate) fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Write the edit buffer into the cell. Returns true if the cell changed.
    pub(crate) fn commit_edit(&mut self) -> bool {
        match self.editing.take() {
            Some(text) => self.set_cell(self.cursor_row, self.cursor_col, &text),
            None => false,
        }
    }

    /// Empty the cursor cell. Returns true if it held text.
    pub(crate) fn clear_cell(&mut self) -> bool {
        self.set_cell(self.cursor_row, self.cursor_col, "")
    }

    fn set_cell(&mut self, row: u32, col: u32, text: &str) -> bool {
        if self.cell_text(row, col) == text {
            return false;
        }
        if text.is_empty() {
            if let Some(cells) = self.sheet.rows.get_mut(&row) {
                cells.cells.remove(&col);
                if cells.cells.is_empty() {
                    self.sheet.rows.remove(&row);
                }
            }
        } else {
            self.sheet
                .rows
                .entry(row)
                .or_default()
                .cells
                .insert(col, SheetCell { text: text.to_string() });
        }
        true
    }

    // ── Rendering ───────────────────────────────────────────────────

    fn gutter_width(&self) -> usize {
        self.rows.to_string().len().max(self.index_width).max(2)
    }

    fn separator(&self) -> &'static str {
        if self.show_grid {
            "\u{2502}"
        } else {
            " "
        }
    }

    /// Sub-line of a row that carries the text.
    fn text_line(&self) -> usize {
        match self.valign {
            VAlign::Top => 0,
            VAlign::Middle => (self.row_lines - 1) / 2,
            VAlign::Bottom => self.row_lines - 1,
        }
    }

    /// Rows and columns that fit into `area`, header row excluded.
    pub(crate) fn viewport(&self, area: Rect) -> (u32, u32) {
        let rows = (area.height.saturating_sub(1) as usize / self.row_lines) as u32;
        let grid_width = (area.width as usize).saturating_sub(self.gutter_width() + 1);
        let cols = (grid_width / (self.col_width + 1)) as u32;
        (rows.max(1), cols.max(1))
    }

    /// What cell (`row`, `col`) shows on sub-line `line` of its row.
    pub(crate) fn cell_line(&self, row: u32, col: u32, line: usize) -> String {
        if line != self.text_line() {
            return " ".repeat(self.col_width);
        }
        match &self.editing {
            Some(buf) if (row, col) == self.cursor() => {
                util::fit_cell(&format!("{}_", buf), self.col_width)
            }
            _ => util::align_cell(self.cell_text(row, col), self.col_width, self.align),
        }
    }

    pub(crate) fn render(&self, frame: &mut Frame, area: Rect) {
        let (vis_rows, vis_cols) = self.viewport(area);
        let gutter = self.gutter_width();
        let sep = self.separator();
        let sep_style = Style::default().fg(Color::DarkGray);

        let end_col = (self.scroll_col + vis_cols).min(self.cols);
        let end_row = (self.scroll_row + vis_rows).min(self.rows);

        let mut header = vec![Span::styled(format!("{}{}", " ".repeat(gutter), sep), sep_style)];
        for c in self.scroll_col..end_col {
            let style = if c == self.cursor_col {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            };
            header.push(Span::styled(util::fit_cell(&util::col_letter(c), self.col_width), style));
            header.push(Span::styled(sep, sep_style));
        }

        let mut lines = Vec::with_capacity(vis_rows as usize * self.row_lines + 1);
        lines.push(Line::from(header));

        for r in self.scroll_row..end_row {
            let on_cursor_row = r == self.cursor_row;
            let num_style = if on_cursor_row {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            for line in 0..self.row_lines {
                let number = if line == self.text_line() {
                    format!("{:>width$}", r as u64 + 1, width = gutter)
                } else {
                    " ".repeat(gutter)
                };
                let mut spans = vec![
                    Span::styled(number, num_style),
                    Span::styled(sep, sep_style),
                ];

                for c in self.scroll_col..end_col {
                    let is_cursor = on_cursor_row && c == self.cursor_col;
                    let style = match (&self.editing, is_cursor) {
                        (Some(_), true) => Style::default().fg(Color::Black).bg(Color::Yellow),
                        (None, true) => Style::default()
                            .fg(Color::Black)
                            .bg(Color::White)
                            .add_modifier(Modifier::BOLD | self.modifier),
                        _ => Style::default().fg(Color::Gray).add_modifier(self.modifier),
                    };
                    spans.push(Span::styled(self.cell_line(r, c, line), style));
                    spans.push(Span::styled(sep, sep_style));
                }
                lines.push(Line::from(spans));
            }
        }

        frame.render_widget(Paragraph::new(lines), area);
    }
}

fn cell_modifier(style: &GridStyle) -> Modifier {
    let mut modifier = Modifier::empty();
    if style.font.bold {
        modifier.insert(Modifier::BOLD);
    }
    if style.font.italic {
        modifier.insert(Modifier::ITALIC);
    }
    if style.underline {
        modifier.insert(Modifier::UNDERLINED);
    }
    if style.strike {
        modifier.insert(Modifier::CROSSED_OUT);
    }
    modifier
}

fn empty_sheet(name: &str) -> Sheet {
    Sheet {
        name: name.to_string(),
        rows: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secmatrix_core::{GridAdapter, MatrixData};
    use secmatrix_core::grid::extract_value;

    fn config() -> GridConfig {
        GridConfig {
            rows: 10,
            cols: 5,
            col_width: 80,
            ..GridConfig::default()
        }
    }

    fn view() -> GridView {
        GridView::new(&config())
    }

    #[test]
    fn edit_commit_reports_change() {
        let mut v = view();
        v.begin_edit(Some('4'));
        v.insert_str("2");
        assert!(v.commit_edit());
        assert_eq!(v.cell_text(0, 0), "42");

        v.begin_edit(None);
        assert_eq!(v.edit_buffer(), Some("42"));
        assert!(!v.commit_edit());
    }

    #[test]
    fn cancel_leaves_cell_alone() {
        let mut v = view();
        v.begin_edit(Some('x'));
        v.cancel_edit();
        assert!(!v.is_editing());
        assert_eq!(v.cell_text(0, 0), "");
    }

    #[test]
    fn clearing_removes_cell_and_row() {
        let mut v = view();
        v.begin_edit(Some('1'));
        v.commit_edit();
        assert!(v.clear_cell());
        assert!(!v.clear_cell());
        assert_eq!(extract_value(&v.data().unwrap()), MatrixData::new());
    }

    #[test]
    fn paste_drops_newlines() {
        let mut v = view();
        v.begin_edit(None);
        v.insert_str("a\nb\r\n");
        assert_eq!(v.edit_buffer(), Some("ab"));
    }

    #[test]
    fn paste_outside_an_edit_replaces_the_cell() {
        let mut v = view();
        v.begin_edit(Some('9'));
        v.commit_edit();

        v.paste("12\n");
        assert_eq!(v.edit_buffer(), Some("12"));
        v.paste("3");
        assert!(v.commit_edit());
        assert_eq!(v.cell_text(0, 0), "123");
    }

    #[test]
    fn sizing_settings_change_the_viewport() {
        let area = Rect::new(0, 0, 80, 21);
        assert_eq!(view().viewport(area), (20, 8));

        let tall = GridView::new(&GridConfig { row_height: 50, ..config() });
        assert_eq!(tall.viewport(area).0, 10);

        let wide_index = GridView::new(&GridConfig { index_width: 300, ..config() });
        assert_eq!(wide_index.viewport(area).1, 5);
    }

    #[test]
    fn style_settings_change_cell_text() {
        let styled = GridConfig {
            row_height: 75,
            style: GridStyle {
                align: "right".into(),
                valign: "bottom".into(),
                underline: true,
                ..GridStyle::default()
            },
            ..config()
        };
        let mut v = GridView::new(&styled);
        v.begin_edit(Some('7'));
        v.commit_edit();

        assert_eq!(v.cell_line(0, 0, 0), " ".repeat(8));
        assert_eq!(v.cell_line(0, 0, 2), "       7");
        assert!(v.modifier.contains(Modifier::UNDERLINED));

        let mut plain = view();
        plain.begin_edit(Some('7'));
        plain.commit_edit();
        assert_eq!(plain.cell_line(0, 0, 0), "7       ");
        assert!(plain.modifier.is_empty());
    }

    #[test]
    fn toolbar_and_grid_lines_follow_settings() {
        let v = GridView::new(&GridConfig { show_toolbar: false, show_grid: false, ..config() });
        assert!(!v.shows_toolbar());
        assert_eq!(v.separator(), " ");
        assert!(view().shows_toolbar());
        assert_eq!(view().separator(), "\u{2502}");
    }

    #[test]
    fn cursor_clamped_to_grid() {
        let mut v = view();
        v.move_by(-3, -3);
        assert_eq!(v.cursor(), (0, 0));
        v.move_by(100, 100);
        assert_eq!(v.cursor(), (9, 4));
    }

    #[test]
    fn scroll_follows_cursor() {
        let mut v = view();
        v.move_by(7, 3);
        v.ensure_visible(3, 2);
        assert_eq!((v.scroll_row, v.scroll_col), (5, 2));
        v.move_by(-7, -3);
        v.ensure_visible(3, 2);
        assert_eq!((v.scroll_row, v.scroll_col), (0, 0));
    }

    #[test]
    fn load_grows_to_fit_and_reads_back() {
        let mut data = MatrixData::new();
        data.insert(0, 0, "100");
        data.insert(20, 7, "far");
        let sheets = GridAdapter::default().to_sheets(&data);

        let mut v = view();
        v.load(&sheets);
        assert_eq!(v.dimensions(), (21, 8));
        assert_eq!(v.sheet_name(), "Hoja1");
        assert_eq!(extract_value(&v.data().unwrap()), data);
    }
}
