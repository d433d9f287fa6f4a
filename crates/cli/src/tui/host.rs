//! Terminal host: implements the session ports on top of ratatui.
//!
//! Dialogs are modal popups with their own event loop. Without a terminal
//! (tests) they answer from a scripted queue and decline when it runs dry.

use std::collections::VecDeque;
use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use secmatrix_client::{CookieJar, TokenSource};
use secmatrix_core::{
    Dialogs, GridWidget, History, NotificationKind, Notifier, SessionState, Sheet,
};

use super::view::GridView;
use crate::util;

pub(crate) type Term = Terminal<CrosstermBackend<Stdout>>;

struct Toast {
    kind: NotificationKind,
    message: String,
    shown_at: Instant,
}

enum Modal<'a> {
    Confirm(&'a str),
    Alert(&'a str),
}

pub(crate) struct TerminalHost {
    terminal: Option<Term>,
    view: GridView,
    path: String,
    history: Vec<String>,
    jar: CookieJar,
    toast: Option<Toast>,
    dismiss_after: Duration,
    navigated: Option<String>,
    reload_requested: bool,
    needs_clear: bool,
    state: Option<Arc<SessionState>>,
    title: String,
    scripted_answers: VecDeque<bool>,
}

impl TerminalHost {
    pub(crate) fn new(view: GridView, path: impl Into<String>, jar: CookieJar) -> Self {
        let path = path.into();
        Self {
            terminal: None,
            view,
            history: vec![path.clone()],
            path,
            jar,
            toast: None,
            dismiss_after: Duration::from_secs(4),
            navigated: None,
            reload_requested: false,
            needs_clear: false,
            state: None,
            title: String::from("secmatrix"),
            scripted_answers: VecDeque::new(),
        }
    }

    pub(crate) fn with_terminal(mut self, terminal: Term) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub(crate) fn set_dismiss_after(&mut self, dismiss_after: Duration) {
        self.dismiss_after = dismiss_after;
    }

    pub(crate) fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Share the session flags so the status bar can show them.
    pub(crate) fn attach_state(&mut self, state: Arc<SessionState>) {
        self.state = Some(state);
    }

    /// Queue answers for dialogs shown while no terminal is attached.
    #[cfg(test)]
    pub(crate) fn script_answers(&mut self, answers: &[bool]) {
        self.scripted_answers.extend(answers.iter().copied());
    }

    pub(crate) fn view(&self) -> &GridView {
        &self.view
    }

    pub(crate) fn view_mut(&mut self) -> &mut GridView {
        &mut self.view
    }

    pub(crate) fn navigated(&self) -> Option<&str> {
        self.navigated.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn history_len(&self) -> usize {
        self.history.len()
    }

    /// True once after the view asked to be reloaded from the server.
    pub(crate) fn take_reload(&mut self) -> bool {
        std::mem::take(&mut self.reload_requested)
    }

    pub(crate) fn toast_text(&self) -> Option<(NotificationKind, &str)> {
        self.toast.as_ref().map(|t| (t.kind, t.message.as_str()))
    }

    fn expire_toast(&mut self) {
        if let Some(ref toast) = self.toast {
            if toast.shown_at.elapsed() >= self.dismiss_after {
                self.toast = None;
            }
        }
    }

    /// Redraw the screen. No-op without a terminal.
    pub(crate) fn draw(&mut self) -> Result<(), String> {
        self.draw_with(None)
    }

    fn draw_with(&mut self, modal: Option<Modal<'_>>) -> Result<(), String> {
        self.expire_toast();
        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };
        if std::mem::take(&mut self.needs_clear) {
            terminal.clear().map_err(|e| format!("clear error: {}", e))?;
        }

        let size = terminal
            .size()
            .map(|s| Rect::new(0, 0, s.width, s.height))
            .unwrap_or_default();
        let grid_area = layout(size)[1];
        let (vis_rows, vis_cols) = self.view.viewport(grid_area);
        self.view.ensure_visible(vis_rows, vis_cols);

        let view = &self.view;
        let toast = self.toast.as_ref();
        let state = self.state.as_deref();
        let title = self.title.as_str();
        terminal
            .draw(|frame| {
                let chunks = layout(frame.area());
                draw_title(frame, chunks[0], title, view);
                view.render(frame, chunks[1]);
                draw_toast(frame, chunks[2], toast);
                draw_status(frame, chunks[3], view, state);
                match modal {
                    Some(Modal::Confirm(msg)) => draw_dialog(frame, " Confirm ", msg, "[y] Yes   [n] No"),
                    Some(Modal::Alert(msg)) => draw_dialog(frame, " Notice ", msg, "[Enter] OK"),
                    None => {}
                }
            })
            .map_err(|e| format!("draw error: {}", e))?;
        Ok(())
    }

    fn wait_for_answer(&mut self, message: &str) -> Result<bool, String> {
        loop {
            self.draw_with(Some(Modal::Confirm(message)))?;
            match event::read().map_err(|e| format!("event read error: {}", e))? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => return Ok(true),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return Ok(false),
                    _ => {}
                },
                Event::Resize(..) => self.needs_clear = true,
                _ => {}
            }
        }
    }

    fn wait_for_dismiss(&mut self, message: &str) -> Result<(), String> {
        loop {
            self.draw_with(Some(Modal::Alert(message)))?;
            match event::read().map_err(|e| format!("event read error: {}", e))? {
                Event::Key(key) if key.kind == KeyEventKind::Press => return Ok(()),
                Event::Resize(..) => self.needs_clear = true,
                _ => {}
            }
        }
    }
}

impl History for TerminalHost {
    fn current_path(&self) -> String {
        self.path.clone()
    }

    fn push_state(&mut self, path: &str) {
        self.history.push(path.to_string());
    }

    fn navigate(&mut self, location: &str) {
        log::info!("Leaving matrix view for {}", location);
        self.navigated = Some(location.to_string());
    }

    fn reload(&mut self) {
        self.reload_requested = true;
    }
}

impl Dialogs for TerminalHost {
    fn confirm(&mut self, message: &str) -> bool {
        if self.terminal.is_none() {
            return self.scripted_answers.pop_front().unwrap_or(false);
        }
        match self.wait_for_answer(message) {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("Confirm dialog failed: {}", e);
                false
            }
        }
    }

    fn alert(&mut self, message: &str) {
        if self.terminal.is_none() {
            log::warn!("{}", message);
            return;
        }
        if let Err(e) = self.wait_for_dismiss(message) {
            log::error!("Alert dialog failed: {}", e);
        }
    }
}

impl Notifier for TerminalHost {
    /// Newest notification replaces the one on screen.
    fn notify(&mut self, kind: NotificationKind, message: &str) {
        self.toast = Some(Toast {
            kind,
            message: message.to_string(),
            shown_at: Instant::now(),
        });
    }
}

impl GridWidget for TerminalHost {
    fn load_data(&mut self, sheets: &[Sheet]) {
        self.view.load(sheets);
    }

    fn get_data(&self) -> Option<serde_json::Value> {
        self.view.data()
    }

    fn resize(&mut self) {
        self.needs_clear = true;
    }
}

impl TokenSource for TerminalHost {
    fn cookie(&self, name: &str) -> Option<String> {
        self.jar.cookie(name)
    }

    fn form_field(&self, name: &str) -> Option<String> {
        self.jar.form_field(name)
    }
}

// ── Drawing ─────────────────────────────────────────────────────────

fn layout(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .split(area)
}

fn draw_title(frame: &mut Frame, area: Rect, title: &str, view: &GridView) {
    let (rows, cols) = view.dimensions();
    let text = format!(" {} | {} | {} rows x {} cols ", title, view.sheet_name(), rows, cols);
    let para = Paragraph::new(Line::from(Span::styled(
        text,
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
    .style(Style::default().bg(Color::Cyan));
    frame.render_widget(para, area);
}

fn toast_color(kind: NotificationKind) -> Color {
    match kind {
        NotificationKind::Success => Color::Green,
        NotificationKind::Error => Color::Red,
        NotificationKind::Info => Color::Blue,
        NotificationKind::Warning => Color::Yellow,
    }
}

fn draw_toast(frame: &mut Frame, area: Rect, toast: Option<&Toast>) {
    let Some(toast) = toast else {
        return;
    };
    let para = Paragraph::new(Line::from(Span::styled(
        format!(" {} ", toast.message),
        Style::default()
            .fg(Color::Black)
            .bg(toast_color(toast.kind))
            .add_modifier(Modifier::BOLD),
    )));
    frame.render_widget(para, area);
}

/// Left: cell reference and value. Right: save state and, with the toolbar
/// on, the two controls.
pub(crate) fn status_text(view: &GridView, state: Option<&SessionState>) -> (String, String) {
    let (row, col) = view.cursor();
    let left = format!(" {} = {:?}", util::cell_ref(row, col), view.cell_text(row, col));

    let mut right = String::new();
    if let Some(state) = state {
        if state.is_saving() {
            right.push_str("Saving...  ");
        }
        if let Some(at) = state.last_update() {
            right.push_str(&format!("Last update: {}  ", at.format("%H:%M:%S")));
        }
        if state.is_dirty() {
            right.push_str("* unsaved  ");
        }
    }
    if view.shows_toolbar() {
        right.push_str("[F9 Save] [F10 Logout] ");
    }
    (left, right)
}

fn draw_status(frame: &mut Frame, area: Rect, view: &GridView, state: Option<&SessionState>) {
    let (left, right) = status_text(view, state);
    let padding = (area.width as usize)
        .saturating_sub(util::display_width(&left) + util::display_width(&right));
    let status = format!("{}{:pad$}{}", left, "", right, pad = padding);

    let para = Paragraph::new(Line::from(Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::DarkGray),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}

fn draw_dialog(frame: &mut Frame, title: &str, message: &str, keys: &str) {
    let area = frame.area();
    let width: u16 = 56.min(area.width);
    let text_rows = (util::display_width(message) as u16 / width.saturating_sub(4).max(1)) + 1;
    let height: u16 = (text_rows + 4).min(area.height);
    let popup = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title)
        .title_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .style(Style::default().bg(Color::Black));

    let lines = vec![
        Line::from(Span::styled(message, Style::default().fg(Color::White))),
        Line::from(""),
        Line::from(Span::styled(keys, Style::default().fg(Color::Yellow))),
    ];

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use secmatrix_config::GridConfig;
    use secmatrix_core::resolve_csrf_token;

    fn host() -> TerminalHost {
        TerminalHost::new(
            GridView::new(&GridConfig { rows: 5, cols: 5, ..GridConfig::default() }),
            "/secure/k/matrix-view/",
            CookieJar::parse("sessionid=s; csrftoken=t"),
        )
    }

    #[test]
    fn newest_notification_wins() {
        let mut h = host();
        h.notify(NotificationKind::Info, "first");
        h.notify(NotificationKind::Error, "second");
        assert_eq!(h.toast_text(), Some((NotificationKind::Error, "second")));
    }

    #[test]
    fn toast_expires_after_dismiss_delay() {
        let mut h = host();
        h.set_dismiss_after(Duration::ZERO);
        h.notify(NotificationKind::Success, "saved");
        h.draw().unwrap();
        assert_eq!(h.toast_text(), None);
    }

    #[test]
    fn scripted_dialogs_then_decline() {
        let mut h = host();
        h.script_answers(&[true]);
        assert!(h.confirm("leave?"));
        assert!(!h.confirm("leave?"));
    }

    #[test]
    fn history_and_reload_flags() {
        let mut h = host();
        h.push_state("/secure/k/matrix-view/");
        assert_eq!(h.history_len(), 2);
        h.reload();
        assert!(h.take_reload());
        assert!(!h.take_reload());
        assert_eq!(resolve_csrf_token(&h), "t");
    }

    #[test]
    fn status_shows_save_state() {
        let h = host();
        let state = SessionState::new();
        state.mark_dirty();
        state.stamp_update(Local::now());
        let ticket = state.begin_save();
        assert!(ticket.is_some());

        let (left, right) = status_text(h.view(), Some(&state));
        assert_eq!(left, " A1 = \"\"");
        assert!(right.starts_with("Saving..."));
        assert!(right.contains("Last update: "));
        assert!(right.contains("* unsaved"));
        assert!(right.ends_with("[F9 Save] [F10 Logout] "));
    }

    #[test]
    fn hidden_toolbar_drops_the_controls() {
        let view = GridView::new(&GridConfig { show_toolbar: false, ..GridConfig::default() });
        let (_, right) = status_text(&view, None);
        assert!(right.is_empty());
    }
}
