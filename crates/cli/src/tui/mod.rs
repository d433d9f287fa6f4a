//! Interactive secure matrix session in the terminal.
//!
//! Terminal input is translated into page events for the session. Keys go to
//! the session first; whatever it does not prevent reaches the grid.

pub(crate) mod host;
pub(crate) mod view;

use std::io::stdout;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableBracketedPaste, DisableFocusChange, DisableMouseCapture, EnableBracketedPaste,
        EnableFocusChange, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use secmatrix_client::{BeaconQueue, ClientOptions, MatrixClient};
use secmatrix_config::Settings;
use secmatrix_core::{
    ActivityKind, Beacon, Clock, Dialogs, Key, KeyInput, LoadOutcome, MatrixApi, PageEvent,
    SaveDispatch, SecureMatrixSession, SessionConfig, TickOutcome, Visibility,
};

use crate::headless::cookie_jar;
use host::TerminalHost;
use view::GridView;

/// What a terminal key means before the session sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyRoute {
    /// Application controls that map to page events directly.
    Page(PageEvent),
    /// Close the terminal tab (unload path).
    Quit,
    /// Offered to the session as a keydown, then to the grid.
    Guarded(KeyInput),
    /// Typing inside the cell editor; counts as activity only.
    Editor,
}

pub(crate) fn route_key(key: &KeyEvent, editing: bool) -> KeyRoute {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') if ctrl => return KeyRoute::Quit,
        KeyCode::F(9) => return KeyRoute::Page(PageEvent::SaveClicked),
        KeyCode::F(10) => return KeyRoute::Page(PageEvent::LogoutClicked),
        KeyCode::Left if alt => return KeyRoute::Page(PageEvent::PopState),
        _ => {}
    }

    let Some(input) = key_input(key) else {
        return if editing { KeyRoute::Editor } else { KeyRoute::Guarded(other_key(key)) };
    };
    let modified = input.ctrl || input.alt || input.meta;
    if editing && !modified && !matches!(input.key, Key::F(_)) {
        return KeyRoute::Editor;
    }
    KeyRoute::Guarded(input)
}

fn key_input(key: &KeyEvent) -> Option<KeyInput> {
    let (k, upper) = match key.code {
        KeyCode::Char(c) => (Key::Char(c.to_ascii_lowercase()), c.is_ascii_uppercase()),
        KeyCode::F(n) => (Key::F(n), false),
        KeyCode::Esc => (Key::Escape, false),
        _ => return None,
    };
    Some(KeyInput {
        key: k,
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        shift: upper || key.modifiers.contains(KeyModifiers::SHIFT),
        meta: key.modifiers.intersects(KeyModifiers::SUPER | KeyModifiers::META),
    })
}

fn other_key(key: &KeyEvent) -> KeyInput {
    KeyInput::new(Key::Other(format!("{:?}", key.code)))
}

/// Apply a key the session let through. Returns true if a cell changed.
pub(crate) fn apply_to_grid(view: &mut GridView, key: &KeyEvent) -> bool {
    if view.is_editing() {
        return match key.code {
            KeyCode::Enter => {
                let changed = view.commit_edit();
                view.move_by(1, 0);
                changed
            }
            KeyCode::Tab => {
                let changed = view.commit_edit();
                view.move_by(0, 1);
                changed
            }
            KeyCode::Esc => {
                view.cancel_edit();
                false
            }
            KeyCode::Backspace => {
                view.backspace();
                false
            }
            KeyCode::Char(c) => {
                view.insert_str(&c.to_string());
                false
            }
            _ => false,
        };
    }

    match key.code {
        KeyCode::Up => view.move_by(-1, 0),
        KeyCode::Down => view.move_by(1, 0),
        KeyCode::Left => view.move_by(0, -1),
        KeyCode::Right | KeyCode::Tab => view.move_by(0, 1),
        KeyCode::BackTab => view.move_by(0, -1),
        KeyCode::PageUp => view.move_by(-20, 0),
        KeyCode::PageDown => view.move_by(20, 0),
        KeyCode::Enter | KeyCode::F(2) => view.begin_edit(None),
        KeyCode::Delete | KeyCode::Backspace => return view.clear_cell(),
        KeyCode::Char(c)
            if !key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
        {
            view.begin_edit(Some(c))
        }
        _ => {}
    }
    false
}

/// Loop control after handling one terminal event.
enum Flow {
    Continue,
    Quit,
}

fn handle_event<A, B, C>(
    session: &mut SecureMatrixSession<TerminalHost, A, B, C>,
    ev: Event,
) -> Flow
where
    A: MatrixApi + Clone + Send + 'static,
    B: Beacon,
    C: Clock + Clone,
{
    match ev {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            match route_key(&key, session.host().view().is_editing()) {
                KeyRoute::Quit => return quit(session),
                KeyRoute::Page(page) => {
                    session.dispatch(page);
                }
                KeyRoute::Editor => {
                    session.dispatch(PageEvent::Activity(ActivityKind::KeyPress));
                    if apply_to_grid(session.host_mut().view_mut(), &key) {
                        session.dispatch(PageEvent::GridChanged);
                    }
                }
                KeyRoute::Guarded(input) => {
                    let resp = session.dispatch(PageEvent::KeyDown(input));
                    if !resp.default_prevented
                        && apply_to_grid(session.host_mut().view_mut(), &key)
                    {
                        session.dispatch(PageEvent::GridChanged);
                    }
                }
            }
        }
        Event::Mouse(mouse) => {
            let page = match mouse.kind {
                MouseEventKind::Down(MouseButton::Right) => PageEvent::ContextMenu,
                MouseEventKind::Down(_) => PageEvent::Activity(ActivityKind::PointerDown),
                MouseEventKind::Up(_) => PageEvent::Activity(ActivityKind::Click),
                MouseEventKind::Drag(_) => PageEvent::DragOver,
                MouseEventKind::Moved => PageEvent::Activity(ActivityKind::PointerMove),
                _ => PageEvent::Activity(ActivityKind::Scroll),
            };
            if matches!(mouse.kind, MouseEventKind::ScrollDown) {
                session.host_mut().view_mut().move_by(3, 0);
            } else if matches!(mouse.kind, MouseEventKind::ScrollUp) {
                session.host_mut().view_mut().move_by(-3, 0);
            }
            session.dispatch(page);
        }
        Event::Paste(text) => {
            session.dispatch(PageEvent::Activity(ActivityKind::KeyPress));
            session.host_mut().view_mut().paste(&text);
        }
        Event::FocusLost => {
            session.dispatch(PageEvent::VisibilityChange(Visibility::Hidden));
        }
        Event::FocusGained => {
            session.dispatch(PageEvent::VisibilityChange(Visibility::Visible));
        }
        Event::Resize(..) => {
            session.dispatch(PageEvent::Resize);
        }
        _ => {}
    }
    Flow::Continue
}

/// Closing the tab: before-unload prompt, then unload.
fn quit<A, B, C>(session: &mut SecureMatrixSession<TerminalHost, A, B, C>) -> Flow
where
    A: MatrixApi + Clone + Send + 'static,
    B: Beacon,
    C: Clock + Clone,
{
    let resp = session.dispatch(PageEvent::BeforeUnload);
    if let Some(prompt) = resp.unload_confirmation {
        if !session.host_mut().confirm(&prompt) {
            return Flow::Continue;
        }
    }
    session.dispatch(PageEvent::Unload);
    Flow::Quit
}

/// Run the interactive session. Returns the location the session left for,
/// if it navigated away.
pub(crate) fn run(settings: &Settings) -> Result<Option<String>, String> {
    let client = MatrixClient::new(ClientOptions {
        base_url: settings.base_url.clone(),
        cookie: settings.cookie.clone(),
        timeout: settings.timeout(),
        logout_timeout: settings.logout_timeout(),
    });
    let beacons = BeaconQueue::start(&client);

    terminal::enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {}", e))?;
    stdout()
        .execute(EnterAlternateScreen)
        .map_err(|e| format!("failed to enter alternate screen: {}", e))?;

    struct Cleanup;
    impl Drop for Cleanup {
        fn drop(&mut self) {
            let mut out = stdout();
            let _ = out.execute(DisableBracketedPaste);
            let _ = out.execute(DisableFocusChange);
            let _ = out.execute(DisableMouseCapture);
            let _ = out.execute(LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
        }
    }
    let _cleanup = Cleanup;

    let mut out = stdout();
    for result in [
        out.execute(EnableMouseCapture).map(|_| ()),
        out.execute(EnableFocusChange).map(|_| ()),
        out.execute(EnableBracketedPaste).map(|_| ()),
    ] {
        if let Err(e) = result {
            log::warn!("Terminal feature unavailable: {}", e);
        }
    }

    let terminal = Terminal::new(CrosstermBackend::new(stdout()))
        .map_err(|e| format!("failed to create terminal: {}", e))?;

    let view = GridView::new(&settings.grid);
    let mut host = TerminalHost::new(view, settings.matrix_path.clone(), cookie_jar(settings))
        .with_terminal(terminal);
    host.set_dismiss_after(settings.notification_dismiss());
    host.set_title(format!("secmatrix: {}", settings.base_url));

    let (tx, rx) = mpsc::channel();
    let mut session =
        SecureMatrixSession::new(host, client, beacons, SessionConfig::from_settings(settings));
    let state = std::sync::Arc::clone(session.state());
    session.host_mut().attach_state(state);
    session.set_save_dispatch(SaveDispatch::Background(tx));

    session.host_mut().draw()?;
    if let Some(LoadOutcome::Failed(msg)) = session.on_structure_ready(None) {
        log::warn!("Initial load failed: {}", msg);
    }

    loop {
        while let Ok(completion) = rx.try_recv() {
            session.finish_save(completion);
        }

        if let TickOutcome::AutoSaved(outcome) = session.tick() {
            log::debug!("Auto-save: {:?}", outcome);
        }

        if session.host_mut().take_reload() {
            session.reload_view();
        }
        if session.host().navigated().is_some() {
            break;
        }

        session.host_mut().draw()?;

        if event::poll(Duration::from_millis(100)).map_err(|e| format!("event poll error: {}", e))? {
            let ev = event::read().map_err(|e| format!("event read error: {}", e))?;
            if let Flow::Quit = handle_event(&mut session, ev) {
                break;
            }
        }
    }

    let landing = session.host().navigated().map(String::from);
    if !session.persistence().beacon().drain(settings.logout_timeout()) {
        log::warn!("Exited before all beacons were delivered");
    }
    Ok(landing)
}
