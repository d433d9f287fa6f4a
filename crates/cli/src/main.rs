// secmatrix: guarded secure-matrix sessions from the terminal

mod exit_codes;
mod headless;
mod logging;
mod tui;
mod util;

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use secmatrix_client::{BeaconQueue, ClientOptions, MatrixClient};
use secmatrix_config::{ConfigError, Settings};
use secmatrix_core::{
    Endpoints, GridAdapter, HistoryOutcome, LoadOutcome, MatrixData, PersistenceClient,
    SaveOutcome, SessionState,
};
use secmatrix_protocol::LoadCellsRequest;

use exit_codes::{
    EXIT_ERROR, EXIT_HISTORY_FAILED, EXIT_IO, EXIT_LOAD_FAILED, EXIT_LOGOUT_INCOMPLETE,
    EXIT_PARSE, EXIT_SAVE_FAILED, EXIT_SUCCESS, EXIT_TERMINAL, EXIT_USAGE,
};
use headless::HeadlessHost;

#[derive(Parser)]
#[command(name = "secmatrix")]
#[command(about = "Guarded secure matrix sessions: interactive editor and one-shot commands")]
#[command(long_version = long_version())]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalArgs {
    /// Settings file (default: <config dir>/secmatrix/settings.json)
    #[arg(long, global = true, env = "SECMATRIX_CONFIG")]
    config: Option<PathBuf>,

    /// Server base URL, e.g. https://books.example
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Access code of the secure session (overrides the matrix path)
    #[arg(long, global = true)]
    access_code: Option<String>,

    /// Raw Cookie header for the authenticated session
    #[arg(long, global = true)]
    cookie: Option<String>,

    /// CSRF token to use when no csrftoken cookie is present
    #[arg(long, global = true)]
    csrf_token: Option<String>,

    /// Debug logging (stderr, or the log file for `open`)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the guarded matrix editor in the terminal
    #[command(after_help = "\
Keys:
  arrows / Enter      Move / edit cell        F9      Save
  Ctrl+S              Save                    F10     Logout
  Ctrl+Z / Ctrl+Y     Undo / redo             Esc     Logout (asks first)
  Alt+Left            Back (asks first)       Ctrl+Q  Close")]
    Open,

    /// Save a matrix file ({\"matrix_data\": {...}} or a bare row map; - for stdin)
    #[command(after_help = "\
Examples:
  secmatrix save matrix.json
  echo '{\"0\": {\"0\": \"100\"}}' | secmatrix save -")]
    Save {
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Step the server-side history back
    Undo {
        /// Print the restored matrix as JSON
        #[arg(long)]
        json: bool,
    },

    /// Step the server-side history forward
    Redo {
        /// Print the restored matrix as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a window of cells (half-open bounds, defaults from settings)
    Load {
        #[arg(long)]
        start_row: Option<u32>,
        #[arg(long)]
        end_row: Option<u32>,
        #[arg(long)]
        start_col: Option<u32>,
        #[arg(long)]
        end_col: Option<u32>,

        /// Print the matrix as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run the logout sequence (beacon plus logout request)
    Logout,

    /// Inspect settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file path
    Path,
    /// Print the effective settings (secrets redacted)
    Show,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("SECMATRIX_COMMIT"), ")",
        "\ntarget:  ", env!("SECMATRIX_TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let g = &cli.global;

    let log_file = if matches!(cli.command, Some(Commands::Open)) {
        logging::init_file(g.verbose)
    } else {
        logging::init_stderr(g.verbose);
        None
    };

    let result = match cli.command {
        None => {
            eprintln!("Usage: secmatrix <command> [options]");
            eprintln!("       secmatrix --help for more information");
            Ok(())
        }
        Some(Commands::Open) => load_settings(g).and_then(|s| cmd_open(&s, log_file)),
        Some(Commands::Config(ConfigCommands::Path)) => cmd_config_path(g),
        Some(Commands::Config(ConfigCommands::Show)) => {
            load_settings(g).and_then(|s| cmd_config_show(&s))
        }
        Some(Commands::Save { file, json }) => load_settings(g).and_then(|s| cmd_save(&s, file, json)),
        Some(Commands::Undo { json }) => {
            load_settings(g).and_then(|s| cmd_history(&s, Step::Undo, json))
        }
        Some(Commands::Redo { json }) => {
            load_settings(g).and_then(|s| cmd_history(&s, Step::Redo, json))
        }
        Some(Commands::Load { start_row, end_row, start_col, end_col, json }) => {
            load_settings(g).and_then(|s| {
                let defaults = window_from_settings(&s);
                let window = LoadCellsRequest {
                    start_row: start_row.unwrap_or(defaults.start_row),
                    end_row: end_row.unwrap_or(defaults.end_row),
                    start_col: start_col.unwrap_or(defaults.start_col),
                    end_col: end_col.unwrap_or(defaults.end_col),
                };
                cmd_load(&s, window, json)
            })
        }
        Some(Commands::Logout) => load_settings(g).and_then(|s| cmd_logout(&s)),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EXIT_PARSE, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Io(_) => EXIT_IO,
            ConfigError::Parse(_) => EXIT_PARSE,
        };
        CliError::new(code, format!("settings: {}", err))
    }
}

// ============================================================================
// Settings
// ============================================================================

/// File (or default location), then `SECMATRIX_*` variables, then flags.
fn load_settings(g: &GlobalArgs) -> Result<Settings, CliError> {
    let mut settings = match &g.config {
        Some(path) => Settings::load_from(path)
            .map_err(CliError::from)
            .map_err(|e| e.with_hint(format!("check {}", path.display())))?,
        None => Settings::load(),
    };
    settings.apply_env();

    if let Some(ref url) = g.base_url {
        settings.base_url = url.clone();
    }
    if let Some(ref code) = g.access_code {
        settings.access_code = Some(code.clone());
    }
    if let Some(ref cookie) = g.cookie {
        settings.cookie = Some(cookie.clone());
    }
    if let Some(ref token) = g.csrf_token {
        settings.csrf_token = Some(token.clone());
    }

    if settings.base_url.trim().is_empty() {
        return Err(CliError::args("no server base URL configured")
            .with_hint("pass --base-url or set SECMATRIX_BASE_URL"));
    }
    Ok(settings)
}

fn client_options(settings: &Settings) -> ClientOptions {
    ClientOptions {
        base_url: settings.base_url.clone(),
        cookie: settings.cookie.clone(),
        timeout: settings.timeout(),
        logout_timeout: settings.logout_timeout(),
    }
}

fn window_from_settings(settings: &Settings) -> LoadCellsRequest {
    LoadCellsRequest {
        start_row: 0,
        end_row: settings.grid.rows,
        start_col: 0,
        end_col: settings.grid.cols,
    }
}

/// Persistence client plus headless host for a single request.
fn one_shot(settings: &Settings) -> (PersistenceClient<MatrixClient, BeaconQueue>, HeadlessHost) {
    let client = MatrixClient::new(client_options(settings));
    let beacons = BeaconQueue::start(&client);
    let endpoints = Endpoints::resolve(settings.access_code.as_deref(), &settings.matrix_path);
    log::debug!("Endpoints under {}", endpoints.save());

    let persistence = PersistenceClient::new(
        client,
        beacons,
        SessionState::new(),
        endpoints,
        GridAdapter::new(settings.grid.sheet_name.as_str()),
        settings.landing_path.as_str(),
    );
    (persistence, HeadlessHost::from_settings(settings))
}

fn last_message(host: &HeadlessHost) -> String {
    host.last_note().map(|(_, m)| m.clone()).unwrap_or_default()
}

// ============================================================================
// open
// ============================================================================

fn cmd_open(settings: &Settings, log_file: Option<PathBuf>) -> Result<(), CliError> {
    match tui::run(settings) {
        Ok(Some(landing)) => {
            println!("Session closed; left for {}", landing);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            let err = CliError::new(EXIT_TERMINAL, e);
            Err(match log_file {
                Some(path) => err.with_hint(format!("see {}", path.display())),
                None => err,
            })
        }
    }
}

// ============================================================================
// save
// ============================================================================

/// Accepts `{"matrix_data": {...}}` or the bare row map.
fn read_matrix(file: &PathBuf) -> Result<MatrixData, CliError> {
    let text = if file.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::io(format!("stdin: {}", e)))?;
        buf
    } else {
        std::fs::read_to_string(file)
            .map_err(|e| CliError::io(format!("{}: {}", file.display(), e)))?
    };

    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| CliError::parse(format!("{}: {}", file.display(), e)))?;
    if !value.is_object() {
        return Err(CliError::parse(format!("{}: expected a JSON object", file.display())));
    }
    let rows = value.get("matrix_data").unwrap_or(&value);
    Ok(MatrixData::from_value(rows))
}

fn cmd_save(settings: &Settings, file: PathBuf, json: bool) -> Result<(), CliError> {
    let data = read_matrix(&file)?;
    let (persistence, mut host) = one_shot(settings);
    persistence.load_data(&mut host, &data);

    match persistence.save(&mut host) {
        SaveOutcome::Saved { cells_updated } => {
            if json {
                println!("{}", serde_json::json!({ "success": true, "cells_updated": cells_updated }));
            } else {
                println!("{}", last_message(&host));
            }
            Ok(())
        }
        SaveOutcome::NothingToSave => {
            if json {
                println!("{}", serde_json::json!({ "success": true, "cells_updated": 0 }));
            } else {
                println!("{}", last_message(&host));
            }
            Ok(())
        }
        SaveOutcome::Failed(msg) => Err(CliError::new(EXIT_SAVE_FAILED, msg)),
        other => Err(CliError::new(EXIT_ERROR, format!("save not completed: {:?}", other))),
    }
}

// ============================================================================
// undo / redo
// ============================================================================

#[derive(Clone, Copy)]
enum Step {
    Undo,
    Redo,
}

fn cmd_history(settings: &Settings, step: Step, json: bool) -> Result<(), CliError> {
    let (persistence, mut host) = one_shot(settings);
    let outcome = match step {
        Step::Undo => persistence.undo(&mut host),
        Step::Redo => persistence.redo(&mut host),
    };

    match outcome {
        HistoryOutcome::Reloaded { cells } => {
            if json {
                let data = persistence.grid().extract(&host);
                println!("{}", serde_json::json!({ "success": true, "matrix_data": data }));
            } else {
                println!("{} ({} cells)", last_message(&host), cells);
            }
            Ok(())
        }
        HistoryOutcome::ViewReloaded => {
            let message = last_message(&host);
            // No snapshot: fetch the configured window like a reloaded page would.
            let reloaded = host.reloaded()
                && matches!(
                    persistence.load_initial(&mut host, &window_from_settings(settings)),
                    LoadOutcome::Loaded { .. }
                );
            let data = reloaded.then(|| persistence.grid().extract(&host));
            if json {
                println!("{}", serde_json::json!({ "success": true, "matrix_data": data }));
            } else {
                match data {
                    Some(data) => println!("{} ({} cells after reload)", message, data.cell_count()),
                    None => println!("{} (no snapshot returned; reload the view)", message),
                }
            }
            Ok(())
        }
        HistoryOutcome::Failed(msg) => Err(CliError::new(EXIT_HISTORY_FAILED, msg)),
        HistoryOutcome::Ignored => Err(CliError::new(EXIT_ERROR, "history step not performed")),
    }
}

// ============================================================================
// load
// ============================================================================

fn cmd_load(settings: &Settings, window: LoadCellsRequest, json: bool) -> Result<(), CliError> {
    if window.start_row >= window.end_row || window.start_col >= window.end_col {
        return Err(CliError::args(format!(
            "empty window: rows {}..{}, cols {}..{}",
            window.start_row, window.end_row, window.start_col, window.end_col
        )));
    }

    let (persistence, mut host) = one_shot(settings);
    match persistence.load_initial(&mut host, &window) {
        LoadOutcome::Loaded { .. } => {
            let data = persistence.grid().extract(&host);
            if json {
                let out = serde_json::to_string_pretty(&data)
                    .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
                println!("{}", out);
            } else {
                print_table(&data, settings.grid.col_chars());
            }
            Ok(())
        }
        LoadOutcome::Failed(msg) => Err(CliError::new(EXIT_LOAD_FAILED, msg)),
    }
}

/// Rows that hold data, columns up to the rightmost filled one.
fn print_table(data: &MatrixData, col_width: usize) {
    if data.is_empty() {
        println!("(empty)");
        return;
    }
    let last_col = data.cells().map(|(_, c, _)| c).max().unwrap_or(0);
    let last_row = data.rows().map(|(r, _)| r).max().unwrap_or(0);
    let gutter = (last_row as u64 + 1).to_string().len();

    let mut header = format!("{} ", " ".repeat(gutter));
    for c in 0..=last_col {
        header.push_str(&util::fit_cell(&util::col_letter(c), col_width));
        header.push(' ');
    }
    println!("{}", header.trim_end());

    for (r, cells) in data.rows() {
        let mut line = format!("{:>width$} ", r as u64 + 1, width = gutter);
        for c in 0..=last_col {
            let text = cells.get(&c).map(String::as_str).unwrap_or("");
            line.push_str(&util::fit_cell(text, col_width));
            line.push(' ');
        }
        println!("{}", line.trim_end());
    }
}

// ============================================================================
// logout
// ============================================================================

fn cmd_logout(settings: &Settings) -> Result<(), CliError> {
    let (persistence, mut host) = one_shot(settings);
    persistence.logout(&mut host);

    if !persistence.beacon().drain(settings.logout_timeout()) {
        return Err(CliError::new(EXIT_LOGOUT_INCOMPLETE, "logout beacon not delivered in time")
            .with_hint("the server may still hold the session; run logout again"));
    }
    println!(
        "Logged out; landing page {}",
        host.navigated().unwrap_or(settings.landing_path.as_str())
    );
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_path(g: &GlobalArgs) -> Result<(), CliError> {
    let path = g.config.clone().unwrap_or_else(Settings::config_path);
    println!("{}", path.display());
    Ok(())
}

fn cmd_config_show(settings: &Settings) -> Result<(), CliError> {
    let mut shown = settings.clone();
    let redact = |v: &mut Option<String>| {
        if v.is_some() {
            *v = Some("<redacted>".to_string());
        }
    };
    redact(&mut shown.cookie);
    redact(&mut shown.csrf_token);

    let out = serde_json::to_string_pretty(&shown).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    println!("{}", out);
    Ok(())
}
