//! Logger setup.
//!
//! One-shot commands log to stderr. The terminal session owns the screen, so
//! it logs to `<state_dir>/secmatrix.log` instead.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use env_logger::{Builder, Env, Target};

pub(crate) fn log_file_path() -> PathBuf {
    secmatrix_config::state_dir().join("secmatrix.log")
}

fn builder(verbose: bool) -> Builder {
    let default_level = if verbose { "debug" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(default_level))
}

pub(crate) fn init_stderr(verbose: bool) {
    let _ = builder(verbose).target(Target::Stderr).try_init();
}

/// Log to file. Falls back to discarding output when the file cannot be
/// opened, since stderr would corrupt the alternate screen.
pub(crate) fn init_file(verbose: bool) -> Option<PathBuf> {
    let path = log_file_path();
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let file = OpenOptions::new().create(true).append(true).open(&path).ok();

    let mut builder = builder(verbose);
    let opened = file.is_some();
    match file {
        Some(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();

    opened.then_some(path)
}
