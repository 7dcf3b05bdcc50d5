// logging.rs — File logger setup and the console-of-last-resort.
//
// Normal path: a WriteLogger into YumiaDisplayFix.log next to the game exe,
// flushed per record. If even that cannot be set up (or the config file is
// missing before logging is useful), we pop a console, print plain text and
// let the worker unload the module — the host process is never affected.

use std::fs::File;
use std::path::Path;

use log::LevelFilter;
use simplelog::{Config, WriteLogger};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("could not create log file: {0}")]
    Create(#[from] std::io::Error),
    #[error("logger already installed: {0}")]
    Init(#[from] log::SetLoggerError),
}

pub fn init(log_path: &Path) -> Result<(), LogError> {
    let file = File::create(log_path)?;
    WriteLogger::init(LevelFilter::Info, Config::default(), file)?;
    Ok(())
}

/// Allocate a console and print `lines` to it. Only used on fatal startup
/// failures, where the log file is unavailable or was never created.
pub unsafe fn console_fallback(lines: &[String]) {
    use winapi::um::consoleapi::AllocConsole;

    AllocConsole();
    // Rust resolves the std handles per call, so stdout is valid once the
    // console exists.
    for line in lines {
        println!("{}", line);
    }
}
