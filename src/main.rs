//! Forge Companion
//!
//! Console companion for the forge loop: scans the forge panel to compute
//! the ore multiplier, and runs the hold / sell macro with optional
//! progress reports.

mod automation;
mod calculator;
mod capture;
mod ocr;
mod ores;
mod paths;
mod report;

use anyhow::Result;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use automation::{
    Collaborators, InputDriver, MacroRunner, RunState, ScanMonitor, StartOutcome,
};
use capture::{FrameSource, ImageFileSource};
use ocr::{TesseractRecognizer, TextRecognizer};
use report::WebhookReporter;

const LOG_FILE: &str = "forge_companion.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(paths::get_logs_dir().join(LOG_FILE))
        {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    paths::ensure_directories()?;

    if let Err(e) = ocr::ensure_tessdata() {
        log(&format!("Warning: Failed to setup Tesseract: {}", e));
        log("OCR features may not work correctly.");
    }

    automation::init_config();
    let config = Arc::new(automation::get_config().clone());

    let dry_run = std::env::args().any(|a| a == "--dry-run");
    let capture_path = config
        .capture_path
        .clone()
        .unwrap_or_else(|| paths::get_app_dir().join("screen.png"));
    log(&format!("Reading frames from: {}", capture_path.display()));

    let frames: Arc<dyn FrameSource> = Arc::new(ImageFileSource::new(capture_path));
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(TesseractRecognizer::new(
        Arc::clone(&frames),
        config.preferences.ocr_psm,
    ));
    let reporter = Arc::new(WebhookReporter::new(
        config.webhook.clone(),
        Some(Arc::clone(&frames)),
    )?);

    let runner = MacroRunner::new(
        Arc::clone(&config),
        Collaborators {
            input: input_driver(dry_run),
            recognizer: Arc::clone(&recognizer),
            reporter,
        },
    );
    let monitor = ScanMonitor::new(Arc::clone(&config), Arc::clone(&recognizer));

    log("Ready. Commands: start, stop, status, scan, analyze <image>, quit");
    run_console(&runner, &monitor, config.preferences.ocr_psm);

    monitor.stop();
    runner.stop();
    monitor.join();
    runner.join();
    log("Bye");
    Ok(())
}

#[cfg(windows)]
fn input_driver(dry_run: bool) -> Arc<dyn InputDriver> {
    if dry_run {
        log("Dry run: input is logged, not sent");
        Arc::new(automation::DryRunInput)
    } else {
        Arc::new(automation::SendInputDriver)
    }
}

#[cfg(not(windows))]
fn input_driver(_dry_run: bool) -> Arc<dyn InputDriver> {
    log("Input injection is Windows-only; running dry");
    Arc::new(automation::DryRunInput)
}

/// Reads commands from stdin until `quit` or end of input.
fn run_console(runner: &MacroRunner, monitor: &ScanMonitor, psm: u8) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next().map(str::trim).unwrap_or("");

        match command.as_str() {
            "" => {}
            "start" => match runner.start() {
                StartOutcome::Started => {}
                StartOutcome::AlreadyRunning => log("Macro is already running"),
                StartOutcome::ConfigurationMissing(missing) => {
                    log(&format!("Missing buttons: {}", missing.join(", ")))
                }
            },
            "stop" => {
                if runner.state() == RunState::Idle {
                    log("Macro is not running");
                }
                runner.stop();
            }
            "status" => print_status(runner, monitor),
            "scan" => {
                if monitor.is_running() {
                    monitor.stop();
                } else if let StartOutcome::ConfigurationMissing(missing) = monitor.start() {
                    log(&format!("Missing regions: {}", missing.join(", ")));
                }
            }
            "analyze" => {
                if arg.is_empty() {
                    log("Usage: analyze <image>");
                } else {
                    analyze_image(PathBuf::from(arg), psm);
                }
            }
            "quit" | "exit" => break,
            other => log(&format!("Unknown command: {}", other)),
        }
    }
}

fn print_status(runner: &MacroRunner, monitor: &ScanMonitor) {
    log(&format!("Macro: {}", runner.state()));
    log(&format!(
        "Scan: {}",
        if monitor.is_running() { "running" } else { "stopped" }
    ));
    match monitor.latest() {
        Some(result) => {
            let at = result.scanned_at.format("%H:%M:%S");
            match result.outcome {
                Some(outcome) => log(&format!("Last scan ({}): {}", at, outcome.summary())),
                None if !result.verdict.is_ready => log(&format!("Last scan ({}): forge not open", at)),
                None => log(&format!("Last scan ({}): no ores selected", at)),
            }
        }
        None => log("No scan results yet"),
    }
}

/// Runs recognition, classification and calculation on a saved screenshot.
fn analyze_image(path: PathBuf, psm: u8) {
    log(&format!("Analyzing {}...", path.display()));
    let recognizer = TesseractRecognizer::new(Arc::new(ImageFileSource::new(path)), psm);
    let text = match recognizer.recognize(None) {
        Ok(text) => text,
        Err(e) => {
            log(&format!("OCR failed: {}", e));
            return;
        }
    };

    let config = automation::get_config();
    let result = automation::scan_text(&text, &config.detection, ores::catalog());
    log(&format!(
        "Forge open: {}, ores selected: {}",
        result.verdict.is_ready, result.verdict.has_targets
    ));
    let outcome = result
        .outcome
        .unwrap_or_else(|| calculator::calculate(&ocr::parse_ores(&text, ores::catalog())));
    log(&outcome.summary());
}
