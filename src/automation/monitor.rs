//! Periodic forge panel scanning.
//!
//! While running, the monitor reads the ore panel at the configured interval,
//! classifies it, and when the forge is ready computes the multiplier. The
//! latest result is kept for the host to display.

use chrono::{DateTime, Local};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::automation::config::{AppConfig, Region, ORES_PANEL};
use crate::automation::detection::{classify_with, DetectionThresholds, UiVerdict};
use crate::automation::runner::StartOutcome;
use crate::automation::state::{CancelToken, RunState, StateCell};
use crate::calculator::{calculate, Outcome};
use crate::ocr::extract::parse_ores;
use crate::ocr::TextRecognizer;
use crate::ores::{catalog, OreInfo};

/// One scan of the forge panel.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub verdict: UiVerdict,
    /// Present only when the forge is ready and has ores to read
    pub outcome: Option<Outcome>,
    pub scanned_at: DateTime<Local>,
}

/// Classifies recognized panel text and, if the forge is ready, aggregates it.
pub fn scan_text(text: &str, thresholds: &DetectionThresholds, catalog: &[OreInfo]) -> ScanResult {
    let verdict = classify_with(text, thresholds);
    let outcome = (verdict.is_ready && verdict.has_targets)
        .then(|| calculate(&parse_ores(text, catalog)));
    ScanResult {
        verdict,
        outcome,
        scanned_at: Local::now(),
    }
}

#[derive(Default)]
struct Control {
    token: CancelToken,
    worker: Option<JoinHandle<()>>,
}

pub struct ScanMonitor {
    config: Arc<AppConfig>,
    recognizer: Arc<dyn TextRecognizer>,
    state: Arc<StateCell>,
    latest: Arc<Mutex<Option<ScanResult>>>,
    control: Mutex<Control>,
}

impl ScanMonitor {
    pub fn new(config: Arc<AppConfig>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            config,
            recognizer,
            state: Arc::new(StateCell::new()),
            latest: Arc::new(Mutex::new(None)),
            control: Mutex::new(Control::default()),
        }
    }

    pub fn start(&self) -> StartOutcome {
        let mut control = self.control.lock().unwrap_or_else(|e| e.into_inner());

        if self.state.get() != RunState::Idle {
            return StartOutcome::AlreadyRunning;
        }
        let Some(region) = self.config.region(ORES_PANEL).copied() else {
            crate::log("Scan not started: select the ores panel region first");
            return StartOutcome::ConfigurationMissing(vec![ORES_PANEL.to_string()]);
        };
        if !self.state.transition(RunState::Idle, RunState::Running) {
            return StartOutcome::AlreadyRunning;
        }

        if let Some(previous) = control.worker.take() {
            let _ = previous.join();
        }

        let token = CancelToken::new();
        control.token = token.clone();

        let config = Arc::clone(&self.config);
        let recognizer = Arc::clone(&self.recognizer);
        let state = Arc::clone(&self.state);
        let latest = Arc::clone(&self.latest);
        control.worker = Some(thread::spawn(move || {
            let _idle = IdleOnExit(&state);
            run_monitor(&config, recognizer.as_ref(), region, &latest, &token);
        }));

        crate::log(&format!(
            "Scan started (every {:.1}s)",
            self.config.preferences.scan_interval
        ));
        StartOutcome::Started
    }

    pub fn stop(&self) {
        let control = self.control.lock().unwrap_or_else(|e| e.into_inner());
        if self.state.transition(RunState::Running, RunState::Stopping) {
            control.token.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.get() == RunState::Running
    }

    /// Most recent successful scan, if any.
    pub fn latest(&self) -> Option<ScanResult> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Waits for the worker to exit.
    pub fn join(&self) {
        let handle = self
            .control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .worker
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for ScanMonitor {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

struct IdleOnExit<'a>(&'a StateCell);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        self.0.set(RunState::Idle);
        crate::log("Scan stopped");
    }
}

fn run_monitor(
    config: &AppConfig,
    recognizer: &dyn TextRecognizer,
    region: Region,
    latest: &Mutex<Option<ScanResult>>,
    token: &CancelToken,
) {
    let period = config.preferences.scan_period();
    let mut last_summary: Option<String> = None;

    loop {
        match recognizer.recognize(Some(&region)) {
            Ok(text) => {
                let result = scan_text(&text, &config.detection, catalog());

                // Only log when what the user would see changes
                let summary = result.outcome.as_ref().map(Outcome::summary);
                if summary != last_summary {
                    match &summary {
                        Some(s) => crate::log(&format!("Scan: {}", s.replace('\n', " | "))),
                        None => crate::log("Scan: forge not ready"),
                    }
                    last_summary = summary;
                }

                *latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
            }
            Err(e) => crate::log(&format!("Scan: recognition failed: {}", e)),
        }

        if token.wait_timeout(period) {
            break;
        }
    }
}
