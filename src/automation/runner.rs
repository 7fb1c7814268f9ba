//! Macro runner: the hold / sell / report cycle on a background thread.
//!
//! `start` validates the configured targets and spawns one worker thread;
//! `stop` flips the state to Stopping and cancels the run's token. The worker
//! owns the [`CycleState`] and hands it back through its join handle.

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::automation::config::{
    ActionTarget, AppConfig, MacroButton, ACCEPT, BREAK_POSITION, CLOSE_MENU, INVENTORY,
    SELECT_ALL, SELL_TAB, STATS_REGION, YES_CONFIRM,
};
use crate::automation::input::InputDriver;
use crate::automation::state::{CancelToken, CycleState, RunState, StateCell};
use crate::ocr::extract::parse_stats;
use crate::ocr::TextRecognizer;
use crate::ores::catalog;
use crate::report::{should_report, ReportPayload, Reporter, StatsSnapshot};

/// Roles that must be configured before the macro can start.
const REQUIRED_ROLES: [&str; 2] = [BREAK_POSITION, INVENTORY];

/// Menu steps between opening and closing the inventory, in order.
const SELL_STEPS: [&str; 4] = [SELL_TAB, SELECT_ALL, ACCEPT, YES_CONFIRM];

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A run is active or still shutting down
    AlreadyRunning,
    /// Required button roles have no target
    ConfigurationMissing(Vec<String>),
}

/// External capabilities a run drives.
#[derive(Clone)]
pub struct Collaborators {
    pub input: Arc<dyn InputDriver>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub reporter: Arc<dyn Reporter>,
}

/// Per-run control data. Start and stop both hold this lock while they
/// change the run state.
#[derive(Default)]
struct Control {
    token: CancelToken,
    worker: Option<JoinHandle<CycleState>>,
}

pub struct MacroRunner {
    config: Arc<AppConfig>,
    collaborators: Collaborators,
    state: Arc<StateCell>,
    control: Mutex<Control>,
}

impl MacroRunner {
    pub fn new(config: Arc<AppConfig>, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            state: Arc::new(StateCell::new()),
            control: Mutex::new(Control::default()),
        }
    }

    /// Starts a fresh run from cycle 1.
    ///
    /// Does nothing unless the runner is idle and the required targets are
    /// configured.
    pub fn start(&self) -> StartOutcome {
        let mut control = self.control.lock().unwrap_or_else(|e| e.into_inner());

        if self.state.get() != RunState::Idle {
            return StartOutcome::AlreadyRunning;
        }

        let missing = missing_roles(&self.config);
        if !missing.is_empty() {
            crate::log(&format!(
                "Macro not started: configure {} first",
                missing.join(", ")
            ));
            return StartOutcome::ConfigurationMissing(missing);
        }

        if !self.state.transition(RunState::Idle, RunState::Running) {
            return StartOutcome::AlreadyRunning;
        }

        // The previous worker has already torn down; collect it.
        if let Some(previous) = control.worker.take() {
            let _ = previous.join();
        }

        let token = CancelToken::new();
        control.token = token.clone();

        let config = Arc::clone(&self.config);
        let collaborators = self.collaborators.clone();
        let state = Arc::clone(&self.state);
        control.worker = Some(thread::spawn(move || {
            run_macro(&config, &collaborators, &state, &token)
        }));

        crate::log(&format!(
            "Macro started (hold {:.1} min, auto-sell {})",
            self.config.macro_settings.hold_duration,
            if self.config.macro_settings.auto_sell { "on" } else { "off" }
        ));
        StartOutcome::Started
    }

    /// Requests the running cycle to stop. Returns immediately.
    pub fn stop(&self) {
        // Held across the transition so a concurrent start cannot swap the token
        let control = self.control.lock().unwrap_or_else(|e| e.into_inner());
        if self.state.transition(RunState::Running, RunState::Stopping) {
            crate::log("Macro stop requested");
            control.token.cancel();
        }
    }

    /// True only while a run is active and not stopping.
    pub fn is_running(&self) -> bool {
        self.state.get() == RunState::Running
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Waits for the current worker and returns its final cycle state.
    ///
    /// `None` if there was no worker or it panicked.
    pub fn join(&self) -> Option<CycleState> {
        let handle = self
            .control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .worker
            .take()?;
        handle.join().ok()
    }
}

impl Drop for MacroRunner {
    fn drop(&mut self) {
        self.stop();
        let _ = self.join();
    }
}

/// Lists required roles with no usable target.
fn missing_roles(config: &AppConfig) -> Vec<String> {
    REQUIRED_ROLES
        .iter()
        .filter(|role| config.target(role).is_none())
        .map(|role| role.to_string())
        .collect()
}

/// Releases input and returns to Idle when the worker exits, panics included.
struct Teardown<'a> {
    input: &'a dyn InputDriver,
    state: &'a StateCell,
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.input.release() {
            crate::log(&format!("Macro: final release failed: {}", e));
        }
        self.state.set(RunState::Idle);
        crate::log("Macro stopped");
    }
}

fn run_macro(
    config: &AppConfig,
    collaborators: &Collaborators,
    state: &StateCell,
    token: &CancelToken,
) -> CycleState {
    let _teardown = Teardown {
        input: collaborators.input.as_ref(),
        state,
    };

    let mut cycle = CycleState::new();
    while !token.is_cancelled() {
        if !run_cycle(config, collaborators, token, &mut cycle) {
            break;
        }
    }

    crate::log(&format!(
        "Macro finished after {} cycle(s) in {:.1}s",
        cycle.cycle_number - 1,
        cycle.started_at.elapsed().as_secs_f32()
    ));
    cycle
}

/// Runs one full cycle. Returns false when the run was cancelled.
fn run_cycle(
    config: &AppConfig,
    collaborators: &Collaborators,
    token: &CancelToken,
    cycle: &mut CycleState,
) -> bool {
    let n = cycle.cycle_number;
    let settings = &config.macro_settings;
    let input = collaborators.input.as_ref();

    if let Some((x, y)) = config.button(BREAK_POSITION).and_then(MacroButton::coords) {
        crate::log(&format!(
            "Cycle {}: holding at ({}, {}) for {:.1} min",
            n, x, y, settings.hold_duration
        ));
        if let Err(e) = input.press_hold(x, y) {
            crate::log(&format!("Cycle {}: press failed: {}", n, e));
        }
        let cancelled = token.wait_timeout(settings.hold());
        if let Err(e) = input.release() {
            crate::log(&format!("Cycle {}: release failed: {}", n, e));
        }
        if cancelled {
            crate::log(&format!("Cycle {}: stopped during hold", n));
            return false;
        }
        // Once released, the cycle runs to completion; stop is seen at its end
        thread::sleep(Duration::from_millis(settings.post_release_delay_ms));
    }

    if settings.auto_sell {
        sell_sequence(config, input, n);
    }

    if should_report(n, &config.webhook) {
        send_report(config, collaborators, cycle);
    }

    cycle.cycle_number += 1;

    !token.wait_timeout(Duration::from_millis(settings.cycle_delay_ms))
}

/// Opens the inventory, sells everything and closes the menu.
///
/// Unconfigured steps are skipped. Not interruptible.
fn sell_sequence(config: &AppConfig, input: &dyn InputDriver, n: u32) {
    let settings = &config.macro_settings;
    let menu_delay = Duration::from_millis(settings.menu_delay_ms);
    let step_delay = Duration::from_millis(settings.step_delay_ms);

    crate::log(&format!("Cycle {}: selling", n));

    let steps = std::iter::once((INVENTORY, menu_delay))
        .chain(SELL_STEPS.iter().map(|role| (*role, step_delay)))
        .chain(std::iter::once((CLOSE_MENU, menu_delay)));

    for (role, delay) in steps {
        let Some(target) = config.target(role) else {
            continue;
        };
        if let Err(e) = perform(input, &target) {
            crate::log(&format!("Cycle {}: {} failed: {}", n, role, e));
        }
        thread::sleep(delay);
    }
}

fn perform(input: &dyn InputDriver, target: &ActionTarget) -> Result<()> {
    match target {
        ActionTarget::Point { x, y } => input.click(*x, *y),
        ActionTarget::Key(key) => input.tap_key(key),
    }
}

/// Scans stats if enabled and delivers the cycle's report.
fn send_report(config: &AppConfig, collaborators: &Collaborators, cycle: &mut CycleState) {
    let n = cycle.cycle_number;

    let stats = if config.webhook.track_stats {
        let region = config.region(STATS_REGION);
        let (level, money) = match collaborators.recognizer.recognize(region) {
            Ok(text) => {
                let scan = parse_stats(&text, catalog());
                cycle.merge(&scan);
                (scan.level, scan.money)
            }
            Err(e) => {
                crate::log(&format!("Cycle {}: stats scan failed: {}", n, e));
                (None, None)
            }
        };
        Some(StatsSnapshot {
            rare_ores: cycle.cumulative_stats.clone(),
            level,
            money,
        })
    } else {
        None
    };

    let payload = ReportPayload { cycle: n, stats };
    if let Err(e) = collaborators.reporter.deliver(&payload) {
        crate::log(&format!("Cycle {}: report failed: {}", n, e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::config::{Region, WebhookSettings};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Hold(i32, i32),
        Release,
        Click(i32, i32),
        Key(String),
    }

    #[derive(Default)]
    struct RecordingInput {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingInput {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: Event) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    impl InputDriver for RecordingInput {
        fn press_hold(&self, x: i32, y: i32) -> Result<()> {
            self.push(Event::Hold(x, y))
        }
        fn release(&self) -> Result<()> {
            self.push(Event::Release)
        }
        fn click(&self, x: i32, y: i32) -> Result<()> {
            self.push(Event::Click(x, y))
        }
        fn tap_key(&self, key: &str) -> Result<()> {
            self.push(Event::Key(key.to_string()))
        }
    }

    struct ScriptedRecognizer {
        text: Option<String>,
        regions: Mutex<Vec<Option<Region>>>,
    }

    impl ScriptedRecognizer {
        fn returning(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                regions: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                text: None,
                regions: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn recognize(&self, region: Option<&Region>) -> Result<String> {
            self.regions.lock().unwrap().push(region.copied());
            self.text.clone().ok_or_else(|| anyhow!("ocr unavailable"))
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        payloads: Mutex<Vec<ReportPayload>>,
    }

    impl Reporter for RecordingReporter {
        fn deliver(&self, payload: &ReportPayload) -> Result<()> {
            self.payloads.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FailingReporter {
        calls: AtomicUsize,
    }

    impl Reporter for FailingReporter {
        fn deliver(&self, _payload: &ReportPayload) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("HTTP 500"))
        }
    }

    struct PanickingReporter;

    impl Reporter for PanickingReporter {
        fn deliver(&self, _payload: &ReportPayload) -> Result<()> {
            panic!("reporter blew up");
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    /// Full target set with zero delays and a hold of a few milliseconds.
    fn fast_config() -> AppConfig {
        let mut config = AppConfig::default();
        let buttons = &mut config.macro_buttons;
        buttons.insert(BREAK_POSITION.to_string(), MacroButton::point(960, 540));
        buttons.insert(INVENTORY.to_string(), MacroButton::key("e"));
        buttons.insert(SELL_TAB.to_string(), MacroButton::point(1, 1));
        buttons.insert(SELECT_ALL.to_string(), MacroButton::point(2, 2));
        buttons.insert(ACCEPT.to_string(), MacroButton::point(3, 3));
        buttons.insert(YES_CONFIRM.to_string(), MacroButton::point(4, 4));
        buttons.insert(CLOSE_MENU.to_string(), MacroButton::key("tab"));

        let settings = &mut config.macro_settings;
        settings.hold_duration = 0.0001;
        settings.post_release_delay_ms = 0;
        settings.menu_delay_ms = 0;
        settings.step_delay_ms = 0;
        settings.cycle_delay_ms = 0;
        config
    }

    fn reporting(interval: u32, track_stats: bool) -> WebhookSettings {
        WebhookSettings {
            enabled: true,
            discord_id: "1234".to_string(),
            cycle_interval: interval,
            track_stats,
            ..Default::default()
        }
    }

    fn runner_with(
        config: AppConfig,
        input: Arc<RecordingInput>,
        recognizer: Arc<dyn TextRecognizer>,
        reporter: Arc<dyn Reporter>,
    ) -> MacroRunner {
        MacroRunner::new(
            Arc::new(config),
            Collaborators {
                input,
                recognizer,
                reporter,
            },
        )
    }

    fn quiet_runner(config: AppConfig, input: Arc<RecordingInput>) -> MacroRunner {
        runner_with(
            config,
            input,
            Arc::new(ScriptedRecognizer::failing()),
            Arc::new(RecordingReporter::default()),
        )
    }

    #[test]
    fn test_start_requires_targets() {
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(AppConfig::default(), input.clone());
        assert_eq!(
            runner.start(),
            StartOutcome::ConfigurationMissing(vec![
                BREAK_POSITION.to_string(),
                INVENTORY.to_string()
            ])
        );
        assert!(!runner.is_running());
        assert_eq!(runner.state(), RunState::Idle);
        assert!(runner.join().is_none());
        assert!(input.events().is_empty());

        let mut config = AppConfig::default();
        config
            .macro_buttons
            .insert(INVENTORY.to_string(), MacroButton::key("e"));
        // one coordinate is not a target
        config.macro_buttons.insert(
            BREAK_POSITION.to_string(),
            MacroButton {
                x: Some(5),
                ..Default::default()
            },
        );
        let runner = quiet_runner(config, input);
        assert_eq!(
            runner.start(),
            StartOutcome::ConfigurationMissing(vec![BREAK_POSITION.to_string()])
        );
    }

    #[test]
    fn test_stop_during_hold() {
        let mut config = fast_config();
        config.macro_settings.hold_duration = 1.0;
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(config, input.clone());

        assert_eq!(runner.start(), StartOutcome::Started);
        assert!(runner.is_running());
        assert!(wait_until(|| input.events().contains(&Event::Hold(960, 540))));

        let stop_at = Instant::now();
        runner.stop();
        assert!(!runner.is_running());
        let state = runner.join().unwrap();
        assert!(stop_at.elapsed() < Duration::from_secs(5));

        assert_eq!(state.cycle_number, 1);
        assert_eq!(input.events().last(), Some(&Event::Release));
        // no sell step ran
        assert!(!input.events().contains(&Event::Key("e".to_string())));
        assert_eq!(runner.state(), RunState::Idle);
    }

    #[test]
    fn test_stop_after_release_finishes_cycle() {
        let mut config = fast_config();
        config.macro_settings.post_release_delay_ms = 2000;
        config.macro_settings.cycle_delay_ms = 60_000;
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(config, input.clone());

        assert_eq!(runner.start(), StartOutcome::Started);
        assert!(wait_until(|| input.events().contains(&Event::Release)));
        runner.stop();
        let state = runner.join().unwrap();

        // the sell sequence and the increment still happen
        assert_eq!(state.cycle_number, 2);
        assert_eq!(
            input.events(),
            [
                Event::Hold(960, 540),
                Event::Release,
                Event::Key("e".to_string()),
                Event::Click(1, 1),
                Event::Click(2, 2),
                Event::Click(3, 3),
                Event::Click(4, 4),
                Event::Key("tab".to_string()),
                // teardown
                Event::Release,
            ]
        );
        assert_eq!(runner.state(), RunState::Idle);
    }

    #[test]
    fn test_cycle_order() {
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(fast_config(), input.clone());

        assert_eq!(runner.start(), StartOutcome::Started);
        assert!(wait_until(|| input.events().len() >= 9));
        runner.stop();
        runner.join().unwrap();

        let events = input.events();
        assert_eq!(
            events[..9],
            [
                Event::Hold(960, 540),
                Event::Release,
                Event::Key("e".to_string()),
                Event::Click(1, 1),
                Event::Click(2, 2),
                Event::Click(3, 3),
                Event::Click(4, 4),
                Event::Key("tab".to_string()),
                Event::Hold(960, 540),
            ]
        );
    }

    #[test]
    fn test_skips_unconfigured_steps() {
        let mut config = fast_config();
        config.macro_buttons.remove(SELECT_ALL);
        config.macro_buttons.remove(ACCEPT);
        config.macro_settings.auto_sell = true;
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(config, input.clone());

        runner.start();
        assert!(wait_until(|| input.events().len() >= 6));
        runner.stop();
        runner.join();

        assert_eq!(
            input.events()[..6],
            [
                Event::Hold(960, 540),
                Event::Release,
                Event::Key("e".to_string()),
                Event::Click(1, 1),
                Event::Click(4, 4),
                Event::Key("tab".to_string()),
            ]
        );
    }

    #[test]
    fn test_key_only_break_position_skips_hold() {
        let mut config = fast_config();
        config
            .macro_buttons
            .insert(BREAK_POSITION.to_string(), MacroButton::key("q"));
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(config, input.clone());

        assert_eq!(runner.start(), StartOutcome::Started);
        assert!(wait_until(|| input.events().len() >= 12));
        runner.stop();
        runner.join();

        assert!(!input
            .events()
            .iter()
            .any(|e| matches!(e, Event::Hold(..))));
    }

    #[test]
    fn test_reports_on_interval_with_stats() {
        let mut config = fast_config();
        config.webhook = reporting(2, true);
        config.regions.insert(
            STATS_REGION.to_string(),
            Region {
                x: 0,
                y: 0,
                width: 100,
                height: 50,
            },
        );
        let input = Arc::new(RecordingInput::default());
        let recognizer = Arc::new(ScriptedRecognizer::returning(
            "Mythril Ore x2\nIron Ore x5\nLevel 12\n$1,500",
        ));
        let reporter = Arc::new(RecordingReporter::default());
        let runner = runner_with(config, input, recognizer.clone(), reporter.clone());

        runner.start();
        assert!(wait_until(|| reporter.payloads.lock().unwrap().len() >= 2));
        runner.stop();
        let state = runner.join().unwrap();

        let payloads = reporter.payloads.lock().unwrap().clone();
        assert_eq!(payloads[0].cycle, 2);
        assert_eq!(payloads[1].cycle, 4);

        let first = payloads[0].stats.as_ref().unwrap();
        assert_eq!(first.rare_ores.get("Mythril Ore"), Some(&2));
        assert!(!first.rare_ores.contains_key("Iron Ore"));
        assert_eq!(first.level, Some(12));
        assert_eq!(first.money, Some(1500));

        let second = payloads[1].stats.as_ref().unwrap();
        assert_eq!(second.rare_ores.get("Mythril Ore"), Some(&4));

        assert!(state.cycle_number >= 5);
        let regions = recognizer.regions.lock().unwrap();
        assert_eq!(regions[0].map(|r| r.width), Some(100));
    }

    #[test]
    fn test_report_without_stats_tracking() {
        let mut config = fast_config();
        config.webhook = reporting(1, false);
        let input = Arc::new(RecordingInput::default());
        let recognizer = Arc::new(ScriptedRecognizer::returning("Mythril Ore"));
        let reporter = Arc::new(RecordingReporter::default());
        let runner = runner_with(config, input, recognizer.clone(), reporter.clone());

        runner.start();
        assert!(wait_until(|| !reporter.payloads.lock().unwrap().is_empty()));
        runner.stop();
        runner.join();

        let payloads = reporter.payloads.lock().unwrap();
        assert_eq!(payloads[0].cycle, 1);
        assert!(payloads[0].stats.is_none());
        assert!(recognizer.regions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stats_scan_failure_still_reports() {
        let mut config = fast_config();
        config.webhook = reporting(1, true);
        let input = Arc::new(RecordingInput::default());
        let reporter = Arc::new(RecordingReporter::default());
        let runner = runner_with(
            config,
            input,
            Arc::new(ScriptedRecognizer::failing()),
            reporter.clone(),
        );

        runner.start();
        assert!(wait_until(|| !reporter.payloads.lock().unwrap().is_empty()));
        runner.stop();
        runner.join();

        let payloads = reporter.payloads.lock().unwrap();
        let stats = payloads[0].stats.as_ref().unwrap();
        assert!(stats.rare_ores.is_empty());
        assert_eq!(stats.level, None);
    }

    #[test]
    fn test_reporter_failure_is_tolerated() {
        let mut config = fast_config();
        config.webhook = reporting(1, false);
        let input = Arc::new(RecordingInput::default());
        let reporter = Arc::new(FailingReporter::default());
        let runner = runner_with(
            config,
            input,
            Arc::new(ScriptedRecognizer::failing()),
            reporter.clone(),
        );

        runner.start();
        assert!(wait_until(|| reporter.calls.load(Ordering::SeqCst) >= 3));
        assert!(runner.is_running());
        runner.stop();
        let state = runner.join().unwrap();
        assert!(state.cycle_number >= 4);
    }

    #[test]
    fn test_disabled_reporting_never_delivers() {
        let input = Arc::new(RecordingInput::default());
        let reporter = Arc::new(RecordingReporter::default());
        let runner = runner_with(
            fast_config(),
            input.clone(),
            Arc::new(ScriptedRecognizer::failing()),
            reporter.clone(),
        );

        runner.start();
        assert!(wait_until(|| input.events().len() >= 40));
        runner.stop();
        runner.join();
        assert!(reporter.payloads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_double_start_and_stop() {
        let mut config = fast_config();
        config.macro_settings.hold_duration = 1.0;
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(config, input.clone());

        // stop while idle does nothing
        runner.stop();
        assert_eq!(runner.state(), RunState::Idle);

        assert_eq!(runner.start(), StartOutcome::Started);
        assert_eq!(runner.start(), StartOutcome::AlreadyRunning);
        runner.stop();
        runner.stop();
        runner.join().unwrap();
        assert_eq!(runner.state(), RunState::Idle);

        // a second run starts from cycle 1 again
        assert_eq!(runner.start(), StartOutcome::Started);
        assert!(wait_until(|| {
            input
                .events()
                .iter()
                .filter(|e| matches!(e, Event::Hold(..)))
                .count()
                == 2
        }));
        runner.stop();
        assert_eq!(runner.join().unwrap().cycle_number, 1);
    }

    #[test]
    fn test_stop_waits_for_control_lock() {
        let mut config = fast_config();
        config.macro_settings.hold_duration = 1.0;
        let input = Arc::new(RecordingInput::default());
        let runner = quiet_runner(config, input);

        assert_eq!(runner.start(), StartOutcome::Started);
        thread::scope(|s| {
            let control = runner.control.lock().unwrap();
            let stopper = s.spawn(|| runner.stop());

            // a stop that cannot take the lock must not change the state yet
            thread::sleep(Duration::from_millis(50));
            assert!(runner.is_running());
            assert!(!control.token.is_cancelled());

            drop(control);
            stopper.join().unwrap();
        });
        assert!(!runner.is_running());
        runner.join().unwrap();

        // a late stop while idle leaves the next run alone
        runner.stop();
        assert_eq!(runner.start(), StartOutcome::Started);
        thread::sleep(Duration::from_millis(20));
        assert!(runner.is_running());
        assert!(!runner.control.lock().unwrap().token.is_cancelled());
        runner.stop();
        runner.join().unwrap();
    }

    #[test]
    fn test_panic_still_releases() {
        let mut config = fast_config();
        config.webhook = reporting(1, false);
        let input = Arc::new(RecordingInput::default());
        let runner = runner_with(
            config,
            input.clone(),
            Arc::new(ScriptedRecognizer::failing()),
            Arc::new(PanickingReporter),
        );

        assert_eq!(runner.start(), StartOutcome::Started);
        assert!(wait_until(|| runner.state() == RunState::Idle));
        assert!(runner.join().is_none());
        assert_eq!(input.events().last(), Some(&Event::Release));
    }
}
