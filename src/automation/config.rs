//! Configuration types for the forge macro.
//!
//! Loads settings.json from the app directory at startup. Provides screen
//! regions, macro button targets, timing, reporting and detection settings.
//! The file is only read here; saving belongs to the front end.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::automation::detection::DetectionThresholds;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Button role: where the pickaxe is held down.
pub const BREAK_POSITION: &str = "break_position";
/// Button role: opens the inventory (usually a key such as "e").
pub const INVENTORY: &str = "inventory";
pub const SELL_TAB: &str = "sell_tab";
pub const SELECT_ALL: &str = "select_all";
pub const ACCEPT: &str = "accept";
pub const YES_CONFIRM: &str = "yes_confirm";
pub const CLOSE_MENU: &str = "close_menu";

/// Region name: the forge ore panel read by the scan monitor.
pub const ORES_PANEL: &str = "ores_panel";
/// Region name: the area read for report stats. Whole frame if absent.
pub const STATS_REGION: &str = "stats";

/// A screen rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A resolved macro target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionTarget {
    Point { x: i32, y: i32 },
    Key(String),
}

/// A macro button as stored in settings.json.
///
/// A key takes precedence over coordinates; a button with neither (or with
/// only one coordinate) counts as unconfigured.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroButton {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl MacroButton {
    pub fn point(x: i32, y: i32) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            key: None,
        }
    }

    pub fn key(key: &str) -> Self {
        Self {
            x: None,
            y: None,
            key: Some(key.to_string()),
        }
    }

    /// Coordinates, if both are set.
    pub fn coords(&self) -> Option<(i32, i32)> {
        Some((self.x?, self.y?))
    }

    pub fn target(&self) -> Option<ActionTarget> {
        if let Some(key) = self.key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Some(ActionTarget::Key(key.to_string()));
        }
        self.coords().map(|(x, y)| ActionTarget::Point { x, y })
    }
}

/// Timing and behavior of the macro cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroSettings {
    /// How long to hold at the break position (minutes)
    pub hold_duration: f64,
    /// Run the sell sequence after each hold
    pub auto_sell: bool,
    /// Pause after releasing the hold (milliseconds)
    pub post_release_delay_ms: u64,
    /// Pause after opening and closing the inventory (milliseconds)
    pub menu_delay_ms: u64,
    /// Pause after each menu click (milliseconds)
    pub step_delay_ms: u64,
    /// Pause between cycles (milliseconds)
    pub cycle_delay_ms: u64,
}

impl Default for MacroSettings {
    fn default() -> Self {
        Self {
            hold_duration: 5.0,
            auto_sell: true,
            post_release_delay_ms: 500,
            menu_delay_ms: 500,
            step_delay_ms: 300,
            cycle_delay_ms: 500,
        }
    }
}

impl MacroSettings {
    pub fn hold(&self) -> Duration {
        Duration::try_from_secs_f64(self.hold_duration * 60.0).unwrap_or(Duration::ZERO)
    }
}

/// Where progress reports go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ReportMode {
    /// POST straight to a Discord webhook URL
    #[serde(rename = "webhook", alias = "direct")]
    Direct,
    /// POST to a relay bot that DMs the recipient
    #[default]
    #[serde(rename = "bot", alias = "relay")]
    Relay,
}

impl<'de> Deserialize<'de> for ReportMode {
    /// Accepts either spelling in any case. Unknown or null values fall back
    /// to the default so one bad field does not discard the whole file.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("webhook" | "direct") => ReportMode::Direct,
            Some("bot" | "relay") | None => ReportMode::Relay,
            Some(other) => {
                crate::log(&format!("Unknown webhook.mode {:?}, using bot", other));
                ReportMode::Relay
            }
        })
    }
}

/// Progress report settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub mode: ReportMode,
    /// Recipient for relay mode
    pub discord_id: String,
    /// Endpoint for direct mode
    pub webhook_url: String,
    /// Relay bot endpoint
    pub relay_url: String,
    /// Report every N cycles
    pub cycle_interval: u32,
    /// Scan and include ore/level/money stats
    pub track_stats: bool,
    /// Attach a screenshot from the frame source
    pub send_screenshot: bool,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ReportMode::Relay,
            discord_id: String::new(),
            webhook_url: String::new(),
            relay_url: String::new(),
            cycle_interval: 5,
            track_stats: false,
            send_screenshot: false,
        }
    }
}

impl WebhookSettings {
    /// The destination the current mode delivers to.
    pub fn destination(&self) -> &str {
        match self.mode {
            ReportMode::Direct => &self.webhook_url,
            ReportMode::Relay => &self.discord_id,
        }
    }
}

/// Scan loop and OCR preferences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Seconds between forge panel scans
    pub scan_interval: f64,
    /// Tesseract page segmentation mode
    pub ocr_psm: u8,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            scan_interval: 2.0,
            ocr_psm: 3,
        }
    }
}

impl Preferences {
    pub fn scan_period(&self) -> Duration {
        Duration::try_from_secs_f64(self.scan_interval).unwrap_or(Duration::from_secs(2))
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(deserialize_with = "skip_null_entries")]
    pub regions: BTreeMap<String, Region>,
    #[serde(deserialize_with = "skip_null_entries")]
    pub macro_buttons: BTreeMap<String, MacroButton>,
    pub macro_settings: MacroSettings,
    pub webhook: WebhookSettings,
    pub preferences: Preferences,
    pub detection: DetectionThresholds,
    /// Screenshot file kept fresh by an external capture tool
    pub capture_path: Option<PathBuf>,
}

/// Reads a map whose cleared entries are written as `null`, dropping them.
fn skip_null_entries<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let entries = Option::<BTreeMap<String, Option<T>>>::deserialize(deserializer)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect())
}

impl AppConfig {
    /// Resolves a button role to a target, if configured.
    pub fn target(&self, role: &str) -> Option<ActionTarget> {
        self.macro_buttons.get(role).and_then(MacroButton::target)
    }

    pub fn button(&self, role: &str) -> Option<&MacroButton> {
        self.macro_buttons.get(role)
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    /// Parses settings JSON and normalizes out-of-range values.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        let mut config: AppConfig = serde_json::from_str(contents)?;
        config.normalize();
        Ok(config)
    }

    fn normalize(&mut self) {
        if self.webhook.cycle_interval == 0 {
            crate::log("webhook.cycle_interval is 0, using 1");
            self.webhook.cycle_interval = 1;
        }
        if !self.macro_settings.hold_duration.is_finite() || self.macro_settings.hold_duration < 0.0
        {
            crate::log("macro_settings.hold_duration is invalid, using 5 minutes");
            self.macro_settings.hold_duration = MacroSettings::default().hold_duration;
        }
        if !self.preferences.scan_interval.is_finite() || self.preferences.scan_interval <= 0.0 {
            crate::log("preferences.scan_interval is invalid, using 2 seconds");
            self.preferences.scan_interval = Preferences::default().scan_interval;
        }
    }
}

/// Loads configuration from a file, falling back to defaults.
pub fn load_config_from(path: &Path) -> AppConfig {
    crate::log(&format!("Looking for settings at: {}", path.display()));

    if !path.exists() {
        crate::log("settings.json not found. Using default config.");
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match AppConfig::from_json(&contents) {
            Ok(config) => {
                crate::log("Config loaded from settings.json");
                config
            }
            Err(e) => {
                crate::log(&format!(
                    "Failed to parse settings.json: {}. Using defaults.",
                    e
                ));
                AppConfig::default()
            }
        },
        Err(e) => {
            crate::log(&format!(
                "Failed to read settings.json: {}. Using defaults.",
                e
            ));
            AppConfig::default()
        }
    }
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config() {
    let _ = CONFIG.set(load_config_from(&crate::paths::get_settings_path()));
}

/// Returns a reference to the global configuration.
/// Panics if called before init_config().
pub fn get_config() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}
