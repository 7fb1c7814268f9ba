//! Progress reporting.
//!
//! The macro decides *when* to report with [`should_report`] and hands a
//! [`ReportPayload`] to a [`Reporter`]. The HTTP delivery lives in
//! [`webhook`].

pub mod webhook;

use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::automation::config::WebhookSettings;

pub use webhook::WebhookReporter;

/// Stats attached to a progress report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Legendary/mythical ores counted since the macro started
    pub rare_ores: BTreeMap<String, u32>,
    /// Level from the latest stats scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Money from the latest stats scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub money: Option<u64>,
}

/// One progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    pub cycle: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSnapshot>,
}

/// Delivers progress reports somewhere.
pub trait Reporter: Send + Sync {
    fn deliver(&self, payload: &ReportPayload) -> Result<()>;
}

/// Decides whether a report is due on this cycle.
///
/// Cycles are 1-based; with an interval of 5 reports go out on cycles
/// 5, 10, 15 and so on. Reporting is off when disabled or when the current
/// mode has no destination.
pub fn should_report(cycle: u32, settings: &WebhookSettings) -> bool {
    if !settings.enabled {
        return false;
    }
    if settings.destination().trim().is_empty() {
        return false;
    }
    let interval = settings.cycle_interval.max(1);
    cycle > 0 && cycle % interval == 0
}
