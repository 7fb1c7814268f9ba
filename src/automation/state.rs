//! Shared run state for the macro and the scan monitor.
//!
//! Control calls on the host thread and the worker thread share only an
//! atomic state byte and a [`CancelToken`]. Everything else the worker
//! needs lives on its own stack.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::ocr::extract::ScanStats;

/// Lifecycle of a background run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// Cancellation requested; the worker has not finished yet
    Stopping,
}

impl RunState {
    fn to_u8(self) -> u8 {
        match self {
            RunState::Idle => 0,
            RunState::Running => 1,
            RunState::Stopping => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Running,
            2 => RunState::Stopping,
            _ => RunState::Idle,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Running => write!(f, "Running"),
            RunState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Lock-free cell holding a [`RunState`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(RunState::Idle.to_u8()))
    }

    pub fn get(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: RunState) {
        self.0.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Moves `from` → `to` atomically. Returns false if the state was not `from`.
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        self.0
            .compare_exchange(from.to_u8(), to.to_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Sticky cancellation signal that sleeping workers can wait on.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation and wakes every waiter. Further calls do nothing.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = lock.lock().unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleeps up to `timeout`, waking early on cancellation.
    ///
    /// Returns true if the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }
}

/// Progress of one macro run, owned by the worker thread.
#[derive(Debug, Clone)]
pub struct CycleState {
    /// The cycle currently executing (1-based)
    pub cycle_number: u32,
    /// Legendary/mythical ores counted across report scans
    pub cumulative_stats: BTreeMap<String, u32>,
    pub started_at: Instant,
}

impl CycleState {
    pub fn new() -> Self {
        Self {
            cycle_number: 1,
            cumulative_stats: BTreeMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Adds a scan's tracked ore counts to the running totals.
    pub fn merge(&mut self, stats: &ScanStats) {
        for (name, count) in &stats.rare_ores {
            let total = self.cumulative_stats.entry(name.clone()).or_insert(0);
            *total = total.saturating_add(*count);
        }
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}
