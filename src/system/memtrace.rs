// src/system/memtrace.rs

use crate::constants::MEMORY_TRACE_FLAG;
use std::sync::OnceLock;

/// Set at most once per process, by the first run that asks for it.
static ENABLED: OnceLock<()> = OnceLock::new();

/// Page size assumed when converting `statm` pages to bytes.
const PAGE_SIZE: u64 = 4096;

/// Turns memory tracing on for the rest of the process. Returns `false` when
/// it was already on.
pub fn enable() -> bool {
    let first = ENABLED.set(()).is_ok();
    if first {
        log::info!("Memory tracing enabled.");
    }
    first
}

pub fn is_enabled() -> bool {
    ENABLED.get().is_some()
}

/// Removes every `=m` from `args`. Returns whether one was found.
pub fn strip_flag(args: &mut Vec<String>) -> bool {
    let before = args.len();
    args.retain(|arg| arg != MEMORY_TRACE_FLAG);
    args.len() != before
}

/// Resident set size of this process, from `/proc/self/statm`.
/// `None` where procfs is not available.
pub fn resident_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages.saturating_mul(PAGE_SIZE))
}

/// Logs resident memory at creation and at drop, while tracing is enabled.
#[derive(Debug)]
pub struct MemoryProbe {
    label: String,
    before: Option<u64>,
}

impl MemoryProbe {
    /// Starts a probe, or returns `None` when tracing is off.
    pub fn start(label: impl Into<String>) -> Option<Self> {
        if !is_enabled() {
            return None;
        }
        let probe = Self {
            label: label.into(),
            before: resident_bytes(),
        };
        if let Some(bytes) = probe.before {
            log::info!("memory [{}] start: {} KiB", probe.label, bytes / 1024);
        }
        Some(probe)
    }
}

impl Drop for MemoryProbe {
    fn drop(&mut self) {
        let Some(after) = resident_bytes() else {
            return;
        };
        let before = self.before.unwrap_or(after);
        let delta = i128::from(after) - i128::from(before);
        log::info!(
            "memory [{}] end: {} KiB ({:+} KiB)",
            self.label,
            after / 1024,
            delta / 1024
        );
    }
}
