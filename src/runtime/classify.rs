//! Block classification over task dumps.
//!
//! Best-effort heuristic: the dump is free-form diagnostic text, so anything
//! that does not match the expected shapes is skipped rather than reported.
//!
//! Per task block:
//! - lock wait: state mentions `semacquire`
//! - io wait: state mentions `io wait` or `syscall`
//! - long blocked: waited ≥ 10s in a lock, channel, select or io state

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Minimum wait before a task counts as long blocked.
pub const LONG_BLOCK_SECS: u64 = 10;

const LOCK_MARKERS: &[&str] = &["semacquire"];
const IO_MARKERS: &[&str] = &["io wait", "syscall"];
const LONG_BLOCK_MARKERS: &[&str] = &[
    "semacquire",
    "chan receive",
    "chan send",
    "select",
    "io wait",
    "syscall",
];

struct Patterns {
    header: Regex,
    elapsed: Regex,
    labels: Regex,
    route: Regex,
}

static PATTERNS: LazyLock<Patterns> = LazyLock::new(|| Patterns {
    header: Regex::new(r"task\s+\d+\s+\[(.*?)\]:").expect("valid header pattern"),
    elapsed: Regex::new(r"(\d+)\s*(minutes|minute|seconds|second)").expect("valid elapsed pattern"),
    labels: Regex::new(r"labels:\s+(.*)").expect("valid labels pattern"),
    route: Regex::new(r"route=([^,\s]+)").expect("valid route pattern"),
});

/// Blocking tallies for a set of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockCounts {
    pub lock: usize,
    pub io: usize,
    pub long_blocked: usize,
}

impl BlockCounts {
    fn add(&mut self, other: BlockCounts) {
        self.lock += other.lock;
        self.io += other.io;
        self.long_blocked += other.long_blocked;
    }
}

fn contains_any(state: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| state.contains(m))
}

/// Elapsed wait in seconds, if the state carries a parseable duration.
fn elapsed_secs(state: &str) -> Option<u64> {
    let caps = PATTERNS.elapsed.captures(state)?;
    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    if caps.get(2)?.as_str().starts_with("minute") {
        value.checked_mul(60)
    } else {
        Some(value)
    }
}

/// Classify one task from its bracketed state text.
fn classify_state(raw_state: &str) -> BlockCounts {
    let state = raw_state.to_lowercase();
    let long = elapsed_secs(&state).is_some_and(|secs| secs >= LONG_BLOCK_SECS)
        && contains_any(&state, LONG_BLOCK_MARKERS);
    BlockCounts {
        lock: contains_any(&state, LOCK_MARKERS) as usize,
        io: contains_any(&state, IO_MARKERS) as usize,
        long_blocked: long as usize,
    }
}

/// A task block: its state text plus the body lines up to the next header.
struct TaskBlock<'a> {
    state: &'a str,
    body: Vec<&'a str>,
}

impl<'a> TaskBlock<'a> {
    fn route(&self) -> Option<&'a str> {
        self.body.iter().find_map(|line| {
            let labels = PATTERNS.labels.captures(line)?.get(1)?.as_str();
            Some(PATTERNS.route.captures(labels)?.get(1)?.as_str())
        })
    }
}

fn blocks(dump: &str) -> Vec<TaskBlock<'_>> {
    let mut out: Vec<TaskBlock<'_>> = Vec::new();
    for line in dump.lines() {
        if let Some(state) = PATTERNS.header.captures(line).and_then(|c| c.get(1)) {
            out.push(TaskBlock {
                state: state.as_str(),
                body: Vec::new(),
            });
        } else if let Some(current) = out.last_mut() {
            current.body.push(line);
        }
    }
    out
}

/// Classify every task in `dump`.
pub fn classify(dump: &str) -> BlockCounts {
    let mut total = BlockCounts::default();
    for block in blocks(dump) {
        total.add(classify_state(block.state));
    }
    total
}

/// Classify tasks per route label.
///
/// Tasks without a resolvable `route=` label are left out entirely.
pub fn classify_by_route(dump: &str) -> HashMap<String, BlockCounts> {
    let mut by_route: HashMap<String, BlockCounts> = HashMap::new();
    for block in blocks(dump) {
        let Some(route) = block.route() else {
            continue;
        };
        by_route
            .entry(route.to_string())
            .or_default()
            .add(classify_state(block.state));
    }
    by_route
}
