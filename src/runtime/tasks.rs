//! Task registry and route labels.
//!
//! Tasks that opt in (request handlers via the tracking middleware, tasks
//! started with [`TaskRegistry::spawn_labeled`]) get an entry recording their
//! route label and current wait state. [`TaskRegistry::dump`] renders every
//! entry as a text block:
//!
//! ```text
//! task 7 [semacquire, 12 seconds]:
//! labels: route=/api/contend
//! ```

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

tokio::task_local! {
    static CURRENT_TASK: TaskHandle;
}

/// Wait state of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Sleep,
    /// Waiting to acquire a lock or semaphore permit.
    Semacquire,
    IoWait,
    Syscall,
    ChanReceive,
    ChanSend,
    Select,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Running => "running",
            TaskState::Sleep => "sleep",
            TaskState::Semacquire => "semacquire",
            TaskState::IoWait => "IO wait",
            TaskState::Syscall => "syscall",
            TaskState::ChanReceive => "chan receive",
            TaskState::ChanSend => "chan send",
            TaskState::Select => "select",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct TaskEntry {
    label: Option<Arc<str>>,
    state: TaskState,
    since: Instant,
}

/// Registry of tracked tasks.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, TaskEntry>>,
}

/// Handle to the registry entry of the task it is scoped to.
#[derive(Debug, Clone)]
struct TaskHandle {
    id: u64,
    label: Option<Arc<str>>,
    registry: Arc<TaskRegistry>,
}

impl TaskHandle {
    fn set_state(&self, state: TaskState) {
        let mut tasks = self.registry.lock();
        if let Some(entry) = tasks.get_mut(&self.id) {
            entry.state = state;
            entry.since = Instant::now();
        }
    }
}

/// Removes the registry entry when the tracked task finishes or is dropped.
struct TaskGuard {
    handle: TaskHandle,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.handle.registry.lock().remove(&self.handle.id);
    }
}

/// Resets the task to running when a wait completes or is abandoned.
struct WaitGuard {
    handle: Option<TaskHandle>,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.set_state(TaskState::Running);
        }
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(self: &Arc<Self>, label: Option<Arc<str>>) -> TaskGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().insert(
            id,
            TaskEntry {
                label: label.clone(),
                state: TaskState::Running,
                since: Instant::now(),
            },
        );
        TaskGuard {
            handle: TaskHandle {
                id,
                label,
                registry: self.clone(),
            },
        }
    }

    /// Run `fut` as a tracked task carrying `label`.
    pub async fn scope<F>(self: &Arc<Self>, label: Option<Arc<str>>, fut: F) -> F::Output
    where
        F: Future,
    {
        let guard = self.register(label);
        CURRENT_TASK.scope(guard.handle.clone(), fut).await
    }

    /// Spawn a tracked task that inherits the route label of the caller.
    pub fn spawn_labeled<F>(self: &Arc<Self>, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.register(current_route());
        tokio::spawn(async move {
            let handle = guard.handle.clone();
            let out = CURRENT_TASK.scope(handle, fut).await;
            drop(guard);
            out
        })
    }

    /// Number of tracked tasks.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the state of every tracked task, ordered by task id.
    pub fn dump(&self) -> String {
        let now = Instant::now();
        let tasks = self.lock();
        let mut ids: Vec<_> = tasks.keys().copied().collect();
        ids.sort_unstable();

        let mut out = String::with_capacity(ids.len() * 48);
        for id in ids {
            let entry = &tasks[&id];
            let waited = now.saturating_duration_since(entry.since);
            match elapsed_phrase(entry.state, waited) {
                Some(phrase) => {
                    let _ = writeln!(out, "task {} [{}, {}]:", id, entry.state, phrase);
                }
                None => {
                    let _ = writeln!(out, "task {} [{}]:", id, entry.state);
                }
            }
            if let Some(label) = &entry.label {
                let _ = writeln!(out, "labels: route={}", label);
            }
            out.push('\n');
        }
        out
    }
}

fn elapsed_phrase(state: TaskState, waited: Duration) -> Option<String> {
    if state == TaskState::Running {
        return None;
    }
    match waited.as_secs() {
        0 => None,
        1 => Some("1 second".to_string()),
        s if s < 60 => Some(format!("{} seconds", s)),
        s if s < 120 => Some("1 minute".to_string()),
        s => Some(format!("{} minutes", s / 60)),
    }
}

/// Route label of the tracked task this is called from.
pub fn current_route() -> Option<Arc<str>> {
    CURRENT_TASK.try_with(|h| h.label.clone()).ok().flatten()
}

/// Await `fut` with the current task marked as waiting in `state`.
///
/// Outside a tracked task this is a plain `.await`.
pub async fn wait_on<F: Future>(state: TaskState, fut: F) -> F::Output {
    let handle = CURRENT_TASK.try_with(|h| h.clone()).ok();
    if let Some(h) = &handle {
        h.set_state(state);
    }
    let _guard = WaitGuard { handle };
    fut.await
}
