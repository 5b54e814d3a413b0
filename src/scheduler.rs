//! Periodic re-injection of hot-reloaded targets.
//!
//! All registrations share one worker thread, spawned on first use and fed
//! over a channel. Tasks run at a fixed rate in deadline order. Each task
//! only holds a weak reference to its target: once the target is dropped
//! the task ends and its identity becomes free again.

use crate::error::InjectionError;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const WORKER_THREAD_NAME: &str = "props-hot-reload";

const MIN_PERIOD: Duration = Duration::from_millis(1);
/// Longer periods are clamped so deadlines stay within the clock's range.
pub const MAX_PERIOD: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// One refresh pass. Receives the pass start, returns `Ok(false)` once the
/// target no longer exists.
pub type RefreshTask = Box<dyn FnMut(Instant) -> Result<bool, InjectionError> + Send>;

type Liveness = Weak<dyn Any + Send + Sync>;

struct Registration {
    task_id: u64,
    cancelled: Arc<AtomicBool>,
    target: Liveness,
    period: Duration,
}

type Registrations = Arc<Mutex<HashMap<usize, Registration>>>;

struct ScheduledTask {
    id: u64,
    identity: usize,
    period: Duration,
    cancelled: Arc<AtomicBool>,
    run: RefreshTask,
}

enum Command {
    Register(ScheduledTask, Instant),
    Cancel(u64),
    Shutdown,
}

struct Worker {
    tx: mpsc::Sender<Command>,
    thread: JoinHandle<()>,
}

/// Cancellation handle for one registration.
#[derive(Clone)]
pub struct RefreshHandle {
    identity: usize,
    task_id: u64,
    period: Duration,
    cancelled: Arc<AtomicBool>,
    registrations: Weak<Mutex<HashMap<usize, Registration>>>,
    tx: Option<mpsc::Sender<Command>>,
}

impl RefreshHandle {
    /// Stop refreshing. The target keeps its current values.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registrations) = self.registrations.upgrade() {
            let mut registrations = registrations.lock();
            if registrations
                .get(&self.identity)
                .is_some_and(|r| r.task_id == self.task_id)
            {
                registrations.remove(&self.identity);
            }
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(Command::Cancel(self.task_id));
        }
        debug!(identity = self.identity, "Hot reload cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("identity", &self.identity)
            .field("period", &self.period)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct HotReloadScheduler {
    worker: Mutex<Option<Worker>>,
    registrations: Registrations,
    next_id: AtomicU64,
}

impl HotReloadScheduler {
    pub fn new() -> Self {
        Self {
            worker: Mutex::new(None),
            registrations: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Schedule `task` every `period` for the target behind `identity`.
    ///
    /// Registering an identity that already has a live registration returns
    /// a handle to that registration and drops `task`.
    pub fn register(
        &self,
        identity: usize,
        target: Liveness,
        period: Duration,
        task: RefreshTask,
    ) -> RefreshHandle {
        if period > MAX_PERIOD {
            warn!(identity, requested = ?period, "Hot reload period too long, clamping");
        }
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        let mut worker = self.worker.lock();
        let mut registrations = self.registrations.lock();

        if let Some(existing) = registrations.get(&identity) {
            let live = existing.target.strong_count() > 0
                && !existing.cancelled.load(Ordering::SeqCst);
            if live {
                debug!(identity, "Target already scheduled for hot reload");
                return RefreshHandle {
                    identity,
                    task_id: existing.task_id,
                    period: existing.period,
                    cancelled: Arc::clone(&existing.cancelled),
                    registrations: Arc::downgrade(&self.registrations),
                    tx: worker.as_ref().map(|w| w.tx.clone()),
                };
            }
        }

        let task_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = RefreshHandle {
            identity,
            task_id,
            period,
            cancelled: Arc::clone(&cancelled),
            registrations: Arc::downgrade(&self.registrations),
            tx: None,
        };

        if worker.is_none() {
            match Self::spawn_worker(Arc::clone(&self.registrations)) {
                Ok(spawned) => *worker = Some(spawned),
                Err(e) => {
                    error!(error = %e, "Unable to start hot reload worker");
                    cancelled.store(true, Ordering::SeqCst);
                    return handle;
                }
            }
        }
        let Some(worker) = worker.as_ref() else {
            return handle;
        };
        let Some(first) = Instant::now().checked_add(period) else {
            error!(identity, "Hot reload deadline out of range");
            cancelled.store(true, Ordering::SeqCst);
            return handle;
        };

        registrations.insert(
            identity,
            Registration {
                task_id,
                cancelled: Arc::clone(&cancelled),
                target,
                period,
            },
        );
        let scheduled = ScheduledTask {
            id: task_id,
            identity,
            period,
            cancelled,
            run: task,
        };
        if worker
            .tx
            .send(Command::Register(scheduled, first))
            .is_err()
        {
            error!(identity, "Hot reload worker is gone");
            registrations.remove(&identity);
            handle.cancelled.store(true, Ordering::SeqCst);
            return handle;
        }
        info!(identity, period_ms = period.as_millis() as u64, "Scheduled hot reload");

        RefreshHandle {
            tx: Some(worker.tx.clone()),
            ..handle
        }
    }

    pub fn is_registered(&self, identity: usize) -> bool {
        self.registrations.lock().get(&identity).is_some_and(|r| {
            r.target.strong_count() > 0 && !r.cancelled.load(Ordering::SeqCst)
        })
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.registrations
            .lock()
            .values()
            .filter(|r| r.target.strong_count() > 0 && !r.cancelled.load(Ordering::SeqCst))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the worker and drop every registration.
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        for registration in self.registrations.lock().drain().map(|(_, r)| r) {
            registration.cancelled.store(true, Ordering::SeqCst);
        }
        let _ = worker.tx.send(Command::Shutdown);
        // A refresh pass may drop the last owner of the scheduler.
        if worker.thread.thread().id() != thread::current().id() {
            if worker.thread.join().is_err() {
                error!("Hot reload worker panicked");
            }
        }
        debug!("Hot reload worker stopped");
    }

    fn spawn_worker(registrations: Registrations) -> std::io::Result<Worker> {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(rx, registrations))?;
        debug!("Started hot reload worker");
        Ok(Worker { tx, thread })
    }
}

impl Default for HotReloadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HotReloadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Worker loop: wait for the earliest deadline or a command, then run every
/// task that is due.
fn run_worker(rx: mpsc::Receiver<Command>, registrations: Registrations) {
    let mut queue: BTreeMap<(Instant, u64), ScheduledTask> = BTreeMap::new();

    loop {
        let command = match queue.keys().next() {
            Some(&(deadline, _)) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match rx.recv() {
                Ok(command) => Some(command),
                Err(_) => return,
            },
        };

        match command {
            Some(Command::Register(task, deadline)) => {
                queue.insert((deadline, task.id), task);
            }
            Some(Command::Cancel(id)) => queue.retain(|_, task| task.id != id),
            Some(Command::Shutdown) => return,
            None => {}
        }

        let now = Instant::now();
        while let Some(entry) = queue.first_entry() {
            let (deadline, _) = *entry.key();
            if deadline > now {
                break;
            }
            let mut task = entry.remove();
            if task.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            if !run_task(&mut task) {
                unregister(&registrations, &task);
                debug!(identity = task.identity, "Hot reload target dropped");
                continue;
            }
            match next_deadline(deadline, task.period, now) {
                Some(next) => {
                    queue.insert((next, task.id), task);
                }
                None => {
                    task.cancelled.store(true, Ordering::SeqCst);
                    unregister(&registrations, &task);
                    warn!(identity = task.identity, "Next hot reload deadline out of range, stopping");
                }
            }
        }
    }
}

/// First deadline after `now`, skipping missed periods rather than
/// replaying them. `None` when it lies beyond what `Instant` can hold.
fn next_deadline(deadline: Instant, period: Duration, now: Instant) -> Option<Instant> {
    let next = deadline.checked_add(period)?;
    if next > now {
        return Some(next);
    }
    let behind = now.duration_since(deadline).as_nanos();
    let periods = u32::try_from(behind / period.as_nanos().max(1) + 1).ok()?;
    deadline.checked_add(period.checked_mul(periods)?)
}

fn unregister(registrations: &Registrations, task: &ScheduledTask) {
    let mut registrations = registrations.lock();
    if registrations
        .get(&task.identity)
        .is_some_and(|r| r.task_id == task.id)
    {
        registrations.remove(&task.identity);
    }
}

/// Run one pass. Failures are reported and keep the task scheduled.
fn run_task(task: &mut ScheduledTask) -> bool {
    let started = Instant::now();
    debug!(identity = task.identity, "Running hot reload");
    match catch_unwind(AssertUnwindSafe(|| (task.run)(started))) {
        Ok(Ok(alive)) => alive,
        Ok(Err(e)) => {
            error!(identity = task.identity, error = %e, "Hot reload failed");
            true
        }
        Err(_) => {
            error!(identity = task.identity, "Hot reload panicked");
            true
        }
    }
}
