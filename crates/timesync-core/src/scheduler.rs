//! A single worker thread running one-shot tasks at monotonic deadlines
//! plus an optional periodic job.

use crate::error::{Result, SyncError};
use parking_lot::{Mutex, RwLock};
use std::{
    cmp::Ordering as CmpOrdering,
    collections::BinaryHeap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error, trace};

/// A one-shot task.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A job run repeatedly until shutdown.
pub type PeriodicJob = Box<dyn FnMut() + Send + 'static>;

enum Command {
    Schedule { deadline: Instant, task: Task },
    Shutdown,
}

/// Entry in the deadline heap.
struct Scheduled {
    deadline: Instant,
    sequence: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reverse ordering for min-heap behavior, FIFO on equal deadlines
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct Periodic {
    interval: Duration,
    next_run: Instant,
    job: PeriodicJob,
}

/// Runs delayed tasks on a dedicated thread.
///
/// [`Scheduler::shutdown`] stops accepting tasks, runs every task that
/// is still pending right away and joins the worker. Dropping the
/// scheduler shuts it down.
pub struct Scheduler {
    tx: flume::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Held for reading while a task is sent and for writing while the
    /// shutdown command is sent, so every accepted task is queued ahead
    /// of the shutdown command.
    stopped: RwLock<bool>,
    pending: Arc<AtomicUsize>,
}

impl Scheduler {
    pub fn new(name: &str) -> Result<Self> {
        Self::spawn(name, None)
    }

    /// Creates a scheduler that additionally runs `job` every
    /// `interval`, first after one interval has passed.
    pub fn with_periodic(name: &str, interval: Duration, job: PeriodicJob) -> Result<Self> {
        let periodic = Periodic {
            interval,
            next_run: Instant::now() + interval,
            job,
        };
        Self::spawn(name, Some(periodic))
    }

    fn spawn(name: &str, periodic: Option<Periodic>) -> Result<Self> {
        let (tx, rx) = flume::unbounded();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = {
            let pending = pending.clone();
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || run_worker(rx, periodic, pending))
                .map_err(|err| SyncError::SchedulerSpawn(err.to_string()))?
        };
        debug!(name, "scheduler worker started");

        Ok(Self {
            tx,
            worker: Mutex::new(Some(worker)),
            stopped: RwLock::new(false),
            pending,
        })
    }

    /// Schedules `task` to run once `deadline` has passed.
    pub fn schedule_at(&self, deadline: Instant, task: Task) -> Result<()> {
        let stopped = self.stopped.read();
        if *stopped {
            return Err(SyncError::SchedulerStopped);
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx
            .send(Command::Schedule { deadline, task })
            .map_err(|_| {
                self.pending.fetch_sub(1, Ordering::AcqRel);
                SyncError::SchedulerStopped
            })
    }

    /// Schedules `task` to run after `delay`. Fails with
    /// [`SyncError::DeadlineOutOfRange`] if the deadline cannot be
    /// represented.
    pub fn schedule_after(&self, delay: Duration, task: Task) -> Result<()> {
        let deadline = Instant::now()
            .checked_add(delay)
            .ok_or(SyncError::DeadlineOutOfRange { delay })?;
        self.schedule_at(deadline, task)
    }

    /// Number of tasks scheduled but not yet run.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.read()
    }

    /// Stops the worker after running all pending tasks. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut stopped = self.stopped.write();
            if *stopped {
                return;
            }
            *stopped = true;
            let _ = self.tx.send(Command::Shutdown);
        }

        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        // A task that shuts down its own scheduler cannot wait for itself.
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            error!("scheduler worker panicked");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(rx: flume::Receiver<Command>, mut periodic: Option<Periodic>, pending: Arc<AtomicUsize>) {
    let mut heap = BinaryHeap::new();
    let mut sequence = 0u64;

    let run = |entry: Scheduled| {
        (entry.task)();
        pending.fetch_sub(1, Ordering::AcqRel);
    };

    loop {
        let next_task = heap.peek().map(|entry: &Scheduled| entry.deadline);
        let next_periodic = periodic.as_ref().map(|periodic| periodic.next_run);
        let wake_up = match (next_task, next_periodic) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let command = match wake_up {
            Some(deadline) => match rx.recv_deadline(deadline) {
                Ok(command) => Some(command),
                Err(flume::RecvTimeoutError::Timeout) => None,
                Err(flume::RecvTimeoutError::Disconnected) => Some(Command::Shutdown),
            },
            None => Some(rx.recv().unwrap_or(Command::Shutdown)),
        };

        match command {
            Some(Command::Schedule { deadline, task }) => {
                trace!(sequence, "task scheduled");
                heap.push(Scheduled {
                    deadline,
                    sequence,
                    task,
                });
                sequence += 1;
            }
            Some(Command::Shutdown) => break,
            None => {}
        }

        let now = Instant::now();
        while heap.peek().is_some_and(|entry| entry.deadline <= now) {
            if let Some(entry) = heap.pop() {
                run(entry);
            }
        }

        if let Some(periodic) = &mut periodic {
            if periodic.next_run <= now {
                (periodic.job)();
                periodic.next_run = now + periodic.interval;
            }
        }
    }

    // No task is accepted after the shutdown command, the heap holds
    // everything still pending.
    let drained = heap.len();
    while let Some(entry) = heap.pop() {
        run(entry);
    }
    debug!(drained, "scheduler worker stopped");
}
