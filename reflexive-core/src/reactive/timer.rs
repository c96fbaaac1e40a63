//! Timer scheduling for the `delay` and `debounce` pipeline stages.
//!
//! The store owns no timers itself. A timing stage defers to the host:
//! the ambient tokio runtime when one is entered, otherwise a single worker
//! thread per stage instance that drains a deadline queue. The worker is
//! spawned on the first scheduled emission and exits once its stage has been
//! dropped and the queue is empty.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{trace, warn};

type Task = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
pub(crate) enum Timer {
    Tokio(Handle),
    Thread(Arc<ThreadTimer>),
}

impl Timer {
    /// Pick the scheduler for the calling context.
    pub(crate) fn current() -> Self {
        match Handle::try_current() {
            Ok(handle) => Timer::Tokio(handle),
            Err(_) => Timer::Thread(Arc::new(ThreadTimer::default())),
        }
    }

    /// Run `task` once `after` has elapsed.
    pub(crate) fn schedule<F>(&self, after: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            Timer::Tokio(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(after).await;
                    task();
                });
            }
            Timer::Thread(worker) => worker.schedule(after, Box::new(task)),
        }
    }
}

struct Job {
    deadline: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the earliest deadline first.
impl Ord for Job {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

/// One lazily spawned worker thread fed through a channel.
#[derive(Default)]
pub(crate) struct ThreadTimer {
    queue: Mutex<Option<Sender<Job>>>,
    seq: Mutex<u64>,
}

impl ThreadTimer {
    fn schedule(&self, after: Duration, task: Task) {
        let job = Job {
            deadline: Instant::now() + after,
            seq: {
                let mut seq = self.seq.lock();
                *seq += 1;
                *seq
            },
            task,
        };

        let mut queue = self.queue.lock();
        let job = match queue.as_ref() {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                // The worker went away; respawn it with this job.
                Err(mpsc::SendError(job)) => job,
            },
            None => job,
        };

        let (sender, receiver) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("reflexive-timer".to_string())
            .spawn(move || run_worker(receiver));
        match spawned {
            Ok(_) => {
                // The receiver is alive in the new thread, so this cannot fail.
                let _ = sender.send(job);
                *queue = Some(sender);
            }
            Err(e) => {
                warn!(target: "reflexive::cell", error = %e, "failed to spawn timer thread; emission dropped");
            }
        }
    }
}

fn run_worker(receiver: Receiver<Job>) {
    let mut heap: BinaryHeap<Job> = BinaryHeap::new();
    let mut connected = true;

    loop {
        let next = heap.peek().map(|job| job.deadline);
        match (next, connected) {
            (None, false) => break,
            (None, true) => match receiver.recv() {
                Ok(job) => heap.push(job),
                Err(_) => connected = false,
            },
            (Some(deadline), true) => {
                match receiver.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(job) => heap.push(job),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => connected = false,
                }
            }
            (Some(deadline), false) => {
                std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
            }
        }

        let now = Instant::now();
        while heap.peek().is_some_and(|job| job.deadline <= now) {
            if let Some(job) = heap.pop() {
                (job.task)();
            }
        }
    }

    trace!(target: "reflexive::cell", "timer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn thread_timer_fires_outside_runtime() {
        let timer = Timer::current();
        assert!(matches!(timer, Timer::Thread(_)));

        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        timer.schedule(Duration::from_millis(10), move || {
            fired_clone.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(200));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn thread_timer_runs_in_deadline_order_on_one_thread() {
        let timer = Timer::current();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (label, millis) in [("late", 60), ("early", 10), ("middle", 30)] {
            let seen = seen.clone();
            timer.schedule(Duration::from_millis(millis), move || {
                let name = std::thread::current().name().map(str::to_string);
                seen.lock().push((label, name));
            });
        }

        std::thread::sleep(Duration::from_millis(300));
        let seen = seen.lock();
        let labels: Vec<_> = seen.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec!["early", "middle", "late"]);
        assert!(seen
            .iter()
            .all(|(_, name)| name.as_deref() == Some("reflexive-timer")));
    }

    #[test]
    fn queued_jobs_survive_dropping_the_timer() {
        let timer = Timer::current();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        timer.schedule(Duration::from_millis(20), move || {
            fired_clone.store(true, Ordering::SeqCst);
        });
        drop(timer);

        std::thread::sleep(Duration::from_millis(200));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tokio_timer_fires_inside_runtime() {
        let timer = Timer::current();
        assert!(matches!(timer, Timer::Tokio(_)));

        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        timer.schedule(Duration::from_millis(10), move || {
            fired_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
