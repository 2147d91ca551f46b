//! Fixed-delay background schedules.
//!
//! Each schedule owns one named worker thread that runs its task, then waits
//! `interval` on a crossbeam stop channel. Stopping drops the sender, which
//! wakes the worker immediately; the handle then joins it. A schedule whose
//! interval changes is torn down and rebuilt rather than adjusted in place.

#![allow(missing_docs)]

use std::thread;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};

use crate::core::errors::{ItelError, Result};

/// Handle to a running fixed-delay worker.
#[derive(Debug)]
pub struct FixedDelaySchedule {
    name: String,
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl FixedDelaySchedule {
    /// Spawn `task` on a thread named `name`. The first run happens after
    /// `initial_delay`, later runs `interval` after the previous one ended.
    ///
    /// # Errors
    /// `Runtime` when the worker thread cannot be spawned.
    pub fn start<F>(
        name: &str,
        initial_delay: Duration,
        interval: Duration,
        mut task: F,
    ) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let thread_name = format!("itel-{name}");
        let join = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let mut delay = initial_delay;
                loop {
                    match stop_rx.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => task(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    delay = interval;
                }
                tracing::debug!(schedule = %thread_name, "schedule stopped");
            })
            .map_err(|source| ItelError::Runtime {
                details: format!("failed to spawn {name} schedule: {source}"),
            })?;

        tracing::debug!(schedule = name, ?interval, "schedule started");
        Ok(Self {
            name: name.to_string(),
            interval,
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Signal the worker and wait for an in-flight task to finish. Idempotent.
    pub fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(join) = self.join.take() {
            if join.thread().id() == thread::current().id() {
                // Stopping from inside the task: the loop exits on its next wait.
                return;
            }
            if join.join().is_err() {
                tracing::error!(schedule = %self.name, "schedule worker panicked");
            }
        }
    }
}

impl Drop for FixedDelaySchedule {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl FnMut() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn runs_repeatedly_until_stopped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut schedule = FixedDelaySchedule::start(
            "test",
            Duration::from_millis(1),
            Duration::from_millis(5),
            counter_task(&runs),
        )
        .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while runs.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        schedule.stop();
        let after_stop = runs.load(Ordering::SeqCst);
        assert!(after_stop >= 3);
        assert!(!schedule.is_running());
        thread::sleep(Duration::from_millis(30));
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn stop_interrupts_long_waits() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut schedule = FixedDelaySchedule::start(
            "slow",
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            counter_task(&runs),
        )
        .unwrap();
        let started = Instant::now();
        schedule.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stop_is_idempotent_and_drop_safe() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut schedule = FixedDelaySchedule::start(
            "twice",
            Duration::from_secs(60),
            Duration::from_secs(60),
            counter_task(&runs),
        )
        .unwrap();
        assert_eq!(schedule.name(), "twice");
        assert_eq!(schedule.interval(), Duration::from_secs(60));
        schedule.stop();
        schedule.stop();
        drop(schedule);
    }
}
