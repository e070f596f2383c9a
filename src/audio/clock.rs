//! Soft tick clock
//!
//! One `Clock` owns at most one timer thread. Ticks are deadline-scheduled
//! (`start + n * period`), so a slow callback delays a single tick but
//! never shifts the ones after it. Stopping wakes the thread through its
//! stop channel and joins it before returning; a stop that arrives before a
//! tick's deadline means that tick never fires.
//!
//! `reschedule` keeps the phase: the new timer's first tick lands one new
//! period after the last tick fired, never straight away.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Callback run on every tick, on the clock thread
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    /// `start` on a clock whose thread is still alive
    AlreadyRunning,
    /// A zero period would spin
    ZeroPeriod,
    /// The OS refused to spawn the timer thread
    Spawn(String),
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::AlreadyRunning => write!(f, "Clock is already running"),
            ClockError::ZeroPeriod => write!(f, "Clock period must be greater than zero"),
            ClockError::Spawn(e) => write!(f, "Failed to spawn clock thread: {}", e),
        }
    }
}

impl std::error::Error for ClockError {}

pub struct Clock {
    period: Duration,
    on_tick: Option<TickFn>,
    running: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    /// Timer threads currently alive for this clock
    live: Arc<AtomicUsize>,
    /// Ticks fired since construction
    ticks: Arc<AtomicU64>,
    /// When the current run last fired
    last_tick: Arc<Mutex<Option<Instant>>>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            period: Duration::ZERO,
            on_tick: None,
            running: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            thread: None,
            live: Arc::new(AtomicUsize::new(0)),
            ticks: Arc::new(AtomicU64::new(0)),
            last_tick: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the timer thread. The first tick fires immediately, then one
    /// every `period`.
    pub fn start(&mut self, period: Duration, on_tick: TickFn) -> Result<(), ClockError> {
        if self.thread.is_some() {
            return Err(ClockError::AlreadyRunning);
        }
        *lock(&self.last_tick) = None;
        self.spawn(period, on_tick, Instant::now())
    }

    fn spawn(
        &mut self,
        period: Duration,
        on_tick: TickFn,
        first: Instant,
    ) -> Result<(), ClockError> {
        if period.is_zero() {
            return Err(ClockError::ZeroPeriod);
        }

        let (stop_tx, stop_rx) = bounded(1);
        let running = self.running.clone();
        let live = self.live.clone();
        let ticks = self.ticks.clone();
        let last_tick = self.last_tick.clone();
        let callback = on_tick.clone();

        running.store(true, Ordering::SeqCst);
        live.fetch_add(1, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("pulsar-clock".to_string())
            .spawn(move || {
                TimerThread {
                    period,
                    stop_rx,
                    on_tick: callback,
                    ticks,
                    last_tick,
                }
                .run(first);
                running.store(false, Ordering::SeqCst);
                live.fetch_sub(1, Ordering::SeqCst);
            });

        match spawned {
            Ok(handle) => {
                log::debug!("clock started, period {:?}", period);
                self.period = period;
                self.on_tick = Some(on_tick);
                self.stop_tx = Some(stop_tx);
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                self.live.fetch_sub(1, Ordering::SeqCst);
                Err(ClockError::Spawn(e.to_string()))
            }
        }
    }

    /// Stop and join the timer thread. Returns false if nothing was running.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.thread.take() else {
            return false;
        };
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if handle.thread().id() == thread::current().id() {
            // Called from inside a tick; the loop exits once the callback returns
            log::warn!("clock stopped from its own tick, not joining");
        } else if handle.join().is_err() {
            log::warn!("clock thread panicked");
        }
        self.running.store(false, Ordering::SeqCst);
        log::debug!("clock stopped");
        true
    }

    /// Swap the running timer for one at `period` with the same callback.
    /// The next tick is due `period` after the last one fired (or now, if
    /// that moment has passed). On a stopped clock this only records the
    /// period.
    pub fn reschedule(&mut self, period: Duration) -> Result<(), ClockError> {
        if period.is_zero() {
            return Err(ClockError::ZeroPeriod);
        }
        if !self.stop() {
            self.period = period;
            return Ok(());
        }
        match self.on_tick.clone() {
            Some(on_tick) => self.resume(period, on_tick),
            None => {
                self.period = period;
                Ok(())
            }
        }
    }

    /// Start a stopped clock in phase with its previous run: the first tick
    /// is due `period` after the last one fired, or now if that has passed.
    /// A clock that never ticked starts like `start`.
    pub fn resume(&mut self, period: Duration, on_tick: TickFn) -> Result<(), ClockError> {
        if self.thread.is_some() {
            return Err(ClockError::AlreadyRunning);
        }
        let now = Instant::now();
        // None: the old timer never reached its first tick, so that tick is still owed
        let first = match *lock(&self.last_tick) {
            Some(last) => (last + period).max(now),
            None => now,
        };
        self.spawn(period, on_tick, first)
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Period of the current (or last) run
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of timer threads alive for this clock (0 or 1)
    pub fn live_timers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TimerThread {
    period: Duration,
    stop_rx: Receiver<()>,
    on_tick: TickFn,
    ticks: Arc<AtomicU64>,
    last_tick: Arc<Mutex<Option<Instant>>>,
}

impl TimerThread {
    fn run(self, first: Instant) {
        let mut deadline = first;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.stop_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            *lock(&self.last_tick) = Some(Instant::now());
            (self.on_tick)();
            self.ticks.fetch_add(1, Ordering::SeqCst);

            deadline += self.period;
            let now = Instant::now();
            if now > deadline + self.period {
                // Fell more than a whole tick behind: drop the backlog
                let missed = (now - deadline).as_nanos() / self.period.as_nanos().max(1);
                log::warn!("clock overrun, skipping {} ticks", missed);
                deadline = now;
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
