//! Delayed trigger dispatcher
//!
//! Chaos jitter pushes some arpeggiator notes a few milliseconds past their
//! tick. Those triggers are queued here, in a min-heap keyed by due time,
//! and delivered from a single thread so the clock thread never sleeps.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use pulsar_core::types::{TriggerEvent, TriggerSink};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A trigger waiting for its due time
pub struct DelayedTrigger {
    pub due: Instant,
    pub event: TriggerEvent,
    pub sink: Arc<dyn TriggerSink>,
    /// Tie-breaker so equal due times keep submission order
    seq: u64,
}

impl PartialEq for DelayedTrigger {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for DelayedTrigger {}

impl PartialOrd for DelayedTrigger {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedTrigger {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap, we want the earliest first
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Commands that can be sent to the dispatcher
enum DispatcherCommand {
    Schedule {
        delay: Duration,
        event: TriggerEvent,
        sink: Arc<dyn TriggerSink>,
    },
    /// Drop everything queued
    Clear,
    Shutdown,
}

/// Handle for sending triggers to the dispatcher thread
#[derive(Clone)]
pub struct DispatcherHandle {
    command_tx: Sender<DispatcherCommand>,
    pending: Arc<AtomicUsize>,
    is_running: Arc<AtomicBool>,
}

impl DispatcherHandle {
    /// Deliver `event` to `sink` once `delay` has passed. A zero delay is
    /// delivered on the dispatcher thread as soon as it is received.
    pub fn schedule(&self, sink: Arc<dyn TriggerSink>, event: TriggerEvent, delay: Duration) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self
            .command_tx
            .send(DispatcherCommand::Schedule { delay, event, sink })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            log::warn!("dispatcher gone, dropped note {}", event.pitch);
        }
    }

    /// Forget every queued trigger
    pub fn clear(&self) {
        let _ = self.command_tx.send(DispatcherCommand::Clear);
    }

    /// Triggers scheduled but not yet delivered
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(DispatcherCommand::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }
}

pub struct TriggerDispatcher {
    queue: BinaryHeap<DelayedTrigger>,
    command_rx: Receiver<DispatcherCommand>,
    pending: Arc<AtomicUsize>,
    is_running: Arc<AtomicBool>,
    next_seq: u64,
}

impl TriggerDispatcher {
    /// Create a dispatcher that runs in its own thread
    pub fn spawn() -> DispatcherHandle {
        let (command_tx, command_rx) = unbounded();
        let pending = Arc::new(AtomicUsize::new(0));
        let is_running = Arc::new(AtomicBool::new(true));

        let dispatcher = TriggerDispatcher {
            queue: BinaryHeap::new(),
            command_rx,
            pending: pending.clone(),
            is_running: is_running.clone(),
            next_seq: 0,
        };
        if let Err(e) = thread::Builder::new()
            .name("pulsar-dispatch".to_string())
            .spawn(move || dispatcher.run_loop())
        {
            log::error!("failed to spawn dispatcher: {}", e);
            is_running.store(false, Ordering::SeqCst);
        }

        DispatcherHandle {
            command_tx,
            pending,
            is_running,
        }
    }

    fn run_loop(mut self) {
        loop {
            let command = match self.queue.peek() {
                Some(next) => {
                    let wait = next.due.saturating_duration_since(Instant::now());
                    match self.command_rx.recv_timeout(wait) {
                        Ok(cmd) => Some(cmd),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.command_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };

            if let Some(cmd) = command {
                if !self.handle_command(cmd) {
                    break;
                }
            }
            self.deliver_due(Instant::now());
        }

        if !self.queue.is_empty() {
            log::debug!("dispatcher stopping with {} queued triggers", self.queue.len());
        }
        self.pending.store(0, Ordering::SeqCst);
        self.is_running.store(false, Ordering::SeqCst);
    }

    /// Returns false if the thread should exit
    fn handle_command(&mut self, cmd: DispatcherCommand) -> bool {
        match cmd {
            DispatcherCommand::Schedule { delay, event, sink } => {
                self.queue.push(DelayedTrigger {
                    due: Instant::now() + delay,
                    event,
                    sink,
                    seq: self.next_seq,
                });
                self.next_seq += 1;
            }
            DispatcherCommand::Clear => {
                let dropped = self.queue.len();
                self.queue.clear();
                self.pending.fetch_sub(dropped, Ordering::SeqCst);
            }
            DispatcherCommand::Shutdown => return false,
        }
        true
    }

    fn deliver_due(&mut self, now: Instant) {
        while self.queue.peek().is_some_and(|next| next.due <= now) {
            if let Some(trigger) = self.queue.pop() {
                trigger.sink.trigger(&trigger.event);
                self.pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsar_core::types::CollectingSink;

    fn wait_for(handle: &DispatcherHandle) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while handle.pending() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_delivers_in_due_order() {
        let handle = TriggerDispatcher::spawn();
        let sink = Arc::new(CollectingSink::new());
        handle.schedule(sink.clone(), TriggerEvent::new(64, 100, 0.1), Duration::from_millis(30));
        handle.schedule(sink.clone(), TriggerEvent::new(60, 100, 0.1), Duration::from_millis(5));
        handle.schedule(sink.clone(), TriggerEvent::new(62, 100, 0.1), Duration::from_millis(15));
        wait_for(&handle);
        assert_eq!(sink.pitches(), vec![60, 62, 64]);
        handle.shutdown();
    }

    #[test]
    fn test_delay_is_respected() {
        let handle = TriggerDispatcher::spawn();
        let sink = Arc::new(CollectingSink::new());
        handle.schedule(sink.clone(), TriggerEvent::default(), Duration::from_millis(40));
        thread::sleep(Duration::from_millis(10));
        assert!(sink.is_empty());
        assert_eq!(handle.pending(), 1);
        wait_for(&handle);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_equal_due_keeps_submission_order() {
        let handle = TriggerDispatcher::spawn();
        let sink = Arc::new(CollectingSink::new());
        for pitch in [70, 71, 72] {
            handle.schedule(sink.clone(), TriggerEvent::new(pitch, 90, 0.1), Duration::ZERO);
        }
        wait_for(&handle);
        assert_eq!(sink.pitches(), vec![70, 71, 72]);
    }

    #[test]
    fn test_clear_drops_queued() {
        let handle = TriggerDispatcher::spawn();
        let sink = Arc::new(CollectingSink::new());
        handle.schedule(sink.clone(), TriggerEvent::default(), Duration::from_millis(200));
        handle.clear();
        wait_for(&handle);
        thread::sleep(Duration::from_millis(250));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_shutdown_stops_thread() {
        let handle = TriggerDispatcher::spawn();
        assert!(handle.is_running());
        handle.shutdown();
        let deadline = Instant::now() + Duration::from_secs(1);
        while handle.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!handle.is_running());
    }
}
