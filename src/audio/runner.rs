//! Engine runner: one engine, one clock, one sink
//!
//! The engine sits behind `Arc<Mutex<_>>` so the clock thread can tick it
//! while the REPL edits it. The lock is only held for the duration of a
//! tick or an edit, never while the clock thread is joined, so stopping can
//! not deadlock against a tick in progress.

use crate::audio::clock::{Clock, TickFn};
use crate::audio::dispatcher::DispatcherHandle;
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use pulsar_core::engine::{Engine, RingSequencerEngine, StepNotice, TickOutcome};
use pulsar_core::types::TriggerSink;
use std::sync::{Arc, Mutex, MutexGuard};

/// A played step, tagged with the engine it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    pub engine: &'static str,
    pub notice: StepNotice,
}

pub struct EngineRunner<E: Engine + 'static> {
    engine: Arc<Mutex<E>>,
    clock: Clock,
    sink: Arc<dyn TriggerSink>,
    dispatcher: Option<DispatcherHandle>,
    observer: Option<Sender<StepEvent>>,
}

impl<E: Engine + 'static> EngineRunner<E> {
    pub fn new(engine: E, sink: Arc<dyn TriggerSink>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            clock: Clock::new(),
            sink,
            dispatcher: None,
            observer: None,
        }
    }

    /// Route jittered triggers through `dispatcher` instead of playing them
    /// on the tick
    pub fn with_dispatcher(mut self, dispatcher: DispatcherHandle) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Publish every played step on `observer`
    pub fn with_observer(mut self, observer: Sender<StepEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Start the engine and its clock. Starting a running runner is ignored
    /// and returns false.
    pub fn start(&mut self) -> Result<bool> {
        let period = {
            let mut engine = self.lock();
            if !engine.start() {
                return Ok(false);
            }
            engine.period()
        };
        let on_tick = self.tick_fn();
        if let Err(e) = self.clock.start(period, on_tick) {
            self.lock().stop();
            return Err(e).context("failed to start clock");
        }
        Ok(true)
    }

    /// Stop the clock (joining its thread), then stop and rewind the engine.
    /// Returns false if it was not running.
    pub fn stop(&mut self) -> bool {
        let clock_stopped = self.clock.stop();
        let engine_stopped = self.lock().stop();
        clock_stopped || engine_stopped
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Change the tempo. A running clock is restarted at the new period;
    /// engine cursors are kept.
    pub fn set_tempo(&mut self, bpm: f32) -> Result<()> {
        self.update(|engine| Ok(engine.set_tempo(bpm)?))
    }

    pub fn set_subdivision(&mut self, subdivision: u32) -> Result<()> {
        self.update(|engine| Ok(engine.set_subdivision(subdivision)?))
    }

    /// Edit the engine under its lock. If the edit changed the tick period
    /// while running, the clock is rescheduled afterwards (outside the lock).
    pub fn update<R>(&mut self, edit: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        let (result, period) = {
            let mut engine = self.lock();
            let result = edit(&mut *engine)?;
            (result, engine.period())
        };
        if self.clock.is_running() && period != self.clock.period() {
            self.clock
                .reschedule(period)
                .context("failed to reschedule clock")?;
        }
        Ok(result)
    }

    /// Read engine state under its lock
    pub fn inspect<R>(&self, read: impl FnOnce(&E) -> R) -> R {
        read(&*self.lock())
    }

    /// Shared handle to the engine
    pub fn engine(&self) -> Arc<Mutex<E>> {
        self.engine.clone()
    }

    /// Timer threads alive for this runner (0 or 1)
    pub fn live_timers(&self) -> usize {
        self.clock.live_timers()
    }

    pub fn ticks(&self) -> u64 {
        self.clock.ticks()
    }

    fn lock(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop the clock around an edit, then resume it in phase at the
    /// engine's period
    fn restart_around<R>(&mut self, edit: impl FnOnce(&mut E) -> Result<R>) -> Result<R> {
        let was_running = self.clock.stop();
        let (result, period) = {
            let mut engine = self.lock();
            let result = edit(&mut *engine);
            (result, engine.period())
        };
        if was_running {
            let on_tick = self.tick_fn();
            self.clock
                .resume(period, on_tick)
                .context("failed to restart clock")?;
        }
        result
    }

    fn tick_fn(&self) -> TickFn {
        let engine = self.engine.clone();
        let sink = self.sink.clone();
        let dispatcher = self.dispatcher.clone();
        let observer = self.observer.clone();
        Arc::new(move || {
            let (name, outcome) = {
                let mut engine = engine.lock().unwrap_or_else(|e| e.into_inner());
                (engine.name(), engine.tick())
            };
            deliver(name, outcome, &sink, dispatcher.as_ref(), observer.as_ref());
        })
    }
}

impl EngineRunner<RingSequencerEngine> {
    /// Resize the ring set. The shared clock is stopped and restarted so no
    /// tick can observe the rings mid-resize.
    pub fn set_ring_count(&mut self, count: usize) -> Result<()> {
        // a rejected count must not touch the clock
        pulsar_core::config::ring_count(count)?;
        self.restart_around(|engine| Ok(engine.set_ring_count(count)?))
    }
}

impl<E: Engine + 'static> Drop for EngineRunner<E> {
    fn drop(&mut self) {
        self.clock.stop();
    }
}

/// Hand one tick's triggers to the sink (or the dispatcher when delayed)
/// and its steps to the observer
fn deliver(
    engine: &'static str,
    outcome: TickOutcome,
    sink: &Arc<dyn TriggerSink>,
    dispatcher: Option<&DispatcherHandle>,
    observer: Option<&Sender<StepEvent>>,
) {
    for trigger in &outcome.triggers {
        match dispatcher {
            Some(d) if !trigger.is_immediate() => d.schedule(sink.clone(), trigger.event, trigger.delay),
            _ => sink.trigger(&trigger.event),
        }
    }
    if let Some(tx) = observer {
        for notice in outcome.steps {
            let _ = tx.send(StepEvent { engine, notice });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::dispatcher::TriggerDispatcher;
    use crossbeam_channel::unbounded;
    use pulsar_core::config::{ArpeggiatorConfig, EuclideanConfig, RingConfig, Traversal};
    use pulsar_core::engine::{ArpeggiatorEngine, EuclideanEngine};
    use pulsar_core::types::CollectingSink;
    use std::thread;
    use std::time::Duration;

    fn fast_euclid(sink: Arc<CollectingSink>) -> EngineRunner<EuclideanEngine> {
        let engine = EuclideanEngine::new(EuclideanConfig {
            pulses: 4,
            steps: 4,
            bpm: 600.0,
            subdivision: 10,
            ..Default::default()
        })
        .unwrap();
        EngineRunner::new(engine, sink)
    }

    #[test]
    fn test_runner_ticks_engine() {
        let sink = Arc::new(CollectingSink::new());
        let mut runner = fast_euclid(sink.clone());
        assert!(runner.start().unwrap());
        thread::sleep(Duration::from_millis(100));
        assert!(runner.stop());
        // 10ms ticks, every step an onset
        assert!(sink.len() >= 5, "only {} triggers", sink.len());
        assert_eq!(runner.live_timers(), 0);
    }

    #[test]
    fn test_start_twice_is_ignored() {
        let sink = Arc::new(CollectingSink::new());
        let mut runner = fast_euclid(sink);
        assert!(runner.start().unwrap());
        assert!(!runner.start().unwrap());
        assert_eq!(runner.live_timers(), 1);
        assert!(runner.stop());
        assert!(!runner.stop());
    }

    #[test]
    fn test_stop_rewinds_engine() {
        let sink = Arc::new(CollectingSink::new());
        let mut runner = fast_euclid(sink);
        runner.start().unwrap();
        thread::sleep(Duration::from_millis(25));
        runner.stop();
        assert_eq!(runner.inspect(|e| e.current_step()), 0);
        assert!(!runner.inspect(|e| e.is_running()));
    }

    #[test]
    fn test_tempo_change_reschedules_one_timer() {
        let sink = Arc::new(CollectingSink::new());
        let mut runner = fast_euclid(sink.clone());
        runner.set_tempo(60.0).unwrap();
        runner.start().unwrap();
        thread::sleep(Duration::from_millis(20));

        // 60 BPM / 10 = 100ms; now 600 BPM / 10 = 10ms
        runner.set_tempo(600.0).unwrap();
        assert_eq!(runner.live_timers(), 1);
        let before = sink.len();
        thread::sleep(Duration::from_millis(205));
        let fired = sink.len() - before;
        runner.stop();
        assert!(fired >= 15 && fired <= 22, "fired {}", fired);
    }

    #[test]
    fn test_tempo_changes_do_not_add_ticks() {
        let sink = Arc::new(CollectingSink::new());
        let mut runner = fast_euclid(sink.clone());
        // 200ms ticks
        runner.set_tempo(30.0).unwrap();
        runner.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        let before = runner.ticks();

        for bpm in [31.0, 30.0, 32.0, 30.5, 30.0, 31.5] {
            runner.set_tempo(bpm).unwrap();
            thread::sleep(Duration::from_millis(5));
        }
        let fired = runner.ticks() - before;
        runner.stop();
        assert!(fired <= 1, "fired {} extra ticks", fired);
    }

    #[test]
    fn test_bad_tempo_leaves_clock_alone() {
        let sink = Arc::new(CollectingSink::new());
        let mut runner = fast_euclid(sink);
        runner.start().unwrap();
        assert!(runner.set_tempo(0.0).is_err());
        assert!(runner.set_tempo(f32::NAN).is_err());
        assert!(runner.is_running());
        assert_eq!(runner.inspect(|e| e.transport().bpm()), 600.0);
    }

    #[test]
    fn test_observer_sees_previous_steps() {
        let sink = Arc::new(CollectingSink::new());
        let (tx, rx) = unbounded();
        let mut runner = fast_euclid(sink).with_observer(tx);
        runner.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        runner.stop();
        let steps: Vec<usize> = rx.try_iter().map(|e| e.notice.step).collect();
        assert!(steps.len() >= 4);
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(*step, i % 4);
        }
    }

    #[test]
    fn test_ring_count_change_while_running() {
        let sink = Arc::new(CollectingSink::new());
        let engine = RingSequencerEngine::new(RingConfig {
            ring_count: 4,
            traversal: Traversal::Lockstep,
            bpm: 600.0,
            subdivision: 10,
            ..Default::default()
        })
        .unwrap();
        let mut runner = EngineRunner::new(engine, sink);
        runner.start().unwrap();
        thread::sleep(Duration::from_millis(30));

        runner.set_ring_count(2).unwrap();
        assert!(runner.is_running());
        assert_eq!(runner.live_timers(), 1);
        runner.stop();

        // 200ms ticks: a rejected resize fires nothing
        runner.set_tempo(30.0).unwrap();
        runner.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        let before = runner.ticks();
        assert!(runner.set_ring_count(0).is_err());
        assert!(runner.set_ring_count(3).is_ok());
        thread::sleep(Duration::from_millis(10));
        assert_eq!(runner.ticks(), before);
        assert!(runner.is_running());
        assert_eq!(runner.inspect(|e| e.ring_count()), 3);
        runner.stop();
    }

    #[test]
    fn test_jittered_arp_goes_through_dispatcher() {
        let sink = Arc::new(CollectingSink::new());
        let dispatcher = TriggerDispatcher::spawn();
        let engine = ArpeggiatorEngine::with_seed(
            ArpeggiatorConfig {
                chaos: 1.0,
                bpm: 600.0,
                subdivision: 10,
                ..Default::default()
            },
            3,
        )
        .unwrap();
        engine.held_notes().note_on(60).unwrap();
        let mut runner = EngineRunner::new(engine, sink.clone()).with_dispatcher(dispatcher.clone());
        runner.start().unwrap();
        thread::sleep(Duration::from_millis(80));
        runner.stop();

        // queued triggers still land after stop
        thread::sleep(Duration::from_millis(40));
        assert_eq!(dispatcher.pending(), 0);
        assert!(sink.len() >= 4);
    }
}
