// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Periodic tick delivery.
//!
//! A [`TickSource`] wraps exactly one platform periodic-callback facility
//! (`CADisplayLink`, `CVDisplayLink`, `requestAnimationFrame`, a paced timer)
//! and forwards each callback as a [`Tick`] to a single [`TickSink`]. The
//! [`LinkRegistry`](crate::registry::LinkRegistry) installs that sink and is
//! the only caller of [`start`](TickSource::start) and
//! [`stop`](TickSource::stop).
//!
//! [`ManualTickSource`] is a deterministic source for tests and offline
//! stepping: time only moves when [`ManualTickSource::advance`] is called.

use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

/// One display-refresh callback.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// Host time of the callback, in seconds.
    pub timestamp: f64,
    /// Wall-clock seconds since the previous delivered tick (or since
    /// [`TickSource::start`] for the first tick after a start).
    pub elapsed: f64,
    /// Monotonically increasing counter assigned by the source.
    pub index: u64,
}

/// Receiver for ticks. Installed once per source.
pub type TickSink = Rc<dyn Fn(Tick)>;

/// A single periodic-callback facility.
///
/// Methods take `&self`; implementations keep their state in cells, the way
/// platform callback wrappers do.
///
/// # Contract
///
/// - [`start`](Self::start) while running and [`stop`](Self::stop) while
///   stopped are no-ops.
/// - `elapsed` reflects real time between deliveries, not a nominal refresh
///   interval, so dropped frames and refresh-rate changes are accounted for.
/// - Time spent stopped is never reported: the first tick after `start`
///   measures from the `start` call.
/// - Ticks are delivered on the context that owns the source, never
///   concurrently with another call into the sink.
pub trait TickSource {
    /// Installs the single receiver for ticks, replacing any previous one.
    fn set_sink(&self, sink: TickSink);

    /// Begins periodic callbacks if not already running.
    fn start(&self);

    /// Halts periodic callbacks if running.
    fn stop(&self);

    /// Returns `true` while callbacks are engaged.
    fn is_running(&self) -> bool;
}

/// A [`TickSource`] driven by explicit calls to [`advance`](Self::advance).
///
/// Cloning is cheap and clones share state, so a test can hand one clone to
/// the registry and keep another to drive time and inspect engage counts.
#[derive(Clone, Default)]
pub struct ManualTickSource {
    inner: Rc<ManualInner>,
}

#[derive(Default)]
struct ManualInner {
    sink: RefCell<Option<TickSink>>,
    running: Cell<bool>,
    now: Cell<f64>,
    next_index: Cell<u64>,
    starts: Cell<u32>,
    stops: Cell<u32>,
}

impl ManualTickSource {
    /// Creates a stopped source whose clock reads zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `dt` seconds.
    ///
    /// If the source is running, a tick is delivered and `true` is returned.
    /// While stopped the clock still moves, but nothing is delivered.
    pub fn advance(&self, dt: f64) -> bool {
        let inner = &self.inner;
        inner.now.set(inner.now.get() + dt);
        if !inner.running.get() {
            return false;
        }
        let index = inner.next_index.get();
        inner.next_index.set(index + 1);

        // Clone the sink out so it may call back into this source.
        let sink = inner.sink.borrow().clone();
        if let Some(sink) = sink {
            sink(Tick {
                timestamp: inner.now.get(),
                elapsed: dt,
                index,
            });
        }
        true
    }

    /// Calls [`advance`](Self::advance) `count` times with step `dt`.
    ///
    /// Returns the number of ticks actually delivered.
    pub fn advance_by(&self, dt: f64, count: usize) -> usize {
        (0..count).filter(|_| self.advance(dt)).count()
    }

    /// Advances in steps of `dt` until the source is stopped or `max_steps`
    /// ticks were delivered. Returns the number of delivered ticks.
    pub fn run_while_running(&self, dt: f64, max_steps: usize) -> usize {
        let mut delivered = 0;
        while delivered < max_steps && self.advance(dt) {
            delivered += 1;
        }
        delivered
    }

    /// Current reading of the manual clock, in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.inner.now.get()
    }

    /// Number of stopped→running transitions so far.
    #[must_use]
    pub fn start_count(&self) -> u32 {
        self.inner.starts.get()
    }

    /// Number of running→stopped transitions so far.
    #[must_use]
    pub fn stop_count(&self) -> u32 {
        self.inner.stops.get()
    }
}

impl TickSource for ManualTickSource {
    fn set_sink(&self, sink: TickSink) {
        *self.inner.sink.borrow_mut() = Some(sink);
    }

    fn start(&self) {
        if self.inner.running.get() {
            return;
        }
        self.inner.running.set(true);
        self.inner.starts.set(self.inner.starts.get() + 1);
    }

    fn stop(&self) {
        if !self.inner.running.get() {
            return;
        }
        self.inner.running.set(false);
        self.inner.stops.set(self.inner.stops.get() + 1);
    }

    fn is_running(&self) -> bool {
        self.inner.running.get()
    }
}

impl fmt::Debug for ManualTickSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTickSource")
            .field("running", &self.inner.running.get())
            .field("now", &self.inner.now.get())
            .field("next_index", &self.inner.next_index.get())
            .field("starts", &self.inner.starts.get())
            .field("stops", &self.inner.stops.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn recording(source: &ManualTickSource) -> Rc<RefCell<Vec<Tick>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        source.set_sink(Rc::new(move |tick| sink_seen.borrow_mut().push(tick)));
        seen
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let source = ManualTickSource::new();
        source.start();
        source.start();
        assert!(source.is_running(), "started");
        assert_eq!(source.start_count(), 1, "second start is a no-op");

        source.stop();
        source.stop();
        assert!(!source.is_running(), "stopped");
        assert_eq!(source.stop_count(), 1, "second stop is a no-op");
    }

    #[test]
    fn ticks_only_flow_while_running() {
        let source = ManualTickSource::new();
        let seen = recording(&source);

        assert!(!source.advance(0.01), "stopped source delivers nothing");
        source.start();
        assert_eq!(source.advance_by(0.01, 3), 3);
        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(
            seen.borrow().iter().map(|t| t.index).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }

    #[test]
    fn elapsed_is_the_step_passed_to_advance() {
        let source = ManualTickSource::new();
        let seen = recording(&source);

        source.start();
        for dt in [0.25, 0.5, 0.125] {
            source.advance(dt);
        }

        let elapsed: Vec<f64> = seen.borrow().iter().map(|t| t.elapsed).collect();
        assert_eq!(elapsed, [0.25, 0.5, 0.125], "one step per tick, nothing held back");
    }

    #[test]
    fn time_spent_stopped_is_not_reported() {
        let source = ManualTickSource::new();
        let seen = recording(&source);

        source.start();
        source.advance(0.016);
        source.stop();
        source.advance(1.0);
        source.start();
        source.advance(0.016);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(
            (seen[1].elapsed - 0.016).abs() < 1e-12,
            "elapsed after restart measures from start, got {}",
            seen[1].elapsed
        );
        assert!(
            (seen[1].timestamp - 1.032).abs() < 1e-9,
            "timestamps still follow the wall clock"
        );
    }

    #[test]
    fn sink_may_stop_its_own_source() {
        let source = ManualTickSource::new();
        let inner_source = source.clone();
        source.set_sink(Rc::new(move |tick| {
            if tick.index == 2 {
                inner_source.stop();
            }
        }));
        source.start();
        assert_eq!(source.run_while_running(0.01, 100), 3);
        assert!(!source.is_running(), "sink stopped the source");
    }
}
