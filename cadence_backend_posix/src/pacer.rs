// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paced-timer tick source.
//!
//! [`PacedLoop`] stands in for a display link on hosts that have none. It
//! sleeps the calling thread until the next refresh deadline, reads
//! `CLOCK_MONOTONIC`, and hands the registry a [`Tick`] whose `elapsed` is the
//! measured wall-clock gap, so oversleeping is reported rather than hidden.
//!
//! # Frame loop
//!
//! ```text
//! PacedLoop::run()
//!   → sleep until deadline
//!     → Tick { timestamp, elapsed } → LinkRegistry::dispatch()
//!       → FrameLink boundaries → owner sinks
//!   (returns once the registry stops the loop)
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use cadence_core::time::{HostDuration, HostTime};
use cadence_core::{Tick, TickSink, TickSource};

use crate::time::{now, timebase};

/// Longest refresh interval accepted by [`PacedLoop::new`].
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Pacing configuration for a [`PacedLoop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacerConfig {
    /// Target time between ticks.
    pub refresh_interval: Duration,
}

impl PacerConfig {
    /// A 60 Hz display.
    #[must_use]
    pub const fn hz60() -> Self {
        Self::from_hz(60)
    }

    /// A 120 Hz display.
    #[must_use]
    pub const fn hz120() -> Self {
        Self::from_hz(120)
    }

    /// A display refreshing `hz` times per second.
    ///
    /// `from_hz(0)` yields a zero interval, which [`PacedLoop::new`] rejects.
    #[must_use]
    pub const fn from_hz(hz: u32) -> Self {
        let refresh_interval = match 1_000_000_000_u64.checked_div(hz as u64) {
            Some(nanos) => Duration::from_nanos(nanos),
            None => Duration::ZERO,
        };
        Self { refresh_interval }
    }
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self::hz60()
    }
}

/// Errors from [`PacedLoop::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacerError {
    /// The refresh interval is zero; the loop would spin.
    ZeroInterval,
    /// The refresh interval exceeds [`MAX_REFRESH_INTERVAL`].
    IntervalTooLong(Duration),
}

impl fmt::Display for PacerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroInterval => f.write_str("pacer refresh interval must be non-zero"),
            Self::IntervalTooLong(interval) => write!(
                f,
                "pacer refresh interval {interval:?} exceeds {MAX_REFRESH_INTERVAL:?}"
            ),
        }
    }
}

impl core::error::Error for PacerError {}

/// A monotonic-clock tick source driven from the calling thread.
///
/// Cloning is cheap and clones share state: hand one clone to the
/// [`LinkRegistry`](cadence_core::LinkRegistry) and keep another to drive the
/// loop with [`run`](Self::run), [`run_for`](Self::run_for) or
/// [`run_once`](Self::run_once). All of them return as soon as the registry
/// stops the source, which happens when its last link goes away.
#[derive(Clone)]
pub struct PacedLoop {
    inner: Rc<PacedInner>,
}

struct PacedInner {
    interval: HostDuration,
    sink: RefCell<Option<TickSink>>,
    running: Cell<bool>,
    /// Instant of the previous delivered tick, or of `start` before the
    /// first one.
    last: Cell<HostTime>,
    deadline: Cell<HostTime>,
    frame_counter: Cell<u64>,
    /// Deadlines that were already in the past when reached.
    late_ticks: Cell<u64>,
}

impl PacedLoop {
    /// Creates a stopped loop.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError`] if the configured interval is zero or longer
    /// than [`MAX_REFRESH_INTERVAL`].
    pub fn new(config: PacerConfig) -> Result<Self, PacerError> {
        let interval = config.refresh_interval;
        if interval.is_zero() {
            return Err(PacerError::ZeroInterval);
        }
        if interval > MAX_REFRESH_INTERVAL {
            return Err(PacerError::IntervalTooLong(interval));
        }
        let nanos = u64::try_from(interval.as_nanos()).unwrap_or(u64::MAX);
        let start = now();
        Ok(Self {
            inner: Rc::new(PacedInner {
                interval: HostDuration::from_nanos(nanos, timebase()),
                sink: RefCell::new(None),
                running: Cell::new(false),
                last: Cell::new(start),
                deadline: Cell::new(start),
                frame_counter: Cell::new(0),
                late_ticks: Cell::new(0),
            }),
        })
    }

    /// Waits for the next deadline and delivers one tick.
    ///
    /// Returns `false` without waiting if the loop is stopped.
    pub fn run_once(&self) -> bool {
        let inner = &self.inner;
        if !inner.running.get() {
            return false;
        }

        let deadline = inner.deadline.get();
        let before = now();
        if before < deadline {
            let wait = deadline.saturating_duration_since(before);
            std::thread::sleep(Duration::from_nanos(wait.to_nanos(timebase())));
        } else {
            inner.late_ticks.set(inner.late_ticks.get() + 1);
        }

        let at = now();
        let elapsed = at.saturating_duration_since(inner.last.get());
        inner.last.set(at);
        // Skip missed deadlines instead of bursting to catch up; the links
        // still see the full elapsed time.
        let mut next = deadline + inner.interval;
        if next <= at {
            next = at + inner.interval;
        }
        inner.deadline.set(next);

        let index = inner.frame_counter.get();
        inner.frame_counter.set(index + 1);

        // Clone the sink out so the registry may stop this loop from inside it.
        let sink = inner.sink.borrow().clone();
        if let Some(sink) = sink {
            sink(Tick {
                timestamp: at.to_secs_f64(timebase()),
                elapsed: elapsed.as_secs_f64(timebase()),
                index,
            });
        }
        true
    }

    /// Delivers ticks until the loop is stopped. Returns the tick count.
    pub fn run(&self) -> u64 {
        let mut delivered = 0;
        while self.run_once() {
            delivered += 1;
        }
        delivered
    }

    /// Like [`run`](Self::run), but also returns once `limit` of wall-clock
    /// time has passed.
    pub fn run_for(&self, limit: Duration) -> u64 {
        let nanos = u64::try_from(limit.as_nanos()).unwrap_or(u64::MAX);
        let end = now().checked_add(HostDuration::from_nanos(nanos, timebase()));
        let mut delivered = 0;
        while end.is_none_or(|end| now() < end) && self.run_once() {
            delivered += 1;
        }
        delivered
    }

    /// Target interval between ticks.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_nanos(self.inner.interval.to_nanos(timebase()))
    }

    /// Ticks delivered since creation.
    #[must_use]
    pub fn frame_counter(&self) -> u64 {
        self.inner.frame_counter.get()
    }

    /// Ticks whose deadline had already passed when the loop reached it.
    #[must_use]
    pub fn late_ticks(&self) -> u64 {
        self.inner.late_ticks.get()
    }
}

impl TickSource for PacedLoop {
    fn set_sink(&self, sink: TickSink) {
        *self.inner.sink.borrow_mut() = Some(sink);
    }

    fn start(&self) {
        if self.inner.running.get() {
            return;
        }
        let at = now();
        self.inner.running.set(true);
        self.inner.last.set(at);
        self.inner.deadline.set(at + self.inner.interval);
    }

    fn stop(&self) {
        self.inner.running.set(false);
    }

    fn is_running(&self) -> bool {
        self.inner.running.get()
    }
}

impl fmt::Debug for PacedLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacedLoop")
            .field("refresh_interval", &self.refresh_interval())
            .field("running", &self.inner.running.get())
            .field("frame_counter", &self.inner.frame_counter.get())
            .field("late_ticks", &self.inner.late_ticks.get())
            .finish_non_exhaustive()
    }
}
