// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-timeline frame state machine.
//!
//! A [`FrameLink`] walks through `frame_count` frames. The owner supplies a
//! provider mapping each frame index to a [`FrameDescriptor`] (how long the
//! frame lasts and whether its data still needs constructing) and an event
//! sink receiving [`FrameEvent`]s.
//!
//! # Lifecycle
//!
//! ```text
//!   Idle ──play──► Playing ──pause──► Paused
//!                    ▲                  │
//!                    └──────resume──────┘
//!   any ──invalidate / exhaustion / drop──► Invalid
//! ```
//!
//! # Boundary crossing
//!
//! Each tick while playing debits `tick.elapsed` from the current frame's
//! remaining budget. Once the budget reaches zero or below, the frame's
//! [`FrameEvent::PerformAction`] fires, the link advances, and the next
//! frame's duration is *added* to the (non-positive) remainder. The overshoot
//! of a late boundary is therefore charged to the following frame, so long
//! sequences do not drift. A coarse tick or a zero-length frame can cross
//! several boundaries in one tick.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::registry::{LinkId, LinkRegistry, TickHandler};
use crate::tick::Tick;
use crate::trace::{BoundaryEvent, ConstructEvent};

/// Frame budget assumed before the first descriptor is known, in seconds.
pub const NOMINAL_FRAME_DURATION: f64 = 1.0 / 60.0;

/// Timing and readiness of one frame slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameDescriptor {
    /// Seconds that must elapse before the frame's action fires.
    ///
    /// Zero or negative values are tolerated and fire on the same tick.
    pub duration: f64,
    /// When `false`, a [`FrameEvent::ConstructFrame`] precedes the frame's
    /// action.
    pub is_constructed: bool,
}

impl FrameDescriptor {
    /// A frame whose data is ready.
    #[inline]
    #[must_use]
    pub const fn new(duration: f64) -> Self {
        Self {
            duration,
            is_constructed: true,
        }
    }

    /// A frame that asks its owner to construct it before acting.
    #[inline]
    #[must_use]
    pub const fn deferred(duration: f64) -> Self {
        Self {
            duration,
            is_constructed: false,
        }
    }
}

/// Notification delivered to a link's event sink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameEvent {
    /// Prepare data for `frame`; its action follows later.
    ConstructFrame {
        /// Frame to construct.
        frame: usize,
    },
    /// The budget of `frame` has elapsed.
    PerformAction {
        /// Host time of the tick that crossed the boundary, in seconds.
        timestamp: f64,
        /// Seconds accumulated since the previous event of this link.
        elapsed: f64,
        /// Frame whose boundary was crossed.
        frame: usize,
    },
}

impl FrameEvent {
    /// The frame index this event refers to.
    #[inline]
    #[must_use]
    pub const fn frame(&self) -> usize {
        match *self {
            Self::ConstructFrame { frame } | Self::PerformAction { frame, .. } => frame,
        }
    }
}

/// Receiver of a link's [`FrameEvent`]s.
pub type EventSink = Box<dyn FnMut(FrameEvent)>;

type FrameProvider = Box<dyn Fn(usize) -> FrameDescriptor>;

/// Where a link is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkPhase {
    /// Constructed, never played.
    Idle,
    /// Registered and consuming ticks.
    Playing,
    /// Position kept, no ticks consumed.
    Paused,
    /// Terminal. No further events.
    Invalid,
}

/// Static shape of a timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkConfig {
    /// Number of frames (at least 1).
    pub frame_count: usize,
    /// Wrap to frame 0 after the last frame instead of terminating.
    pub repeats: bool,
    /// Upper bound on boundaries resolved within a single tick.
    ///
    /// Leftover debt carries into later ticks. Keeps a repeating link with
    /// zero-length frames from monopolizing the scheduling context.
    pub max_boundaries_per_tick: u32,
}

impl LinkConfig {
    /// Default for [`max_boundaries_per_tick`](Self::max_boundaries_per_tick).
    pub const DEFAULT_MAX_BOUNDARIES_PER_TICK: u32 = 1024;

    /// A sequence of `frame_count` frames played once.
    ///
    /// # Panics
    ///
    /// Panics if `frame_count` is zero.
    #[must_use]
    pub const fn once(frame_count: usize) -> Self {
        assert!(frame_count >= 1, "a frame link needs at least one frame");
        Self {
            frame_count,
            repeats: false,
            max_boundaries_per_tick: Self::DEFAULT_MAX_BOUNDARIES_PER_TICK,
        }
    }

    /// A sequence of `frame_count` frames that loops until invalidated.
    ///
    /// # Panics
    ///
    /// Panics if `frame_count` is zero.
    #[must_use]
    pub const fn repeating(frame_count: usize) -> Self {
        let mut config = Self::once(frame_count);
        config.repeats = true;
        config
    }

    /// A single frame fired over and over, for clock-style timelines.
    #[must_use]
    pub const fn clock() -> Self {
        Self::repeating(1)
    }

    /// Returns a copy with a different per-tick boundary cap.
    ///
    /// # Panics
    ///
    /// Panics if `max` is zero.
    #[must_use]
    pub const fn with_max_boundaries_per_tick(mut self, max: u32) -> Self {
        assert!(max >= 1, "at least one boundary per tick");
        self.max_boundaries_per_tick = max;
        self
    }
}

/// One logical timeline multiplexed onto a [`LinkRegistry`].
///
/// The owner holds the link by value. Dropping it invalidates the link, so a
/// forgotten link never keeps the shared clock running. Event callbacks that
/// need to control their own link use a [`LinkHandle`] from
/// [`handle`](Self::handle).
pub struct FrameLink {
    cell: Rc<LinkCell>,
}

/// Weak control handle to a [`FrameLink`].
///
/// Does not keep the link alive; every method is a no-op once the owning
/// [`FrameLink`] is gone.
#[derive(Clone)]
pub struct LinkHandle {
    cell: Weak<LinkCell>,
}

struct LinkCell {
    id: LinkId,
    registry: LinkRegistry,
    config: LinkConfig,
    provider: FrameProvider,
    handler: TickHandler,
    state: RefCell<LinkState>,
    sink: RefCell<Option<EventSink>>,
    /// Bumped whenever the sink is replaced or cleared, so an emission in
    /// progress knows not to restore the sink it took out.
    sink_epoch: Cell<u64>,
}

#[derive(Debug)]
struct LinkState {
    phase: LinkPhase,
    current_frame: usize,
    remaining: f64,
    accumulated: f64,
    boundaries_fired: u64,
}

impl FrameLink {
    /// Creates an idle link on `registry`.
    ///
    /// `provider` is consulted once per visit to a frame, right after the
    /// previous frame's action (or on [`play`](Self::play) for frame 0).
    ///
    /// # Panics
    ///
    /// Panics if `config.frame_count` or `config.max_boundaries_per_tick` is
    /// zero.
    pub fn new(
        registry: &LinkRegistry,
        config: LinkConfig,
        provider: impl Fn(usize) -> FrameDescriptor + 'static,
    ) -> Self {
        assert!(
            config.frame_count >= 1,
            "a frame link needs at least one frame"
        );
        assert!(
            config.max_boundaries_per_tick >= 1,
            "at least one boundary per tick"
        );

        let id = registry.allocate_id();
        let cell = Rc::new_cyclic(|weak: &Weak<LinkCell>| {
            let weak = weak.clone();
            let handler: TickHandler = Rc::new(move |tick: &Tick| {
                if let Some(cell) = weak.upgrade() {
                    cell.on_tick(tick);
                }
            });
            LinkCell {
                id,
                registry: registry.clone(),
                config,
                provider: Box::new(provider),
                handler,
                state: RefCell::new(LinkState {
                    phase: LinkPhase::Idle,
                    current_frame: 0,
                    remaining: NOMINAL_FRAME_DURATION,
                    accumulated: 0.0,
                    boundaries_fired: 0,
                }),
                sink: RefCell::new(None),
                sink_epoch: Cell::new(0),
            }
        });
        Self { cell }
    }

    /// Starts the timeline, delivering events to `sink`.
    ///
    /// From [`LinkPhase::Idle`], registers with the registry and loads frame
    /// 0; if frame 0 is deferred, its [`FrameEvent::ConstructFrame`] is
    /// delivered before this returns. On a playing link only the sink is
    /// replaced; on a paused link the sink is replaced and the link resumes.
    /// An invalid link ignores the call.
    pub fn play(&self, sink: impl FnMut(FrameEvent) + 'static) {
        self.cell.play(Box::new(sink));
    }

    /// Stops consuming ticks, keeping the current frame and its remaining
    /// budget. Idempotent.
    pub fn pause(&self) {
        self.cell.pause();
    }

    /// Continues a paused link where it left off. No-op in any other phase.
    pub fn resume(&self) {
        self.cell.resume();
    }

    /// Ends the timeline for good. Idempotent.
    pub fn invalidate(&self) {
        self.cell.invalidate();
    }

    /// Replaces the event sink without touching the timeline.
    ///
    /// Ignored once the link is invalid.
    pub fn set_event_sink(&self, sink: impl FnMut(FrameEvent) + 'static) {
        self.cell.install_sink(Box::new(sink));
    }

    /// Returns a weak control handle for use inside event callbacks.
    #[must_use]
    pub fn handle(&self) -> LinkHandle {
        LinkHandle {
            cell: Rc::downgrade(&self.cell),
        }
    }

    /// This link's identity in its registry.
    #[must_use]
    pub fn id(&self) -> LinkId {
        self.cell.id
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> LinkPhase {
        self.cell.state.borrow().phase
    }

    /// Returns `true` while playing.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase() == LinkPhase::Playing
    }

    /// Index of the frame whose boundary is pending.
    #[must_use]
    pub fn current_frame(&self) -> usize {
        self.cell.state.borrow().current_frame
    }

    /// Seconds left before the current frame's boundary.
    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.cell.state.borrow().remaining
    }

    /// Seconds accumulated since the last event, for drift diagnostics.
    #[must_use]
    pub fn accumulated_since_last_event(&self) -> f64 {
        self.cell.state.borrow().accumulated
    }

    /// Total [`FrameEvent::PerformAction`] events fired so far.
    #[must_use]
    pub fn boundaries_fired(&self) -> u64 {
        self.cell.state.borrow().boundaries_fired
    }

    /// Number of frames in the sequence.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.cell.config.frame_count
    }

    /// Whether the sequence loops.
    #[must_use]
    pub fn repeats(&self) -> bool {
        self.cell.config.repeats
    }
}

impl Drop for FrameLink {
    fn drop(&mut self) {
        self.cell.invalidate();
    }
}

impl fmt::Debug for FrameLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.cell.state.borrow();
        f.debug_struct("FrameLink")
            .field("id", &self.cell.id)
            .field("config", &self.cell.config)
            .field("phase", &state.phase)
            .field("current_frame", &state.current_frame)
            .field("remaining", &state.remaining)
            .finish_non_exhaustive()
    }
}

impl LinkHandle {
    /// See [`FrameLink::pause`].
    pub fn pause(&self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.pause();
        }
    }

    /// See [`FrameLink::resume`].
    pub fn resume(&self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.resume();
        }
    }

    /// See [`FrameLink::invalidate`].
    pub fn invalidate(&self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.invalidate();
        }
    }

    /// See [`FrameLink::set_event_sink`].
    pub fn set_event_sink(&self, sink: impl FnMut(FrameEvent) + 'static) {
        if let Some(cell) = self.cell.upgrade() {
            cell.install_sink(Box::new(sink));
        }
    }

    /// Current phase, or [`LinkPhase::Invalid`] if the link was dropped.
    #[must_use]
    pub fn phase(&self) -> LinkPhase {
        self.cell
            .upgrade()
            .map_or(LinkPhase::Invalid, |cell| cell.state.borrow().phase)
    }

    /// Current frame, or `None` if the link was dropped.
    #[must_use]
    pub fn current_frame(&self) -> Option<usize> {
        self.cell
            .upgrade()
            .map(|cell| cell.state.borrow().current_frame)
    }
}

impl fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkHandle")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

// No `RefCell` borrow is held while user code (provider or sink) runs: the
// sink may pause, resume, invalidate or re-sink this link, and may create or
// drop other links on the same registry.
impl LinkCell {
    fn play(&self, sink: EventSink) {
        let phase = self.state.borrow().phase;
        match phase {
            LinkPhase::Invalid => {}
            LinkPhase::Playing => self.install_sink(sink),
            LinkPhase::Paused => {
                self.install_sink(sink);
                self.resume();
            }
            LinkPhase::Idle => {
                self.install_sink(sink);
                self.state.borrow_mut().phase = LinkPhase::Playing;
                self.registry.register(self.id, Rc::clone(&self.handler));

                let frame = self.state.borrow().current_frame;
                let descriptor = (self.provider)(frame);
                {
                    let mut state = self.state.borrow_mut();
                    state.remaining = descriptor.duration;
                    state.accumulated = 0.0;
                }
                if !descriptor.is_constructed {
                    self.construct(frame);
                }
            }
        }
    }

    fn pause(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.phase != LinkPhase::Playing {
                return;
            }
            state.phase = LinkPhase::Paused;
        }
        self.registry.unregister(self.id);
    }

    fn resume(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.phase != LinkPhase::Paused {
                return;
            }
            state.phase = LinkPhase::Playing;
        }
        self.registry.register(self.id, Rc::clone(&self.handler));
    }

    fn invalidate(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.phase == LinkPhase::Invalid {
                return;
            }
            state.phase = LinkPhase::Invalid;
        }
        self.sink_epoch.set(self.sink_epoch.get() + 1);
        let old_sink = self.sink.borrow_mut().take();
        drop(old_sink);
        self.registry.unregister(self.id);
    }

    fn install_sink(&self, sink: EventSink) {
        if self.state.borrow().phase == LinkPhase::Invalid {
            return;
        }
        self.sink_epoch.set(self.sink_epoch.get() + 1);
        let old_sink = self.sink.borrow_mut().replace(sink);
        drop(old_sink);
    }

    fn emit(&self, event: FrameEvent) {
        let Some(mut sink) = self.sink.borrow_mut().take() else {
            return;
        };
        let epoch = self.sink_epoch.get();
        sink(event);
        if self.sink_epoch.get() == epoch {
            let mut slot = self.sink.borrow_mut();
            if slot.is_none() {
                *slot = Some(sink);
            }
        }
    }

    fn construct(&self, frame: usize) {
        self.registry
            .trace_construct(&ConstructEvent { link: self.id, frame });
        self.emit(FrameEvent::ConstructFrame { frame });
    }

    fn on_tick(&self, tick: &Tick) {
        {
            let mut state = self.state.borrow_mut();
            if state.phase != LinkPhase::Playing {
                return;
            }
            state.remaining -= tick.elapsed;
            state.accumulated += tick.elapsed;
        }

        for _ in 0..self.config.max_boundaries_per_tick {
            let (frame, elapsed, overshoot) = {
                let mut state = self.state.borrow_mut();
                if state.phase != LinkPhase::Playing || state.remaining > 0.0 {
                    return;
                }
                state.boundaries_fired += 1;
                (state.current_frame, state.accumulated, -state.remaining)
            };

            self.registry.trace_boundary(&BoundaryEvent {
                link: self.id,
                frame,
                timestamp: tick.timestamp,
                elapsed,
                overshoot,
            });
            self.emit(FrameEvent::PerformAction {
                timestamp: tick.timestamp,
                elapsed,
                frame,
            });

            if !self.advance() {
                return;
            }
        }
    }

    /// Moves past the frame whose action just fired. Returns `false` once the
    /// link is invalid, either because the sink invalidated it or because a
    /// non-repeating sequence ran out.
    fn advance(&self) -> bool {
        let next = {
            let mut state = self.state.borrow_mut();
            if state.phase == LinkPhase::Invalid {
                return false;
            }
            let mut next = state.current_frame + 1;
            if next >= self.config.frame_count {
                if !self.config.repeats {
                    None
                } else {
                    next = 0;
                    state.current_frame = next;
                    Some(next)
                }
            } else {
                state.current_frame = next;
                Some(next)
            }
        };

        let Some(next) = next else {
            self.invalidate();
            self.registry.trace_exhausted(self.id);
            return false;
        };

        let descriptor = (self.provider)(next);
        {
            let mut state = self.state.borrow_mut();
            // Additive: the overshoot of the boundary just crossed is charged
            // to this frame.
            state.remaining += descriptor.duration;
            state.accumulated = 0.0;
        }
        if !descriptor.is_constructed {
            self.construct(next);
        }
        // A construct callback may have invalidated the link.
        self.state.borrow().phase != LinkPhase::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::{ManualTickSource, TickSource};
    use alloc::vec;
    use alloc::vec::Vec;

    type Log = Rc<RefCell<Vec<FrameEvent>>>;

    fn setup() -> (ManualTickSource, LinkRegistry) {
        let source = ManualTickSource::new();
        let registry = LinkRegistry::new(source.clone());
        (source, registry)
    }

    fn logging_sink(log: &Log) -> impl FnMut(FrameEvent) + 'static {
        let log = Rc::clone(log);
        move |event| log.borrow_mut().push(event)
    }

    fn actions(log: &Log) -> Vec<usize> {
        log.borrow()
            .iter()
            .filter_map(|e| match e {
                FrameEvent::PerformAction { frame, .. } => Some(*frame),
                FrameEvent::ConstructFrame { .. } => None,
            })
            .collect()
    }

    fn action_timestamps(log: &Log) -> Vec<f64> {
        log.borrow()
            .iter()
            .filter_map(|e| match e {
                FrameEvent::PerformAction { timestamp, .. } => Some(*timestamp),
                FrameEvent::ConstructFrame { .. } => None,
            })
            .collect()
    }

    #[test]
    fn play_once_fires_every_frame_then_invalidates() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(4, false, |_| FrameDescriptor::new(0.05));

        link.play(logging_sink(&log));
        assert!(link.is_active());
        assert!(source.is_running(), "first link engages the clock");

        let delivered = source.run_while_running(0.01, 1_000);
        assert_eq!(actions(&log), [0, 1, 2, 3]);
        assert_eq!(link.phase(), LinkPhase::Invalid);
        assert!(registry.is_empty(), "exhausted link unregisters itself");
        assert!(!source.is_running(), "and the clock stops with it");
        assert!(delivered <= 21, "stopped right after the last frame");

        source.start();
        source.advance_by(0.1, 5);
        assert_eq!(actions(&log).len(), 4, "nothing after exhaustion");
    }

    #[test]
    fn repeating_link_cycles_until_invalidated() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(3, true, |_| FrameDescriptor::new(0.02));
        let handle = link.handle();
        let sink_log = Rc::clone(&log);
        link.play(move |event| {
            sink_log.borrow_mut().push(event);
            if sink_log.borrow().len() == 10 {
                handle.invalidate();
            }
        });

        source.run_while_running(0.005, 10_000);
        assert_eq!(actions(&log), [0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(link.phase(), LinkPhase::Invalid);
        assert!(!source.is_running());
    }

    #[test]
    fn single_frame_repeating_clock() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = FrameLink::new(&registry, LinkConfig::clock(), |_| {
            FrameDescriptor::new(0.125)
        });
        link.play(logging_sink(&log));

        source.advance_by(0.031_25, 40);
        assert_eq!(actions(&log), vec![0; 10]);
        assert!(link.is_active(), "clock links never exhaust");
    }

    #[test]
    fn construct_precedes_action_once_per_visit() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(3, true, |frame| {
            if frame == 1 {
                FrameDescriptor::new(0.125)
            } else {
                FrameDescriptor::deferred(0.125)
            }
        });

        link.play(logging_sink(&log));
        assert_eq!(
            *log.borrow(),
            [FrameEvent::ConstructFrame { frame: 0 }],
            "frame 0 constructed synchronously inside play"
        );

        source.advance_by(0.0625, 12);
        let kinds: Vec<(bool, usize)> = log
            .borrow()
            .iter()
            .map(|e| (matches!(e, FrameEvent::ConstructFrame { .. }), e.frame()))
            .collect();
        assert_eq!(
            kinds,
            [
                (true, 0),
                (false, 0),
                (false, 1),
                (true, 2),
                (false, 2),
                (true, 0),
                (false, 0),
                (false, 1),
                (true, 2),
                (false, 2),
                (true, 0),
            ]
        );
    }

    #[test]
    fn overshoot_carries_into_next_frame() {
        let (source, registry) = setup();
        let log = Log::default();
        // Exact binary fractions: 5/32 s frames, 1/16 s ticks.
        let link = registry.create(4, false, |_| FrameDescriptor::new(0.156_25));
        link.play(logging_sink(&log));

        source.run_while_running(0.0625, 100);
        // Boundaries at 5/32, 10/32, 15/32, 20/32 land on ticks 3, 5, 8, 10.
        assert_eq!(action_timestamps(&log), [0.1875, 0.3125, 0.5, 0.625]);
    }

    #[test]
    fn coarse_tick_and_zero_durations_fire_several_boundaries() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(4, false, |frame| match frame {
            0 | 3 => FrameDescriptor::new(0.125),
            _ => FrameDescriptor::new(0.0),
        });
        link.play(logging_sink(&log));

        source.advance(0.125);
        assert_eq!(actions(&log), [0, 1, 2], "one tick, three boundaries");
        source.advance(0.125);
        assert_eq!(actions(&log), [0, 1, 2, 3]);
        assert_eq!(link.phase(), LinkPhase::Invalid);
    }

    #[test]
    fn negative_duration_debits_the_next_frame() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(3, false, |frame| match frame {
            1 => FrameDescriptor::new(-0.0625),
            _ => FrameDescriptor::new(0.125),
        });
        link.play(logging_sink(&log));

        source.advance(0.125);
        assert_eq!(actions(&log), [0, 1], "negative frame fires on the same tick");
        assert!(
            (link.remaining() - 0.0625).abs() < 1e-12,
            "debt carried into frame 2, got {}",
            link.remaining()
        );
        assert_eq!(link.current_frame(), 2);

        source.advance(0.0625);
        assert_eq!(actions(&log), [0, 1, 2]);
        assert_eq!(link.phase(), LinkPhase::Invalid);
    }

    #[test]
    fn boundary_cap_bounds_work_per_tick() {
        let (source, registry) = setup();
        let log = Log::default();
        let config = LinkConfig::clock().with_max_boundaries_per_tick(8);
        let link = FrameLink::new(&registry, config, |_| FrameDescriptor::new(0.0));
        link.play(logging_sink(&log));

        source.advance(0.01);
        assert_eq!(actions(&log).len(), 8);
        source.advance(0.01);
        assert_eq!(actions(&log).len(), 16);
    }

    #[test]
    fn pause_and_resume_preserve_position() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(3, false, |_| FrameDescriptor::new(0.125));
        link.play(logging_sink(&log));

        source.advance_by(0.0625, 3);
        assert_eq!(actions(&log), [0]);
        assert!((link.remaining() - 0.0625).abs() < 1e-12, "half of frame 1 left");

        link.pause();
        link.pause();
        assert_eq!(link.phase(), LinkPhase::Paused);
        assert!(!source.is_running(), "only link paused: clock disengaged");
        assert_eq!(source.stop_count(), 1, "second pause is a no-op");

        source.advance(5.0);
        assert_eq!(actions(&log), [0], "no events while paused");

        link.resume();
        assert!(source.is_running());
        source.advance(0.0625);
        assert_eq!(actions(&log), [0, 1], "frame 1 neither skipped nor repeated");
        let elapsed = last_elapsed(&log);
        assert!(
            (elapsed - 0.125).abs() < 1e-12,
            "paused time excluded, got {elapsed}"
        );
    }

    fn last_elapsed(log: &Log) -> f64 {
        log.borrow()
            .iter()
            .rev()
            .find_map(|e| match e {
                FrameEvent::PerformAction { elapsed, .. } => Some(*elapsed),
                FrameEvent::ConstructFrame { .. } => None,
            })
            .unwrap_or(f64::NAN)
    }

    #[test]
    fn pause_from_callback_still_advances() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(4, false, |_| FrameDescriptor::new(0.05));
        let handle = link.handle();
        let sink_log = Rc::clone(&log);
        link.play(move |event| {
            sink_log.borrow_mut().push(event);
            handle.pause();
        });

        // One coarse tick would cross every boundary; the pause stops it at one.
        source.advance(1.0);
        assert_eq!(actions(&log), [0], "pause ends the boundary loop");
        assert_eq!(link.current_frame(), 1, "advanced past the acted frame");
        assert!(link.remaining() < 0.0, "overdue budget is kept while paused");

        link.resume();
        source.advance(0.01);
        assert_eq!(actions(&log), [0, 1], "one more boundary, then paused again");
        assert_eq!(link.phase(), LinkPhase::Paused);
    }

    #[test]
    fn resume_only_applies_to_paused_links() {
        let (source, registry) = setup();
        let link = registry.create(2, false, |_| FrameDescriptor::new(0.1));
        link.resume();
        assert_eq!(link.phase(), LinkPhase::Idle);
        assert!(!source.is_running(), "resume on idle link does not register");
    }

    #[test]
    fn invalidate_from_own_callback_stops_mid_tick() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(10, false, |_| FrameDescriptor::new(0.01));
        let handle = link.handle();
        let sink_log = Rc::clone(&log);
        link.play(move |event| {
            sink_log.borrow_mut().push(event);
            if event.frame() == 2 {
                handle.invalidate();
            }
        });

        source.advance(1.0);
        assert_eq!(actions(&log), [0, 1, 2]);
        assert_eq!(link.phase(), LinkPhase::Invalid);
        assert!(!source.is_running());

        link.invalidate();
        link.play(|_| unreachable!("invalid links ignore play"));
        assert_eq!(link.phase(), LinkPhase::Invalid);
    }

    #[test]
    fn dropping_the_owner_unregisters() {
        let (source, registry) = setup();
        let link = registry.create(5, true, |_| FrameDescriptor::new(0.1));
        let handle = link.handle();
        link.play(|_| {});
        assert_eq!(registry.len(), 1);

        drop(link);
        assert!(registry.is_empty());
        assert!(!source.is_running(), "dropped link releases the clock");
        assert_eq!(handle.phase(), LinkPhase::Invalid);
        assert_eq!(handle.current_frame(), None);
        handle.pause();
    }

    #[test]
    fn sink_swap_keeps_the_timeline() {
        let (source, registry) = setup();
        let first = Log::default();
        let second = Log::default();
        let link = registry.create(4, false, |_| FrameDescriptor::new(0.125));
        link.play(logging_sink(&first));

        source.advance_by(0.125, 2);
        link.play(logging_sink(&second));
        source.advance_by(0.125, 2);

        assert_eq!(actions(&first), [0, 1]);
        assert_eq!(actions(&second), [2, 3]);
    }

    #[test]
    fn sink_swapped_inside_callback_takes_over() {
        let (source, registry) = setup();
        let first = Log::default();
        let second = Log::default();
        let link = registry.create(3, false, |_| FrameDescriptor::new(0.125));
        let handle = link.handle();
        let first_in = Rc::clone(&first);
        let second_sink = RefCell::new(Some(logging_sink(&second)));
        link.play(move |event| {
            first_in.borrow_mut().push(event);
            if let Some(next) = second_sink.borrow_mut().take() {
                handle.set_event_sink(next);
            }
        });

        source.advance_by(0.125, 3);
        assert_eq!(actions(&first), [0]);
        assert_eq!(actions(&second), [1, 2]);
    }

    #[test]
    fn play_on_paused_link_resumes_with_new_sink() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(3, false, |_| FrameDescriptor::new(0.125));
        link.play(|_| {});
        link.pause();

        link.play(logging_sink(&log));
        assert!(link.is_active());
        source.advance(0.125);
        assert_eq!(actions(&log), [0]);
    }

    #[test]
    fn links_share_one_clock() {
        let (source, registry) = setup();
        let counts: Vec<Rc<Cell<u32>>> = (0..5).map(|_| Rc::new(Cell::new(0))).collect();
        let links: Vec<FrameLink> = counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                let link = registry.create(i + 1, false, move |_| {
                    FrameDescriptor::new(0.015_625 * (i + 1) as f64)
                });
                let count = Rc::clone(count);
                link.play(move |event| {
                    if matches!(event, FrameEvent::PerformAction { .. }) {
                        count.set(count.get() + 1);
                    }
                });
                link
            })
            .collect();

        source.run_while_running(0.001, 100_000);
        let fired: Vec<u32> = counts.iter().map(|c| c.get()).collect();
        assert_eq!(fired, [1, 2, 3, 4, 5]);
        assert!(links.iter().all(|l| l.phase() == LinkPhase::Invalid));
        assert_eq!(source.start_count(), 1, "engaged once for the batch");
        assert_eq!(source.stop_count(), 1, "disengaged once after the last");
    }

    #[test]
    fn link_created_inside_a_callback_joins_next_tick() {
        let (source, registry) = setup();
        let spawned: Rc<RefCell<Vec<FrameLink>>> = Rc::default();
        let spawned_log = Log::default();
        let bystander = Log::default();

        let watcher = registry.create(1, true, |_| FrameDescriptor::new(0.01));
        watcher.play(logging_sink(&bystander));

        let spawner = registry.create(1, false, |_| FrameDescriptor::new(0.01));
        let registry_in = registry.clone();
        let spawned_in = Rc::clone(&spawned);
        let spawned_log_in = Rc::clone(&spawned_log);
        spawner.play(move |_| {
            let child = registry_in.create(2, false, |_| FrameDescriptor::new(0.01));
            child.play(logging_sink(&spawned_log_in));
            spawned_in.borrow_mut().push(child);
        });

        source.advance(0.01);
        assert_eq!(actions(&spawned_log), Vec::<usize>::new());
        assert_eq!(spawner.phase(), LinkPhase::Invalid);
        source.advance(0.01);
        source.advance(0.01);
        assert_eq!(actions(&spawned_log), [0, 1]);
        assert_eq!(actions(&bystander), [0, 0, 0], "one event per tick");
    }

    #[test]
    #[should_panic(expected = "at least one frame")]
    fn zero_frames_is_rejected() {
        let (_, registry) = setup();
        let _ = registry.create(0, false, |_| FrameDescriptor::new(0.1));
    }

    #[test]
    fn varying_durations_space_actions_by_their_frame() {
        let (source, registry) = setup();
        let log = Log::default();
        let link = registry.create(5, true, |frame| {
            FrameDescriptor::new(0.02 * (frame + 1) as f64)
        });
        let handle = link.handle();
        let sink_log = Rc::clone(&log);
        let mut count = 0;
        link.play(move |event| {
            sink_log.borrow_mut().push(event);
            count += 1;
            if count == 100 {
                handle.invalidate();
            }
        });

        let start = source.now();
        source.run_while_running(0.001, 1_000_000);
        let stamps = action_timestamps(&log);
        assert_eq!(stamps.len(), 100);

        let mut previous = start;
        for (i, stamp) in stamps.iter().enumerate() {
            let expected = 0.02 * (i % 5 + 1) as f64;
            let gap = stamp - previous;
            assert!(
                (gap - expected).abs() <= 0.0015,
                "gap before action {i} was {gap}, expected {expected}"
            );
            previous = *stamp;
        }
        assert_eq!(actions(&log)[..10], [0, 1, 2, 3, 4, 0, 1, 2, 3, 4]);
    }
}
