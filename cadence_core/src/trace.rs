// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the tick multiplexer.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! registry and links call as ticks flow through them. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! The registry holds its sink inside a [`Tracer`]. Without the `trace`
//! feature the tracer stores nothing and its methods are empty, so call sites
//! cost nothing. With it, every call checks for an installed sink and
//! forwards.
//!
//! Sinks must not call back into the registry or any link.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::registry::LinkId;
use crate::tick::Tick;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the registry dispatches a tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickEvent {
    /// Source-assigned tick counter.
    pub index: u64,
    /// Host time of the tick, in seconds.
    pub timestamp: f64,
    /// Seconds since the previous tick.
    pub elapsed: f64,
    /// Number of links the tick is fanned out to.
    pub links: usize,
}

impl TickEvent {
    /// Creates a `TickEvent` from a [`Tick`] plus the current link count.
    #[must_use]
    pub fn new(tick: &Tick, links: usize) -> Self {
        Self {
            index: tick.index,
            timestamp: tick.timestamp,
            elapsed: tick.elapsed,
            links,
        }
    }
}

/// Emitted when the registry engages or disengages its tick source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClockEvent {
    /// `true` on engage, `false` on disengage.
    pub engaged: bool,
    /// Ticks dispatched by the registry before this transition.
    pub ticks_dispatched: u64,
}

/// What happened to a link's registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkEventKind {
    /// The link's tick handler was added (play or resume).
    Registered,
    /// The link's tick handler was removed (pause, invalidate or drop).
    Unregistered,
    /// A non-repeating link ran past its last frame.
    Exhausted,
}

/// Emitted on link registration changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LinkEvent {
    /// Which link.
    pub link: LinkId,
    /// What happened.
    pub kind: LinkEventKind,
    /// Registered links after the change.
    pub active_links: usize,
}

/// Emitted each time a link crosses a frame boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryEvent {
    /// Which link.
    pub link: LinkId,
    /// Frame whose action fires.
    pub frame: usize,
    /// Host time of the tick that crossed the boundary, in seconds.
    pub timestamp: f64,
    /// Seconds folded into this event since the previous one.
    pub elapsed: f64,
    /// Seconds the boundary was crossed late; carried into the next frame.
    pub overshoot: f64,
}

/// Emitted when a link asks its owner to construct a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstructEvent {
    /// Which link.
    pub link: LinkId,
    /// Frame to construct.
    pub frame: usize,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the registry and its links.
///
/// Every method defaults to doing nothing.
pub trait TraceSink {
    /// Called when a tick is dispatched.
    fn on_tick(&mut self, e: &TickEvent) {
        _ = e;
    }

    /// Called when the tick source is engaged or disengaged.
    fn on_clock(&mut self, e: &ClockEvent) {
        _ = e;
    }

    /// Called on link registration changes.
    fn on_link(&mut self, e: &LinkEvent) {
        _ = e;
    }

    /// Called when a link crosses a frame boundary.
    fn on_boundary(&mut self, e: &BoundaryEvent) {
        _ = e;
    }

    /// Called when a link emits a construct request.
    fn on_construct(&mut self, e: &ConstructEvent) {
        _ = e;
    }
}

/// Shared sinks, so the caller can keep a handle to a recorder it installed.
impl<T: TraceSink + ?Sized> TraceSink for Rc<RefCell<T>> {
    fn on_tick(&mut self, e: &TickEvent) {
        self.borrow_mut().on_tick(e);
    }

    fn on_clock(&mut self, e: &ClockEvent) {
        self.borrow_mut().on_clock(e);
    }

    fn on_link(&mut self, e: &LinkEvent) {
        self.borrow_mut().on_link(e);
    }

    fn on_boundary(&mut self, e: &BoundaryEvent) {
        self.borrow_mut().on_boundary(e);
    }

    fn on_construct(&mut self, e: &ConstructEvent) {
        self.borrow_mut().on_construct(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owner of an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing and
/// the sink passed to [`Tracer::new`] is dropped immediately. When **on**,
/// each method checks the inner `Option` (one branch) before dispatching.
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::none()
    }
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn TraceSink>) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            drop(sink);
            Self {}
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {}
        }
    }

    /// Returns `true` if events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits a [`TickEvent`].
    #[inline]
    pub fn tick(&mut self, e: &TickEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_tick(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ClockEvent`].
    #[inline]
    pub fn clock(&mut self, e: &ClockEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_clock(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LinkEvent`].
    #[inline]
    pub fn link(&mut self, e: &LinkEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_link(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`BoundaryEvent`].
    #[inline]
    pub fn boundary(&mut self, e: &BoundaryEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_boundary(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`ConstructEvent`].
    #[inline]
    pub fn construct(&mut self, e: &ConstructEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_construct(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
