// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared tick multiplexer.
//!
//! [`LinkRegistry`] owns one [`TickSource`] and a map of tick handlers keyed
//! by [`LinkId`]. Each tick from the source is fanned out to every registered
//! handler. The source is engaged when the first handler registers and
//! disengaged when the last one leaves, so an idle process keeps no display
//! callback alive.
//!
//! The registry is an ordinary value passed to the links that use it; clones
//! share state. Handlers may register or unregister links (including
//! themselves) while a tick is being dispatched: dispatch iterates over a
//! snapshot and re-checks membership before each call.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use hashbrown::HashMap;

use crate::link::{FrameDescriptor, FrameLink, LinkConfig};
use crate::tick::{Tick, TickSource};
use crate::trace::{
    BoundaryEvent, ClockEvent, ConstructEvent, LinkEvent, LinkEventKind, TickEvent, TraceSink,
    Tracer,
};

/// Identifies a registered timeline.
///
/// Allocated by [`LinkRegistry::allocate_id`]; never reused within a registry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LinkId(pub u64);

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({})", self.0)
    }
}

/// Per-link tick callback stored by the registry.
pub type TickHandler = Rc<dyn Fn(&Tick)>;

/// Shared multiplexer from one [`TickSource`] to many links.
///
/// # Usage
///
/// ```rust
/// use cadence_core::{FrameDescriptor, FrameEvent, LinkRegistry, ManualTickSource, TickSource};
///
/// let source = ManualTickSource::new();
/// let registry = LinkRegistry::new(source.clone());
///
/// let link = registry.create(3, false, |_| FrameDescriptor::new(0.1));
/// link.play(|event| {
///     if let FrameEvent::PerformAction { frame, .. } = event {
///         assert!(frame < 3);
///     }
/// });
/// assert!(source.is_running());
///
/// source.run_while_running(0.01, 1_000);
/// assert!(!registry.is_clock_running());
/// ```
#[derive(Clone)]
pub struct LinkRegistry {
    inner: Rc<RegistryInner>,
}

struct RegistryInner {
    source: Box<dyn TickSource>,
    handlers: RefCell<HashMap<LinkId, TickHandler>>,
    next_id: Cell<u64>,
    clock_running: Cell<bool>,
    ticks_dispatched: Cell<u64>,
    tracer: RefCell<Tracer>,
}

impl LinkRegistry {
    /// Creates a registry that drives its links from `source`.
    ///
    /// The registry becomes the source's only sink. The source is left
    /// stopped until a link registers.
    pub fn new(source: impl TickSource + 'static) -> Self {
        let inner = Rc::new(RegistryInner {
            source: Box::new(source),
            handlers: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            clock_running: Cell::new(false),
            ticks_dispatched: Cell::new(0),
            tracer: RefCell::new(Tracer::none()),
        });

        let weak = Rc::downgrade(&inner);
        inner.source.set_sink(Rc::new(move |tick| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(&tick);
            }
        }));

        Self { inner }
    }

    /// Creates a link on this registry. See [`FrameLink::new`].
    ///
    /// # Panics
    ///
    /// Panics if `frame_count` is zero.
    pub fn create(
        &self,
        frame_count: usize,
        repeats: bool,
        provider: impl Fn(usize) -> FrameDescriptor + 'static,
    ) -> FrameLink {
        let config = if repeats {
            LinkConfig::repeating(frame_count)
        } else {
            LinkConfig::once(frame_count)
        };
        FrameLink::new(self, config, provider)
    }

    /// Returns a fresh identity for a link.
    #[must_use]
    pub fn allocate_id(&self) -> LinkId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        LinkId(id)
    }

    /// Registers `handler` for `link`, engaging the tick source if this is
    /// the first entry.
    ///
    /// Registering an already registered link replaces its handler. A link
    /// registered during a dispatch first sees the next tick.
    pub fn register(&self, link: LinkId, handler: TickHandler) {
        let active = {
            let mut handlers = self.inner.handlers.borrow_mut();
            handlers.insert(link, handler);
            handlers.len()
        };
        self.inner.trace_link(link, LinkEventKind::Registered, active);
        if !self.inner.clock_running.get() {
            self.inner.engage();
        }
    }

    /// Removes the entry for `link`, if any, disengaging the tick source when
    /// none remain.
    ///
    /// Unregistering an unknown link is a no-op. A link unregistered during a
    /// dispatch receives no further ticks, including the one in flight.
    pub fn unregister(&self, link: LinkId) {
        let (removed, active) = {
            let mut handlers = self.inner.handlers.borrow_mut();
            let removed = handlers.remove(&link).is_some();
            (removed, handlers.len())
        };
        if !removed {
            return;
        }
        self.inner
            .trace_link(link, LinkEventKind::Unregistered, active);
        if active == 0 && self.inner.clock_running.get() {
            self.inner.disengage();
        }
    }

    /// Delivers `tick` to every registered handler, at most once each.
    ///
    /// Tick sources call this through the sink installed by
    /// [`new`](Self::new); calling it directly is useful for offline stepping.
    pub fn dispatch(&self, tick: &Tick) {
        self.inner.dispatch(tick);
    }

    /// Returns `true` if `link` currently receives ticks.
    #[must_use]
    pub fn is_registered(&self, link: LinkId) -> bool {
        self.inner.handlers.borrow().contains_key(&link)
    }

    /// Returns `true` while the tick source is engaged.
    #[must_use]
    pub fn is_clock_running(&self) -> bool {
        self.inner.clock_running.get()
    }

    /// Number of registered links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    /// Returns `true` if no link is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.handlers.borrow().is_empty()
    }

    /// Number of ticks dispatched so far.
    #[must_use]
    pub fn ticks_dispatched(&self) -> u64 {
        self.inner.ticks_dispatched.get()
    }

    /// Routes trace events to `sink`. Only effective with the `trace`
    /// feature.
    pub fn set_trace_sink(&self, sink: impl TraceSink + 'static) {
        *self.inner.tracer.borrow_mut() = Tracer::new(Box::new(sink));
    }

    /// Stops routing trace events.
    pub fn clear_trace_sink(&self) {
        *self.inner.tracer.borrow_mut() = Tracer::none();
    }

    pub(crate) fn trace_boundary(&self, e: &BoundaryEvent) {
        self.inner.tracer.borrow_mut().boundary(e);
    }

    pub(crate) fn trace_construct(&self, e: &ConstructEvent) {
        self.inner.tracer.borrow_mut().construct(e);
    }

    pub(crate) fn trace_exhausted(&self, link: LinkId) {
        let active = self.len();
        self.inner.trace_link(link, LinkEventKind::Exhausted, active);
    }
}

impl RegistryInner {
    fn dispatch(&self, tick: &Tick) {
        let snapshot: Vec<(LinkId, TickHandler)> = self
            .handlers
            .borrow()
            .iter()
            .map(|(id, handler)| (*id, Rc::clone(handler)))
            .collect();

        self.ticks_dispatched.set(self.ticks_dispatched.get() + 1);
        self.tracer
            .borrow_mut()
            .tick(&TickEvent::new(tick, snapshot.len()));

        for (id, handler) in snapshot {
            // Skip links removed earlier in this pass.
            let live = self.handlers.borrow().contains_key(&id);
            if live {
                handler(tick);
            }
        }
    }

    fn engage(&self) {
        self.clock_running.set(true);
        self.tracer.borrow_mut().clock(&ClockEvent {
            engaged: true,
            ticks_dispatched: self.ticks_dispatched.get(),
        });
        self.source.start();
    }

    fn disengage(&self) {
        self.clock_running.set(false);
        self.tracer.borrow_mut().clock(&ClockEvent {
            engaged: false,
            ticks_dispatched: self.ticks_dispatched.get(),
        });
        self.source.stop();
    }

    fn trace_link(&self, link: LinkId, kind: LinkEventKind, active_links: usize) {
        self.tracer.borrow_mut().link(&LinkEvent {
            link,
            kind,
            active_links,
        });
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        if self.clock_running.get() {
            self.source.stop();
        }
    }
}

impl fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkRegistry")
            .field("links", &self.len())
            .field("clock_running", &self.is_clock_running())
            .field("ticks_dispatched", &self.ticks_dispatched())
            .finish_non_exhaustive()
    }
}
