// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame-clock multiplexing for display-refresh driven timelines.
//!
//! `cadence_core` takes one periodic hardware tick (a display link, a
//! `requestAnimationFrame` loop, a paced timer) and fans it out to any number
//! of independent logical timelines. Each timeline is a [`FrameLink`]: a
//! sequence of frames with per-frame durations that fires an event whenever
//! accumulated tick time crosses a frame boundary. It is `no_std` compatible
//! (with `alloc`).
//!
//! # Architecture
//!
//! ```text
//!   TickSource (display link, paced loop, test double)
//!       │ Tick { timestamp, elapsed }
//!       ▼
//!   LinkRegistry::dispatch() ──► FrameLink tick handler (per live link)
//!                                      │
//!                 ┌────────────────────┘
//!                 ▼
//!   FrameEvent::ConstructFrame / FrameEvent::PerformAction ──► owner's sink
//! ```
//!
//! **[`tick`]**: The [`TickSource`] contract and a manual, test-friendly
//! source.
//!
//! **[`registry`]**: [`LinkRegistry`], the shared multiplexer. It engages the
//! tick source when the first link registers and disengages it when the last
//! one leaves.
//!
//! **[`link`]**: [`FrameLink`], the per-timeline state machine with
//! drift-free carry-over of boundary overshoot.
//!
//! **[`time`]**: Monotonic host time and timebase conversion for backends.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! scheduler instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Threading
//!
//! Everything here runs on one scheduling context: the one the platform tick
//! callback arrives on. The types are deliberately `!Send`.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one
//!   branch per call site).
//!
//! [`TickSource`]: tick::TickSource
//! [`LinkRegistry`]: registry::LinkRegistry
//! [`FrameLink`]: link::FrameLink

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod link;
pub mod registry;
pub mod tick;
pub mod time;
pub mod trace;

pub use link::{
    EventSink, FrameDescriptor, FrameEvent, FrameLink, LinkConfig, LinkHandle, LinkPhase,
    NOMINAL_FRAME_DURATION,
};
pub use registry::{LinkId, LinkRegistry, TickHandler};
pub use tick::{ManualTickSource, Tick, TickSink, TickSource};
