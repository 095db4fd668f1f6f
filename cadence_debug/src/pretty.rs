// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Times are
//! printed in milliseconds, overshoot in microseconds.

use std::io::Write;

use cadence_core::trace::{
    BoundaryEvent, ClockEvent, ConstructEvent, LinkEvent, LinkEventKind, TickEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    ticks: bool,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::with_writer(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self::with_writer(writer)
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer,
            ticks: true,
        }
    }

    /// Omits the per-tick line, which dominates output at display rates.
    #[must_use]
    pub fn without_ticks(mut self) -> Self {
        self.ticks = false;
        self
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn ms(seconds: f64) -> f64 {
    seconds * 1_000.0
}

fn link_kind_name(kind: LinkEventKind) -> &'static str {
    match kind {
        LinkEventKind::Registered => "registered",
        LinkEventKind::Unregistered => "unregistered",
        LinkEventKind::Exhausted => "exhausted",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_tick(&mut self, e: &TickEvent) {
        if !self.ticks {
            return;
        }
        let _ = writeln!(
            self.writer,
            "[tick] #{} t={:.3}ms dt={:.3}ms links={}",
            e.index,
            ms(e.timestamp),
            ms(e.elapsed),
            e.links,
        );
    }

    fn on_clock(&mut self, e: &ClockEvent) {
        let state = if e.engaged { "engaged" } else { "disengaged" };
        let _ = writeln!(
            self.writer,
            "[clock] {state} after {} ticks",
            e.ticks_dispatched,
        );
    }

    fn on_link(&mut self, e: &LinkEvent) {
        let _ = writeln!(
            self.writer,
            "[link] #{} {} active={}",
            e.link.0,
            link_kind_name(e.kind),
            e.active_links,
        );
    }

    fn on_boundary(&mut self, e: &BoundaryEvent) {
        let _ = writeln!(
            self.writer,
            "[boundary] link=#{} frame={} t={:.3}ms elapsed={:.3}ms overshoot={:.1}µs",
            e.link.0,
            e.frame,
            ms(e.timestamp),
            ms(e.elapsed),
            e.overshoot * 1_000_000.0,
        );
    }

    fn on_construct(&mut self, e: &ConstructEvent) {
        let _ = writeln!(
            self.writer,
            "[construct] link=#{} frame={}",
            e.link.0, e.frame,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{FrameDescriptor, LinkId, LinkRegistry, ManualTickSource};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn pretty_print_boundary() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_boundary(&BoundaryEvent {
            link: LinkId(4),
            frame: 2,
            timestamp: 1.5,
            elapsed: 0.1,
            overshoot: 0.000_25,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("[boundary]"), "got: {output}");
        assert!(output.contains("link=#4 frame=2"), "got: {output}");
        assert!(output.contains("t=1500.000ms"), "got: {output}");
        assert!(output.contains("overshoot=250.0µs"), "got: {output}");
    }

    #[test]
    fn tick_lines_can_be_suppressed() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new()).without_ticks();
        sink.on_tick(&TickEvent {
            index: 0,
            timestamp: 0.016,
            elapsed: 0.016,
            links: 1,
        });
        sink.on_clock(&ClockEvent {
            engaged: true,
            ticks_dispatched: 0,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "[clock] engaged after 0 ticks\n");
    }

    #[test]
    fn registry_session_reads_in_order() {
        let source = ManualTickSource::new();
        let registry = LinkRegistry::new(source.clone());
        let sink = Rc::new(RefCell::new(PrettyPrintSink::with_writer(Vec::<u8>::new())));
        registry.set_trace_sink(Rc::clone(&sink));

        let link = registry.create(1, false, |_| FrameDescriptor::deferred(0.01));
        link.play(|_| {});
        source.run_while_running(0.01, 10);
        registry.clear_trace_sink();

        let sink = Rc::try_unwrap(sink).ok().unwrap().into_inner();
        let output = String::from_utf8(sink.into_inner()).unwrap();
        let tags: Vec<&str> = output
            .lines()
            .map(|l| l.split(' ').next().unwrap_or(""))
            .collect();
        assert_eq!(
            tags,
            [
                "[link]",
                "[clock]",
                "[construct]",
                "[tick]",
                "[boundary]",
                "[link]",
                "[clock]",
                "[link]",
            ],
            "got: {output}"
        );
        assert!(output.contains("exhausted active=0"), "got: {output}");
    }
}
