// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Three timelines sharing one paced clock.
//!
//! - a clock that ticks every 100 ms and stops itself after 20 ticks,
//! - a 50-frame text rotator at 16 ms per frame,
//! - a loader whose frames vary in length and are constructed on demand.
//!
//! Trace events go to a
//! [`PrettyPrintSink`](cadence_debug::pretty::PrettyPrintSink) on stdout and
//! a [`RecorderSink`](cadence_debug::recorder::RecorderSink); the recording is
//! exported as a Chrome trace (path from the first argument, default
//! `cadence_trace.json`). Each timeline's cadence is graded at the end.

use std::cell::RefCell;
use std::fs::File;
use std::io::BufWriter;
use std::rc::Rc;

use cadence_backend_posix::{PacedLoop, PacerConfig, now_secs};
use cadence_core::trace::{
    BoundaryEvent, ClockEvent, ConstructEvent, LinkEvent, TickEvent, TraceSink,
};
use cadence_core::{FrameDescriptor, FrameEvent, FrameLink, LinkConfig, LinkRegistry};
use cadence_debug::pretty::PrettyPrintSink;
use cadence_debug::recorder::RecorderSink;
use cadence_sync_harness::{CadenceReport, CadenceTracker};

const CLOCK_INTERVAL: f64 = 0.1;
const CLOCK_TICKS: u32 = 20;
const ROTATOR_FRAMES: usize = 50;
const ROTATOR_FRAME: f64 = 0.016;
const LOADER_FRAMES: usize = 12;

type Tracker = Rc<RefCell<CadenceTracker<32>>>;

/// Forwards every trace event to two sinks.
struct Tee<A, B>(A, B);

impl<A: TraceSink, B: TraceSink> TraceSink for Tee<A, B> {
    fn on_tick(&mut self, e: &TickEvent) {
        self.0.on_tick(e);
        self.1.on_tick(e);
    }

    fn on_clock(&mut self, e: &ClockEvent) {
        self.0.on_clock(e);
        self.1.on_clock(e);
    }

    fn on_link(&mut self, e: &LinkEvent) {
        self.0.on_link(e);
        self.1.on_link(e);
    }

    fn on_boundary(&mut self, e: &BoundaryEvent) {
        self.0.on_boundary(e);
        self.1.on_boundary(e);
    }

    fn on_construct(&mut self, e: &ConstructEvent) {
        self.0.on_construct(e);
        self.1.on_construct(e);
    }
}

fn loader_duration(frame: usize) -> f64 {
    0.04 * (1 + frame % 3) as f64
}

fn tracker(interval: f64) -> Tracker {
    let mut tracker = CadenceTracker::new(interval * 1_000.0);
    tracker.mark(now_secs());
    Rc::new(RefCell::new(tracker))
}

fn print_report(name: &str, report: Option<CadenceReport>, tracker: &Tracker) {
    let tracker = tracker.borrow();
    let Some(report) = report else {
        println!("{name:>8}: no frames");
        return;
    };
    println!(
        "{name:>8}: grade {} frames={} late={} drift={:+.2}ms mean={:.2}ms |{}|",
        report.grade.as_str(),
        report.total_frames,
        report.late_frames,
        report.drift_ms,
        tracker.mean_gap_ms().unwrap_or(0.0),
        tracker.sparkline_ascii(0.0, 150.0),
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let trace_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "cadence_trace.json".to_owned());

    // -- tick source + registry --------------------------------------------
    let pacer = PacedLoop::new(PacerConfig::hz60())?;
    let refresh = pacer.refresh_interval().as_secs_f64();
    let registry = LinkRegistry::new(pacer.clone());

    // -- sinks -------------------------------------------------------------
    let recorder = Rc::new(RefCell::new(RecorderSink::new()));
    let pretty = PrettyPrintSink::new(Box::new(std::io::stdout())).without_ticks();
    registry.set_trace_sink(Tee(pretty, Rc::clone(&recorder)));

    // -- clock: one repeating frame, stops itself --------------------------
    let clock = FrameLink::new(&registry, LinkConfig::clock(), |_| {
        FrameDescriptor::new(CLOCK_INTERVAL)
    });
    let clock_tracker = tracker(refresh);
    let clock_report = Rc::new(RefCell::new(None));
    {
        let handle = clock.handle();
        let tracker = Rc::clone(&clock_tracker);
        let report = Rc::clone(&clock_report);
        let mut ticks = 0;
        clock.play(move |event| {
            if let Some(r) = tracker.borrow_mut().observe_event(&event, CLOCK_INTERVAL) {
                *report.borrow_mut() = Some(r);
            }
            ticks += 1;
            if ticks == CLOCK_TICKS {
                handle.invalidate();
            }
        });
    }

    // -- rotator: 50 short frames, played once -----------------------------
    let rotator = registry.create(ROTATOR_FRAMES, false, |_| {
        FrameDescriptor::new(ROTATOR_FRAME)
    });
    let rotator_tracker = tracker(refresh);
    let rotator_report = Rc::new(RefCell::new(None));
    {
        let tracker = Rc::clone(&rotator_tracker);
        let report = Rc::clone(&rotator_report);
        rotator.play(move |event| {
            if let Some(r) = tracker.borrow_mut().observe_event(&event, ROTATOR_FRAME) {
                *report.borrow_mut() = Some(r);
            }
        });
    }

    // -- loader: variable frames built on demand ---------------------------
    let loader = registry.create(LOADER_FRAMES, false, |frame| {
        FrameDescriptor::deferred(loader_duration(frame))
    });
    let loader_tracker = tracker(refresh);
    let loader_report = Rc::new(RefCell::new(None));
    let loaded = Rc::new(RefCell::new(Vec::new()));
    {
        let tracker = Rc::clone(&loader_tracker);
        let report = Rc::clone(&loader_report);
        let loaded = Rc::clone(&loaded);
        loader.play(move |event| match event {
            FrameEvent::ConstructFrame { frame } => loaded.borrow_mut().push(frame),
            FrameEvent::PerformAction { frame, .. } => {
                if let Some(r) = tracker
                    .borrow_mut()
                    .observe_event(&event, loader_duration(frame))
                {
                    *report.borrow_mut() = Some(r);
                }
            }
        });
    }

    // -- run until every timeline is done ----------------------------------
    let ticks = pacer.run();
    registry.clear_trace_sink();

    println!();
    println!(
        "{ticks} ticks, {} late; loader constructed {} frames",
        pacer.late_ticks(),
        loaded.borrow().len()
    );
    print_report("clock", *clock_report.borrow(), &clock_tracker);
    print_report("rotator", *rotator_report.borrow(), &rotator_tracker);
    print_report("loader", *loader_report.borrow(), &loader_tracker);

    // -- export Chrome trace -----------------------------------------------
    let file = File::create(&trace_path)?;
    let mut writer = BufWriter::new(file);
    cadence_debug::chrome::export(recorder.borrow().as_bytes(), &mut writer)?;
    println!("Wrote {trace_path} ({} events)", recorder.borrow().len());

    Ok(())
}
