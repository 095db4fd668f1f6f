// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a
//! [`RecorderSink`](super::recorder::RecorderSink) and writes Chrome Trace
//! Event Format JSON to the given writer. Registry-level events land on
//! thread 0; each link gets its own track (`tid` = link id), where every
//! frame shows up as a complete event spanning the time it accumulated.

use std::io::{self, Write};

use serde_json::{Value, json};

use cadence_core::trace::LinkEventKind;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Clock, link and construct events carry no time of their own; they are
/// stamped with the most recent tick. Events recorded before the first tick
/// take that tick's time (zero if the recording has no ticks).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut now_us = decode(bytes)
        .find_map(|recorded| match recorded {
            RecordedEvent::Tick(e) => Some(secs_to_us(e.timestamp)),
            _ => None,
        })
        .unwrap_or(0.0);

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::Tick(e) => {
                now_us = secs_to_us(e.timestamp);
                events.push(json!({
                    "ph": "i",
                    "name": "Tick",
                    "cat": "Clock",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "index": e.index,
                        "elapsed_us": secs_to_us(e.elapsed),
                        "links": e.links,
                    }
                }));
            }
            RecordedEvent::Clock(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": if e.engaged { "ClockEngaged" } else { "ClockDisengaged" },
                    "cat": "Clock",
                    "ts": now_us,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "ticks_dispatched": e.ticks_dispatched,
                    }
                }));
            }
            RecordedEvent::Link(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": link_kind_name(e.kind),
                    "cat": "Link",
                    "ts": now_us,
                    "pid": 0,
                    "tid": e.link.0,
                    "s": "t",
                }));
                events.push(json!({
                    "ph": "C",
                    "name": "active_links",
                    "ts": now_us,
                    "pid": 0,
                    "args": {
                        "links": e.active_links,
                    }
                }));
            }
            RecordedEvent::Boundary(e) => {
                let end = secs_to_us(e.timestamp);
                let dur = secs_to_us(e.elapsed);
                events.push(json!({
                    "ph": "X",
                    "name": format!("frame {}", e.frame),
                    "cat": "Frame",
                    "ts": end - dur,
                    "dur": dur,
                    "pid": 0,
                    "tid": e.link.0,
                    "args": {
                        "frame": e.frame,
                        "overshoot_us": secs_to_us(e.overshoot),
                    }
                }));
            }
            RecordedEvent::Construct(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Construct",
                    "cat": "Frame",
                    "ts": now_us,
                    "pid": 0,
                    "tid": e.link.0,
                    "s": "t",
                    "args": {
                        "frame": e.frame,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn secs_to_us(seconds: f64) -> f64 {
    seconds * 1_000_000.0
}

fn link_kind_name(kind: LinkEventKind) -> &'static str {
    match kind {
        LinkEventKind::Registered => "Registered",
        LinkEventKind::Unregistered => "Unregistered",
        LinkEventKind::Exhausted => "Exhausted",
    }
}
