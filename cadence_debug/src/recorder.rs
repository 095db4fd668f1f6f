// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, one tag byte followed by the
//! event's fields. Seconds are stored as IEEE-754 bit patterns. [`decode`]
//! reads them back as an iterator of [`RecordedEvent`].

use cadence_core::LinkId;
use cadence_core::trace::{
    BoundaryEvent, ClockEvent, ConstructEvent, LinkEvent, LinkEventKind, TickEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TICK: u8 = 1;
const TAG_CLOCK: u8 = 2;
const TAG_LINK: u8 = 3;
const TAG_BOUNDARY: u8 = 4;
const TAG_CONSTRUCT: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
    events: usize,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    // -- encoding helpers --------------------------------------------------

    fn begin(&mut self, tag: u8) {
        self.events += 1;
        self.buf.push(tag);
    }

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_usize(&mut self, v: usize) {
        self.write_u64(u64::try_from(v).unwrap_or(u64::MAX));
    }

    fn write_count(&mut self, v: usize) {
        self.write_u32(u32::try_from(v).unwrap_or(u32::MAX));
    }
}

fn kind_code(kind: LinkEventKind) -> u8 {
    match kind {
        LinkEventKind::Registered => 0,
        LinkEventKind::Unregistered => 1,
        LinkEventKind::Exhausted => 2,
    }
}

impl TraceSink for RecorderSink {
    fn on_tick(&mut self, e: &TickEvent) {
        self.begin(TAG_TICK);
        self.write_u64(e.index);
        self.write_f64(e.timestamp);
        self.write_f64(e.elapsed);
        self.write_count(e.links);
    }

    fn on_clock(&mut self, e: &ClockEvent) {
        self.begin(TAG_CLOCK);
        self.write_u8(u8::from(e.engaged));
        self.write_u64(e.ticks_dispatched);
    }

    fn on_link(&mut self, e: &LinkEvent) {
        self.begin(TAG_LINK);
        self.write_u64(e.link.0);
        self.write_u8(kind_code(e.kind));
        self.write_count(e.active_links);
    }

    fn on_boundary(&mut self, e: &BoundaryEvent) {
        self.begin(TAG_BOUNDARY);
        self.write_u64(e.link.0);
        self.write_usize(e.frame);
        self.write_f64(e.timestamp);
        self.write_f64(e.elapsed);
        self.write_f64(e.overshoot);
    }

    fn on_construct(&mut self, e: &ConstructEvent) {
        self.begin(TAG_CONSTRUCT);
        self.write_u64(e.link.0);
        self.write_usize(e.frame);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecordedEvent {
    /// A [`TickEvent`].
    Tick(TickEvent),
    /// A [`ClockEvent`].
    Clock(ClockEvent),
    /// A [`LinkEvent`].
    Link(LinkEvent),
    /// A [`BoundaryEvent`].
    Boundary(BoundaryEvent),
    /// A [`ConstructEvent`].
    Construct(ConstructEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_f64(&mut self) -> Option<f64> {
        self.read_u64().map(f64::from_bits)
    }

    fn read_usize(&mut self) -> Option<usize> {
        usize::try_from(self.read_u64()?).ok()
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u32()?).ok()
    }

    fn read_kind(&mut self) -> Option<LinkEventKind> {
        Some(match self.read_u8()? {
            0 => LinkEventKind::Registered,
            1 => LinkEventKind::Unregistered,
            2 => LinkEventKind::Exhausted,
            _ => return None,
        })
    }

    fn decode_tick(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Tick(TickEvent {
            index: self.read_u64()?,
            timestamp: self.read_f64()?,
            elapsed: self.read_f64()?,
            links: self.read_count()?,
        }))
    }

    fn decode_clock(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Clock(ClockEvent {
            engaged: self.read_u8()? != 0,
            ticks_dispatched: self.read_u64()?,
        }))
    }

    fn decode_link(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Link(LinkEvent {
            link: LinkId(self.read_u64()?),
            kind: self.read_kind()?,
            active_links: self.read_count()?,
        }))
    }

    fn decode_boundary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Boundary(BoundaryEvent {
            link: LinkId(self.read_u64()?),
            frame: self.read_usize()?,
            timestamp: self.read_f64()?,
            elapsed: self.read_f64()?,
            overshoot: self.read_f64()?,
        }))
    }

    fn decode_construct(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Construct(ConstructEvent {
            link: LinkId(self.read_u64()?),
            frame: self.read_usize()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_TICK => self.decode_tick(),
            TAG_CLOCK => self.decode_clock(),
            TAG_LINK => self.decode_link(),
            TAG_BOUNDARY => self.decode_boundary(),
            TAG_CONSTRUCT => self.decode_construct(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
