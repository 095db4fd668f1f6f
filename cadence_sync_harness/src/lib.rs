// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cadence metrics and grading for frame-link timelines.
//!
//! Feed every [`FrameEvent::PerformAction`] of a link into a
//! [`CadenceTracker`] together with the duration the frame was supposed to
//! last. The tracker compares measured gaps against expected ones and grades
//! the timeline on two axes:
//!
//! - **drift**: measured time minus expected time, summed over the whole
//!   run. Carry-over keeps this within one tick; growth means overshoot is
//!   being lost somewhere.
//! - **late frames**: gaps longer than expected by more than one tick
//!   interval, i.e. beyond what tick quantization explains.

#![no_std]

extern crate alloc;

use alloc::string::String;
use cadence_core::FrameEvent;

/// One observed frame gap, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CadenceSample {
    /// Duration the frame was configured to last.
    pub expected_ms: f64,
    /// Time between this action and the previous one.
    pub measured_ms: f64,
}

/// Letter grade for cadence quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CadenceGrade {
    /// Drift within one tick, almost no late frames.
    A,
    /// Small drift, occasional late frames.
    B,
    /// Degraded but usable.
    C,
    /// Timeline is not keeping up.
    D,
}

impl CadenceGrade {
    /// Returns a short label for reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`CadenceTracker::observe`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CadenceReport {
    /// Current grade.
    pub grade: CadenceGrade,
    /// This frame's measured minus expected gap, in ms.
    pub gap_error_ms: f64,
    /// Total measured minus total expected time, in ms.
    pub drift_ms: f64,
    /// Late frames per 1000 observed frames.
    pub late_rate_per_1000: f64,
    /// Total frames observed.
    pub total_frames: u64,
    /// Total late frames observed.
    pub late_frames: u64,
}

/// Rolling cadence tracker with a fixed-size gap history.
#[derive(Debug)]
pub struct CadenceTracker<const N: usize> {
    gaps_ms: [f64; N],
    cursor: usize,
    tick_interval_ms: f64,
    total_frames: u64,
    late_frames: u64,
    expected_total_ms: f64,
    measured_total_ms: f64,
    last_action_s: Option<f64>,
}

impl<const N: usize> Default for CadenceTracker<N> {
    fn default() -> Self {
        Self::new(1_000.0 / 60.0)
    }
}

impl<const N: usize> CadenceTracker<N> {
    /// Creates a tracker for a tick source firing every `tick_interval_ms`.
    ///
    /// The history ring is prefilled with the tick interval.
    #[must_use]
    pub const fn new(tick_interval_ms: f64) -> Self {
        Self {
            gaps_ms: [tick_interval_ms; N],
            cursor: 0,
            tick_interval_ms,
            total_frames: 0,
            late_frames: 0,
            expected_total_ms: 0.0,
            measured_total_ms: 0.0,
            last_action_s: None,
        }
    }

    /// Sets the reference instant (in seconds) the first gap is measured
    /// from, typically the host time at `play`.
    pub fn mark(&mut self, timestamp_s: f64) {
        self.last_action_s = Some(timestamp_s);
    }

    /// Observes one frame gap and returns an updated report.
    #[must_use]
    pub fn observe(&mut self, sample: CadenceSample) -> CadenceReport {
        self.total_frames = self.total_frames.saturating_add(1);
        self.gaps_ms[self.cursor % N] = sample.measured_ms;
        self.cursor = (self.cursor + 1) % N;

        self.expected_total_ms += sample.expected_ms;
        self.measured_total_ms += sample.measured_ms;

        let gap_error_ms = sample.measured_ms - sample.expected_ms;
        if gap_error_ms > self.tick_interval_ms {
            self.late_frames = self.late_frames.saturating_add(1);
        }

        let late_rate = self.late_frames as f64 * 1000.0 / self.total_frames as f64;
        let drift_ms = self.drift_ms();

        CadenceReport {
            grade: grade_for(drift_ms.abs() / self.tick_interval_ms, late_rate),
            gap_error_ms,
            drift_ms,
            late_rate_per_1000: late_rate,
            total_frames: self.total_frames,
            late_frames: self.late_frames,
        }
    }

    /// Observes an action fired at `timestamp_s` for a frame lasting
    /// `expected_s`, measuring the gap from the previous action or
    /// [`mark`](Self::mark).
    ///
    /// The first action without a mark only sets the reference and returns
    /// `None`.
    pub fn observe_action(&mut self, timestamp_s: f64, expected_s: f64) -> Option<CadenceReport> {
        let previous = self.last_action_s.replace(timestamp_s)?;
        Some(self.observe(CadenceSample {
            expected_ms: expected_s * 1_000.0,
            measured_ms: (timestamp_s - previous) * 1_000.0,
        }))
    }

    /// Like [`observe_action`](Self::observe_action), taking a link event.
    ///
    /// Construct events are ignored.
    pub fn observe_event(&mut self, event: &FrameEvent, expected_s: f64) -> Option<CadenceReport> {
        match *event {
            FrameEvent::PerformAction { timestamp, .. } => {
                self.observe_action(timestamp, expected_s)
            }
            FrameEvent::ConstructFrame { .. } => None,
        }
    }

    /// Total measured minus total expected time, in ms.
    #[must_use]
    pub fn drift_ms(&self) -> f64 {
        self.measured_total_ms - self.expected_total_ms
    }

    /// Mean measured gap over every observed frame, in ms.
    #[must_use]
    pub fn mean_gap_ms(&self) -> Option<f64> {
        (self.total_frames > 0).then(|| self.measured_total_ms / self.total_frames as f64)
    }

    /// Returns ring-buffer gaps oldest→newest.
    #[must_use]
    pub fn frame_gaps(&self) -> [f64; N] {
        let mut out = [0.0; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.gaps_ms[(self.cursor + i) % N];
        }
        out
    }

    /// Returns an ASCII sparkline over [`frame_gaps`](Self::frame_gaps).
    #[must_use]
    pub fn sparkline_ascii(&self, min_ms: f64, max_ms: f64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let span = (max_ms - min_ms).max(f64::EPSILON);
        self.frame_gaps()
            .iter()
            .map(|gap| {
                let t = (gap.clamp(min_ms, max_ms) - min_ms) / span;
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "index is clamped to ASCII level count"
                )]
                let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
                char::from(LEVELS[level.min(LEVELS.len() - 1)])
            })
            .collect()
    }
}

fn grade_for(drift_ticks: f64, late_rate_per_1000: f64) -> CadenceGrade {
    if drift_ticks <= 1.0 && late_rate_per_1000 < 5.0 {
        CadenceGrade::A
    } else if drift_ticks <= 2.0 && late_rate_per_1000 < 20.0 {
        CadenceGrade::B
    } else if drift_ticks <= 4.0 && late_rate_per_1000 < 80.0 {
        CadenceGrade::C
    } else {
        CadenceGrade::D
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(expected_ms: f64, measured_ms: f64) -> CadenceSample {
        CadenceSample {
            expected_ms,
            measured_ms,
        }
    }

    #[test]
    fn quantized_gaps_with_carry_over_grade_a() {
        // 25 ms frames on a 10 ms clock alternate between 3 and 2 ticks.
        let mut t = CadenceTracker::<8>::new(10.0);
        let mut report = None;
        for i in 0..30 {
            let ticks = if i % 2 == 0 { 3.0 } else { 2.0 };
            report = Some(t.observe(sample(25.0, ticks * 10.0)));
        }
        let report = report.unwrap();
        assert_eq!(report.late_frames, 0, "one tick of slack is not late");
        assert!(report.drift_ms.abs() <= 10.0, "drift {}", report.drift_ms);
        assert_eq!(report.grade, CadenceGrade::A);
    }

    #[test]
    fn lost_overshoot_accumulates_drift() {
        let mut t = CadenceTracker::<4>::new(10.0);
        let mut report = None;
        for _ in 0..10 {
            report = Some(t.observe(sample(95.0, 100.0)));
        }
        let report = report.unwrap();
        assert!((report.drift_ms - 50.0).abs() < 1e-9, "5 ms lost per frame");
        assert_eq!(report.grade, CadenceGrade::D);
    }

    #[test]
    fn late_rate_accumulates() {
        let mut t = CadenceTracker::<8>::new(16.0);
        for i in 0..10 {
            let measured = if i < 2 { 60.0 } else { 20.0 };
            let report = t.observe(sample(20.0, measured));
            if i == 9 {
                assert!((report.late_rate_per_1000 - 200.0).abs() < 1e-6, "2 of 10 late");
                assert_eq!(report.late_frames, 2);
            }
        }
    }

    #[test]
    fn actions_measure_from_mark() {
        let mut t = CadenceTracker::<4>::default();
        assert!(t.observe_action(1.0, 0.1).is_none(), "first action only anchors");

        t.mark(2.0);
        let report = t
            .observe_event(
                &FrameEvent::PerformAction {
                    timestamp: 2.1,
                    elapsed: 0.1,
                    frame: 0,
                },
                0.1,
            )
            .unwrap();
        assert!(report.gap_error_ms.abs() < 1e-6, "gap matches frame");
        assert!(
            t.observe_event(&FrameEvent::ConstructFrame { frame: 1 }, 0.1)
                .is_none(),
            "constructs are not gaps"
        );
        assert!((t.mean_gap_ms().unwrap() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn gaps_come_back_oldest_first() {
        let mut t = CadenceTracker::<3>::new(0.0);
        for gap in [1.0, 2.0, 3.0, 4.0] {
            let _ = t.observe(sample(gap, gap));
        }
        assert_eq!(t.frame_gaps(), [2.0, 3.0, 4.0]);
        assert_eq!(t.sparkline_ascii(2.0, 4.0), " +@");
    }
}
