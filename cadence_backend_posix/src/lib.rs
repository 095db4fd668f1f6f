// Copyright 2026 the Cadence Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! POSIX backend for cadence.
//!
//! - [`PacedLoop`]: a `CLOCK_MONOTONIC` paced-timer [`TickSource`] for hosts
//!   without a display-link facility (headless tools, tests, servers).
//! - [`now`] / [`timebase`]: host clock reads through `rustix`.
//!
//! ```no_run
//! use cadence_backend_posix::{PacedLoop, PacerConfig};
//! use cadence_core::{FrameDescriptor, LinkRegistry};
//!
//! let pacer = PacedLoop::new(PacerConfig::hz60())?;
//! let registry = LinkRegistry::new(pacer.clone());
//! let link = registry.create(30, false, |_| FrameDescriptor::new(1.0 / 30.0));
//! link.play(|event| println!("{event:?}"));
//! // Returns once the link has played its last frame.
//! pacer.run();
//! # Ok::<(), cadence_backend_posix::PacerError>(())
//! ```
//!
//! [`TickSource`]: cadence_core::TickSource

mod pacer;
mod time;

pub use pacer::{MAX_REFRESH_INTERVAL, PacedLoop, PacerConfig, PacerError};
pub use time::{now, now_secs, timebase};
