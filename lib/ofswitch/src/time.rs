// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Moments on the monotonic clock.
//!
//! Expiry logic never reads the clock itself; callers capture a
//! `Moment` once per poll iteration and pass it down, which also lets
//! tests drive time explicitly with `Add<Duration>`.

use core::ops::Add;
use std::sync::OnceLock;
use std::time::Duration;
use std::time::Instant;

pub const MILLIS: u64 = 1_000;

static FIRST_TS: OnceLock<Instant> = OnceLock::new();

/// A moment in time, as a duration since process start.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct Moment {
    inner: Duration,
}

impl Moment {
    pub fn now() -> Self {
        let first_ts = *FIRST_TS.get_or_init(Instant::now);
        Self { inner: Instant::now().saturating_duration_since(first_ts) }
    }

    /// Milliseconds of `self - earlier`, saturating to zero when
    /// `earlier` is the later of the two.
    pub fn delta_as_millis(&self, earlier: Moment) -> u64 {
        let delta = self.inner.saturating_sub(earlier.inner);
        delta.as_secs() * MILLIS + u64::from(delta.subsec_millis())
    }

    /// Whole seconds of `self - earlier`, saturating to zero.
    pub fn delta_as_secs(&self, earlier: Moment) -> u64 {
        self.inner.saturating_sub(earlier.inner).as_secs()
    }

    pub(crate) fn raw_millis(&self) -> u64 {
        self.inner.as_millis() as u64
    }

    pub(crate) fn from_raw_millis(raw: u64) -> Self {
        Self { inner: Duration::from_millis(raw) }
    }
}

impl Add<Duration> for Moment {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self { inner: self.inner + rhs }
    }
}
