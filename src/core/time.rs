//! Time representation for the audio presentation path.
//!
//! Presentation times, the shared clock and the audio cursor are all plain
//! `f64` seconds. Stream timestamps arrive in time-base units and are converted
//! here.

use std::sync::OnceLock;
use std::time::Instant;

/// Time in seconds
pub type Seconds = f64;

/// Time constants for conversions
pub mod constants {
    pub const MILLIS_PER_SECOND: f64 = 1_000.0;
}

/// Rational time base of a stream: `ticks * num / den = seconds`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// One tick per second
    pub const SECONDS: TimeBase = TimeBase::new(1, 1);

    /// Value of the time base as a float; zero for a degenerate denominator
    #[inline]
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Convert a timestamp in this time base to seconds
    #[inline]
    pub fn ticks_to_seconds(self, ticks: i64) -> Seconds {
        ticks as f64 * self.to_f64()
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::SECONDS
    }
}

/// Source of "now" for drift measurement.
///
/// The video pipeline anchors the shared clock against the same source, so both
/// sides must read the same monotonic timeline.
pub trait HiResClock: Send + Sync {
    fn now(&self) -> Seconds;
}

/// Monotonic process clock: seconds since the first call in this process
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Seconds on the process-wide monotonic timeline
#[inline]
pub fn hires_now() -> Seconds {
    process_epoch().elapsed().as_secs_f64()
}

impl HiResClock for SystemClock {
    fn now(&self) -> Seconds {
        hires_now()
    }
}

/// Convert seconds to whole milliseconds
#[inline]
pub fn to_millis(seconds: Seconds) -> i64 {
    (seconds * constants::MILLIS_PER_SECOND).round() as i64
}

/// Format time as HH:MM:SS.mmm
pub fn format_time(seconds: Seconds) -> String {
    let total_millis = to_millis(seconds.max(0.0));
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let secs = (total_millis / 1_000) % 60;
    let millis = total_millis % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
