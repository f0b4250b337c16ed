use std::sync::Arc;
use std::time::Duration;

/// A monotonic source of elapsed milliseconds.
///
/// The trait exists so retransmission timing can be tested with a clock
/// the test advances by hand instead of sleeping through the schedule.
pub trait Clock: Send + Sync + std::fmt::Debug {
  /// Milliseconds elapsed since some fixed (arbitrary) epoch
  fn now_millis(&self) -> u64;
}

/// Shared handle to a clock
pub type SharedClock = Arc<dyn Clock>;

/// [`Clock`] backed by [`std::time::Instant`]
#[derive(Debug)]
pub struct SystemClock {
  epoch: std::time::Instant,
}

impl SystemClock {
  /// Create a clock whose epoch is now
  pub fn new() -> Self {
    Self { epoch: std::time::Instant::now() }
  }
}

impl Default for SystemClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for SystemClock {
  fn now_millis(&self) -> u64 {
    self.epoch.elapsed().as_millis() as u64
  }
}

/// A resettable stopwatch over a [`Clock`].
///
/// `reset` captures now; `elapsed` is the time since the last reset.
/// Not suspendable.
#[derive(Debug, Clone)]
pub struct Stopwatch {
  clock: SharedClock,
  start: u64,
}

impl Stopwatch {
  /// Create a stopwatch, already running
  pub fn new(clock: SharedClock) -> Self {
    let start = clock.now_millis();
    Self { clock, start }
  }

  /// Capture now as the new starting point
  pub fn reset(&mut self) {
    self.start = self.clock.now_millis();
  }

  /// Time since the last reset
  pub fn elapsed(&self) -> Duration {
    Duration::from_millis(self.clock.now_millis() - self.start)
  }
}
