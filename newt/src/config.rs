use std::time::Duration;

/// Runtime config.
///
/// Every field has the default RFC7252 / protocol value; construct with
/// `Config::default()` and override what you need.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
  /// Initial retransmission timeout for an unacked confirmable message.
  ///
  /// Doubles after every retransmission. Defaults to 2 seconds.
  ///
  /// The RFC draws the initial timeout uniformly from
  /// `[ack_timeout, ack_timeout * ack_random_factor]`; this runtime keeps
  /// the deterministic lower bound and lets the factor participate only
  /// in [`Config::max_transmission_span`].
  pub ack_timeout: Duration,

  /// Weight applied to the overall retransmission span bound.
  ///
  /// Defaults to 1.5.
  pub ack_random_factor: f32,

  /// Number of times a confirmable message is resent before the
  /// transaction fails. Defaults to 4.
  pub max_retransmit: u32,

  /// Maximum number of transactions in flight at once; the splitter
  /// blocks in [`admit`](crate::transaction::TransactionPool::admit)
  /// until the pool drops below this. Defaults to 50.
  pub max_active_transactions: usize,

  /// A worker whose queue reaches this depth is passed over in favor of
  /// spawning a new one. Defaults to 50.
  pub worker_queue_cap: usize,

  /// Workers idle longer than this are reaped (at least one always
  /// survives). Defaults to 60 seconds.
  pub worker_idle_eviction: Duration,

  /// Block size exponent for outbound transfers; the block size is
  /// `2^(szx + 4)` so the default of 6 gives 1024-byte blocks.
  pub block_szx: u8,

  /// How long the receiver blocks on the socket before re-checking for
  /// shutdown. Defaults to 1 second.
  pub recv_timeout: Duration,

  /// How often the transaction driver sweeps the pool. Defaults to
  /// 1 second.
  pub driver_period: Duration,

  /// How often idle workers are looked for. Defaults to 60 seconds.
  pub reaper_period: Duration,
}

impl Default for Config {
  fn default() -> Self {
    Config { ack_timeout: Duration::from_secs(2),
             ack_random_factor: 1.5,
             max_retransmit: 4,
             max_active_transactions: 50,
             worker_queue_cap: 50,
             worker_idle_eviction: Duration::from_secs(60),
             block_szx: 6,
             recv_timeout: Duration::from_secs(1),
             driver_period: Duration::from_secs(1),
             reaper_period: Duration::from_secs(60) }
  }
}

impl Config {
  /// Total time a transaction may spend retransmitting before it fails:
  /// `ack_timeout * (2^max_retransmit - 1) * ack_random_factor`.
  ///
  /// 45 seconds with the defaults.
  pub fn max_transmission_span(&self) -> Duration {
    let doublings = (1u32 << self.max_retransmit) - 1;
    self.ack_timeout
        .mul_f32(doublings as f32 * self.ack_random_factor)
  }
}
