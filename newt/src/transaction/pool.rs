use std::collections::HashMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use newt_msg::{Id, Message};

use super::{Step, Transaction};
use crate::config::Config;
use crate::ident::{ExchangeId, WorkId};
use crate::net::{Addrd, Socket};
use crate::time::SharedClock;
use crate::Error;

#[derive(Default)]
struct State {
  active: HashMap<WorkId, Transaction>,
  finished: HashMap<WorkId, u64>,
  overall_failed: HashMap<ExchangeId, u64>,
  overall_finished: HashMap<ExchangeId, u64>,
  retransmits: HashMap<ExchangeId, u32>,
  closed: bool,
}

/// Tracks every in-flight [`Transaction`] of an endpoint, the finished and
/// failed sets, per-exchange retransmit counters, and the congestion
/// window.
///
/// All waiting is condition-variable based: `drained` wakes when the
/// active set shrinks, `overall` when an exchange finishes or fails.
#[derive(Debug)]
pub struct TransactionPool {
  cfg: Config,
  clock: SharedClock,
  state: Mutex<State>,
  drained: Condvar,
  overall: Condvar,
}

impl std::fmt::Debug for State {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("State")
     .field("active", &self.active.len())
     .field("finished", &self.finished.len())
     .field("overall_failed", &self.overall_failed.len())
     .field("overall_finished", &self.overall_finished.len())
     .finish()
  }
}

impl TransactionPool {
  /// Create an empty pool
  pub fn new(cfg: Config, clock: SharedClock) -> Self {
    Self { cfg,
           clock,
           state: Mutex::new(State::default()),
           drained: Condvar::new(),
           overall: Condvar::new() }
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Send `msg` once and start tracking it.
  ///
  /// The ACK may arrive before this call gets around to installing the
  /// transaction; checking the finished set here is what keeps that race
  /// from creating an immortal transaction.
  pub fn add(&self,
             sock: &dyn Socket,
             msg: Addrd<Message>,
             parent_id: Id)
             -> Result<(), Error> {
    let tx = Transaction::new(&self.cfg, self.clock.clone(), msg, parent_id)?;
    tx.send(sock)?;

    let key = tx.work_id();
    let mut st = self.lock();
    if !st.finished.contains_key(&key) {
      st.active.insert(key, tx);
    }
    Ok(())
  }

  /// Admission control for block producers.
  ///
  /// Returns false right away when the exchange has already failed (or the
  /// pool is closed); otherwise blocks until there is room in the
  /// congestion window — and, for the final block of a transfer, until
  /// every outstanding transaction has drained.
  pub fn admit(&self, msg: &Addrd<Message>, is_last: bool) -> bool {
    let ex = ExchangeId::of(msg);
    let mut st = self.lock();

    loop {
      if st.closed || st.overall_failed.contains_key(&ex) {
        return false;
      }

      let room = if is_last {
        st.active.is_empty()
      } else {
        st.active.len() < self.cfg.max_active_transactions
      };
      if room {
        return true;
      }

      st = self.drained.wait(st).unwrap_or_else(|e| e.into_inner());
    }
  }

  /// Step every active transaction once.
  ///
  /// A failed transaction fails its whole exchange: every sibling sharing
  /// the exchange id is purged without further retransmission.
  pub fn step_all(&self, sock: &dyn Socket) {
    let mut st = self.lock();
    if st.active.is_empty() {
      return;
    }

    let keys: Vec<WorkId> = st.active.keys().copied().collect();
    let mut drained = false;

    for key in keys {
      let ex = ExchangeId::from(key);
      if st.overall_failed.contains_key(&ex) || st.finished.contains_key(&key) {
        continue;
      }

      let step = match st.active.get_mut(&key) {
        | Some(tx) => tx.step(sock),
        | None => continue,
      };

      match step {
        | Step::Failed => {
          let stamp = self.clock.now_millis();
          st.overall_failed.insert(ex, stamp);
          st.overall_finished.insert(ex, stamp);
          st.active.retain(|k, _| ExchangeId::from(*k) != ex);
          drained = true;
          self.overall.notify_all();
        },
        | Step::Resent => {
          *st.retransmits.entry(ex).or_insert(0) += 1;
        },
        | Step::Idle => {},
      }
    }

    // the finished set only needs to bridge the ACK-before-add race
    // within one sweep
    st.finished.clear();

    if drained {
      self.drained.notify_all();
    }
  }

  /// The matching ACK arrived: stop tracking `msg`'s transaction
  pub fn finish(&self, msg: &Addrd<Message>) {
    self.finish_key(WorkId::of(msg));
  }

  /// [`TransactionPool::finish`] by work id
  pub fn finish_key(&self, key: WorkId) {
    let stamp = self.clock.now_millis();
    let mut st = self.lock();
    st.finished.insert(key, stamp);
    if st.active.remove(&key).is_some() {
      self.drained.notify_all();
    }
  }

  /// Whether `key`'s transaction is no longer being retransmitted
  pub fn is_settled(&self, key: WorkId) -> bool {
    !self.lock().active.contains_key(&key)
  }

  /// Block until `key`'s transaction leaves the active set (its ACK
  /// arrived, its exchange failed, or the pool closed)
  pub fn wait_settled(&self, key: WorkId) {
    let mut st = self.lock();
    while st.active.contains_key(&key) && !st.closed {
      st = self.drained.wait(st).unwrap_or_else(|e| e.into_inner());
    }
  }

  /// Mark the whole exchange complete, waking [`TransactionPool::wait_overall`]
  pub fn finish_overall(&self, ex: ExchangeId) {
    let stamp = self.clock.now_millis();
    let mut st = self.lock();
    st.overall_finished.entry(ex).or_insert(stamp);
    self.overall.notify_all();
  }

  /// Mark the whole exchange failed (and complete): its active
  /// transactions stop retransmitting immediately and all waiters wake
  pub fn fail_overall(&self, ex: ExchangeId) {
    let stamp = self.clock.now_millis();
    let mut st = self.lock();
    st.overall_failed.entry(ex).or_insert(stamp);
    st.overall_finished.entry(ex).or_insert(stamp);
    st.active.retain(|k, _| ExchangeId::from(*k) != ex);
    self.overall.notify_all();
    self.drained.notify_all();
  }

  /// Block until the exchange completes (successfully or not)
  pub fn wait_overall(&self, ex: ExchangeId) {
    let mut st = self.lock();
    while !st.overall_finished.contains_key(&ex) && !st.closed {
      st = self.overall.wait(st).unwrap_or_else(|e| e.into_inner());
    }
  }

  /// [`TransactionPool::wait_overall`] with a deadline; false on timeout
  pub fn wait_overall_timeout(&self, ex: ExchangeId, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    let mut st = self.lock();
    loop {
      if st.overall_finished.contains_key(&ex) {
        return true;
      }
      if st.closed {
        return false;
      }
      let left = match deadline.checked_duration_since(std::time::Instant::now()) {
        | Some(left) => left,
        | None => return false,
      };
      st = self.overall
               .wait_timeout(st, left)
               .unwrap_or_else(|e| e.into_inner())
               .0;
    }
  }

  /// Whether the exchange has been marked failed
  pub fn is_overall_failed(&self, ex: ExchangeId) -> bool {
    self.lock().overall_failed.contains_key(&ex)
  }

  /// How many times messages of this exchange have been retransmitted
  pub fn retransmit_count(&self, ex: ExchangeId) -> u32 {
    self.lock().retransmits.get(&ex).copied().unwrap_or(0)
  }

  /// Number of transactions currently in flight
  pub fn active_count(&self) -> usize {
    self.lock().active.len()
  }

  /// Wake every waiter and refuse new admissions; used at shutdown so no
  /// producer or caller stays parked forever
  pub fn close(&self) {
    let mut st = self.lock();
    st.closed = true;
    self.drained.notify_all();
    self.overall.notify_all();
  }
}
