use std::time::Duration;

use newt_msg::{Id, Message, TryIntoBytes};

use crate::config::Config;
use crate::ident::{ExchangeId, WorkId};
use crate::net::{Addrd, Socket};
use crate::template;
use crate::time::{SharedClock, Stopwatch};
use crate::Error;

/// Tracking of all in-flight transactions
pub mod pool;
pub use pool::TransactionPool;

/// What one call to [`Transaction::step`] did
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Step {
  /// The retransmission timeout has not elapsed yet
  Idle,
  /// The message was sent again and the timeout doubled
  Resent,
  /// The retry budget is exhausted; a 4.08 RST went to the peer and the
  /// transaction must be discarded
  Failed,
}

/// One in-flight confirmable message.
///
/// Owns the outbound message (and its encoded bytes, so retransmits don't
/// re-encode), the doubling retransmission timeout, and the running
/// time-span / retry budget.
#[derive(Debug)]
pub struct Transaction {
  msg: Addrd<Message>,
  encoded: Vec<u8>,
  parent_id: Id,
  rto: Duration,
  span: Duration,
  retries: u32,
  max_span: Duration,
  max_retries: u32,
  watch: Stopwatch,
}

impl Transaction {
  /// Prepare a transaction for `msg`. Fails when the message won't encode.
  ///
  /// `parent_id` is the id of the request this message answers; it rides
  /// in the failure RST so the peer can fail the whole exchange.
  pub fn new(cfg: &Config,
             clock: SharedClock,
             msg: Addrd<Message>,
             parent_id: Id)
             -> Result<Self, Error> {
    let encoded = msg.data().clone().try_into_bytes()?;

    Ok(Self { msg,
              encoded,
              parent_id,
              rto: cfg.ack_timeout,
              span: Duration::ZERO,
              retries: 0,
              max_span: cfg.max_transmission_span(),
              max_retries: cfg.max_retransmit,
              watch: Stopwatch::new(clock) })
  }

  /// The message this transaction carries
  pub fn msg(&self) -> &Addrd<Message> {
    &self.msg
  }

  /// The work id of the carried message
  pub fn work_id(&self) -> WorkId {
    WorkId::of(&self.msg)
  }

  /// The exchange the carried message belongs to
  pub fn exchange(&self) -> ExchangeId {
    ExchangeId::of(&self.msg)
  }

  /// Put the encoded message on the wire
  pub fn send(&self, sock: &dyn Socket) -> std::io::Result<()> {
    sock.send(Addrd(&self.encoded, self.msg.addr()))
  }

  /// Drive the retransmission state machine one tick.
  ///
  /// Nothing happens until the current timeout elapses. When it does, the
  /// timeout doubles and the message is resent, unless the accumulated
  /// span exceeds the transmission-span bound or the retry counter passes
  /// its budget, in which case the peer receives a 4.08 RST and the
  /// transaction reports [`Step::Failed`].
  pub fn step(&mut self, sock: &dyn Socket) -> Step {
    if self.watch.elapsed() <= self.rto {
      return Step::Idle;
    }

    self.span += self.watch.elapsed();
    self.rto *= 2;
    self.retries += 1;
    self.watch.reset();

    if self.span > self.max_span || self.retries > self.max_retries {
      let rst = template::failed_reset(self.msg.data().token, self.parent_id);
      match rst.try_into_bytes() {
        | Ok(bytes) => {
          if let Err(e) = sock.send(Addrd(&bytes, self.msg.addr())) {
            log::warn!("failed to send 4.08 for {:?}: {}", self.work_id(), e);
          }
        },
        | Err(e) => log::warn!("4.08 for {:?} failed to encode: {:?}", self.work_id(), e),
      }

      log::warn!("transaction failed after {} retries: {:?}",
                 self.retries - 1,
                 self.work_id());
      return Step::Failed;
    }

    if let Err(e) = self.send(sock) {
      log::warn!("retransmit of {:?} failed: {}", self.work_id(), e);
    }
    log::debug!("retransmission {} of {:?}", self.retries, self.work_id());

    Step::Resent
  }
}
