use std::net::SocketAddr;

use newt_msg::{Id, Message, Token};

use crate::net::Addrd;

/// Identity of one datagram exchange: peer, token, message id, and the
/// block index when the message carries a block option.
///
/// Dispatch deduplication and ACK matching key on this.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct WorkId {
  /// Remote address
  pub peer: SocketAddr,
  /// Message token
  pub token: Token,
  /// Message id
  pub id: Id,
  /// Block index of the Block1/Block2 option, if present
  pub block: Option<u32>,
}

impl WorkId {
  /// The work id of an addressed message
  pub fn of(msg: &Addrd<Message>) -> WorkId {
    WorkId { peer: msg.addr(),
             token: msg.data().token,
             id: msg.data().id,
             block: msg.data().block_number() }
  }
}

/// Identity of an overall logical transfer: one request and every block
/// flowing under its token, independent of message ids.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ExchangeId {
  /// Remote address
  pub peer: SocketAddr,
  /// Token shared by every message of the transfer
  pub token: Token,
}

impl ExchangeId {
  /// The exchange id of an addressed message
  pub fn of(msg: &Addrd<Message>) -> ExchangeId {
    ExchangeId { peer: msg.addr(),
                 token: msg.data().token }
  }
}

impl From<WorkId> for ExchangeId {
  fn from(w: WorkId) -> Self {
    ExchangeId { peer: w.peer,
                 token: w.token }
  }
}
