//! The fixed reply shapes the runtime produces.
//!
//! Every constructor takes the token and id of the message being answered;
//! the caller pairs the result with the peer address.

use newt_msg::{Code, Id, Message, Token, Type};

use crate::net::Addrd;

/// An empty 0.00 ACK for a confirmable request.
///
/// Echoes the request's Block option (when it has one) so the sender's
/// transaction bookkeeping can match the ACK to the exact block.
pub fn empty_ack(req: &Addrd<Message>) -> Addrd<Message> {
  ack_echoing_block(req, Code::EMPTY)
}

/// A 2.31 CONTINUE ACK for an inbound block of a transfer.
pub fn continue_ack(req: &Addrd<Message>) -> Addrd<Message> {
  ack_echoing_block(req, Code::CONTINUE)
}

fn ack_echoing_block(req: &Addrd<Message>, code: Code) -> Addrd<Message> {
  let mut ack = Message::new(Type::Ack, code, req.data().id, req.data().token);

  if let Some(n) = req.data().block_option() {
    if let Some(v) = req.data().get_opt(n) {
      ack.set_opt(n, v.clone());
    }
  }

  Addrd(ack, req.addr())
}

/// The 4.08 RST a transaction emits when its retry budget is exhausted.
///
/// Carries the id of the originating request so the peer can fail the
/// whole exchange.
pub fn failed_reset(token: Token, parent_id: Id) -> Message {
  Message::new(Type::Reset, Code::ENTITY_INCOMPLETE, parent_id, token)
}

/// An RST carrying an error code (BAD_REQUEST, NOT_FOUND, CONFLICT,
/// NOT_IMPLEMENTED, INTERNAL_SERVER_ERROR, ...)
pub fn reset(code: Code, token: Token, id: Id) -> Message {
  Message::new(Type::Reset, code, id, token)
}

/// A 2.02 DELETED ACK
pub fn deleted_ack(token: Token, id: Id) -> Message {
  Message::new(Type::Ack, Code::DELETED, id, token)
}

/// A 2.04 CHANGED ACK
pub fn changed_ack(token: Token, id: Id) -> Message {
  Message::new(Type::Ack, Code::CHANGED, id, token)
}

#[cfg(test)]
mod tests {
  use newt_msg::{known, Block, CodeKind, OptValue};

  use super::*;
  use crate::test::addr;

  #[test]
  fn ack_echoes_block_option() {
    let mut req = Message::new(Type::Con, Code::GET, Id(7), Token::from_seq(1));
    req.set_block(known::BLOCK2, Block::new(0, false, 2));
    let req = Addrd(req, addr(1111));

    let ack = empty_ack(&req);
    assert_eq!(ack.data().ty, Type::Ack);
    assert_eq!(ack.data().id, Id(7));
    assert_eq!(ack.data().token, Token::from_seq(1));
    assert_eq!(ack.data().get_opt(known::BLOCK2),
               Some(&OptValue::Uint(Block::new(0, false, 2).encode() as u64)));
  }

  #[test]
  fn plain_ack_has_no_options() {
    let req = Addrd(Message::new(Type::Con, Code::POST, Id(1), Token::default()),
                    addr(1));
    assert!(empty_ack(&req).data().opts.is_empty());
  }

  #[test]
  fn ack_codes_stay_in_ack_classes() {
    // type == ACK implies class 0 or 2
    let req = Addrd(Message::new(Type::Con, Code::CONTENT, Id(1), Token::default()),
                    addr(1));
    for msg in [empty_ack(&req).unwrap(),
                continue_ack(&req).unwrap(),
                deleted_ack(Token::default(), Id(1)),
                changed_ack(Token::default(), Id(1))]
    {
      assert!(matches!(msg.code.kind(), CodeKind::Empty | CodeKind::Success));
    }
  }

  #[test]
  fn failed_reset_shape() {
    let rst = failed_reset(Token::from_seq(9), Id(41));
    assert_eq!(rst.ty, Type::Reset);
    assert_eq!(rst.code, Code::ENTITY_INCOMPLETE);
    assert_eq!(rst.id, Id(41));
  }
}
