//! Low-level representation of CoAP messages.
//!
//! The most notable item in `newt_msg` is [`Message`];
//! a CoAP message very close to the actual byte layout.
//!
//! This crate explicitly does **not** know or care about how
//! messages are sent and received, and is **just** concerned with the data
//! structures involved on the machines having a CoAP conversation.
//!
//! For the runtime that drives these messages over UDP, see the `newt` crate.

#![forbid(missing_debug_implementations, unreachable_pub)]
#![deny(unsafe_code, missing_copy_implementations)]
#![deny(missing_docs)]

pub(crate) mod cursor;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::TryIntoBytes;

/// The largest datagram an endpoint will produce or buffer, in bytes.
///
/// [RFC7252 Section 4.6](https://datatracker.ietf.org/doc/html/rfc7252#section-4.6)
/// recommends messages fit in a single IP fragment; the runtime's receive
/// buffer is sized to match.
pub const MAX_DATAGRAM_SIZE: usize = 1152;

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  use std::collections::BTreeMap;

  let header: [u8; 4] = 0b0100_0001_0100_0101_0000_0000_0000_0001_u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  let options: [&[u8]; 2] = [&[0b1100_0001u8], &[50u8]];
  let payload: [&[u8]; 2] = [&[0b1111_1111u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.concat().as_ref(),
               payload.concat().as_ref()].concat();

  let msg = Message { id: Id(1),
                      ty: Type::Con,
                      ver: Version(1),
                      token: Token(tinyvec::array_vec!([u8; 8] => 254)),
                      opts: BTreeMap::from([(known::CONTENT_FORMAT, OptValue::Uint(50))]),
                      code: Code { class: 2,
                                   detail: 5 },
                      payload: Payload(b"hello, world!".to_vec()) };
  (msg, bytes)
}

#[cfg(test)]
pub(crate) mod tests {
  /// Assert two values are equal, printing mismatches in binary on failure.
  #[macro_export]
  macro_rules! assert_eqb {
    ($actual:expr, $expected:expr) => {
      if $actual != $expected {
        panic!("expected {:08b} to equal {:08b}", $actual, $expected)
      }
    };
  }

  /// Assert two byte iterators are equal, printing mismatches in binary on failure.
  #[macro_export]
  macro_rules! assert_eqb_iter {
    ($actual:expr, $expected:expr) => {
      if $actual.iter().ne($expected.iter()) {
        panic!("expected {:?} to equal {:?}",
               $actual.into_iter()
                      .map(|b| format!("{:08b}", b))
                      .collect::<Vec<_>>(),
               $expected.into_iter()
                        .map(|b| format!("{:08b}", b))
                        .collect::<Vec<_>>())
      }
    };
  }
}
