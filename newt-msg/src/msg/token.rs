use tinyvec::ArrayVec;

/// # Message Token
///
/// 0 to 8 bytes of opaque data chosen by the requester, echoed by
/// every response so the two can be correlated across message ids.
///
/// See [RFC7252 Section 5.3.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.3.1)
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Turn a sequence number into a token, using the fewest
  /// bytes that hold the value (big-endian, always at least one byte).
  ///
  /// ```
  /// use newt_msg::Token;
  ///
  /// assert_eq!(Token::from_seq(0).0.as_ref(), &[0]);
  /// assert_eq!(Token::from_seq(0x1ff).0.as_ref(), &[1, 0xff]);
  /// ```
  pub fn from_seq(seq: u64) -> Token {
    let bytes = seq.to_be_bytes();
    let first_used = bytes.iter().position(|b| *b != 0).unwrap_or(7);
    Token(bytes[first_used..].iter().copied().collect())
  }

  /// Borrow the token bytes
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }
}
