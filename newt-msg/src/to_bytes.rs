use crate::*;

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error type yielded if conversion fails
  type Error;

  /// Try to convert into a collection of bytes
  ///
  /// ```
  /// use newt_msg::{Code, Id, Message, Token, TryIntoBytes, Type};
  ///
  /// let msg = Message::new(Type::Con, Code::GET, Id(1), Token::default());
  /// let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// Message exceeded the datagram size cap
  TooLong {
    /// [`MAX_DATAGRAM_SIZE`]
    capacity: usize,
    /// Size the encoded message would have had
    size: usize,
  },
  /// An option delta or value length exceeded the 2-byte extension range
  OptFieldTooBig(u32),
}

impl TryIntoBytes for Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    let mut bytes = Vec::with_capacity(4 + self.token.0.len() + self.payload.0.len() + 64);

    let byte1: u8 = Byte1 { tkl: self.token.0.len() as u8,
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.push(byte1);
    bytes.push(code);

    bytes.extend(id);
    bytes.extend(self.token.0);

    let mut prev = OptNumber(0);
    for (num, value) in &self.opts {
      let OptNumber(delta) = *num - prev;
      let value = value.to_wire();

      if delta > 65804 || value.len() > 65804 {
        return Err(Self::Error::OptFieldTooBig(delta.max(value.len() as u32)));
      }

      Opt { delta: OptDelta(delta),
            value }.extend_bytes(&mut bytes);
      prev = *num;
    }

    if !self.payload.0.is_empty() {
      bytes.push(0b11111111);
      bytes.extend(self.payload.0);
    }

    if bytes.len() > MAX_DATAGRAM_SIZE {
      return Err(Self::Error::TooLong { capacity: MAX_DATAGRAM_SIZE,
                                        size: bytes.len() });
    }

    Ok(bytes)
  }
}

pub(crate) fn opt_len_or_delta(val: u32) -> (u8, Option<tinyvec::ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = tinyvec::ArrayVec::new();
      bytes.extend(((n - 269) as u16).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = tinyvec::ArrayVec::new();
      bytes.push((n as u8) - 13);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}

impl From<Id> for [u8; 2] {
  fn from(id: Id) -> [u8; 2] {
    id.0.to_be_bytes()
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = b.ty.bits() << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}
