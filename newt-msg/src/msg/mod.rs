use tinyvec::ArrayVec;

/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

/// Content formats
pub mod content_format;

pub use code::*;
pub use content_format::*;
pub use id::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

use crate::cursor::Cursor;
use crate::from_bytes::TryConsumeBytes;
use crate::TryFromBytes;

/// The message body carried after the `0xFF` marker.
///
/// # Related
/// - [RFC7252 Section 5.5 Payloads and Representations](https://datatracker.ietf.org/doc/html/rfc7252#section-5.5)
#[derive(Default, Clone, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct Payload(pub Vec<u8>);

impl Payload {
  /// Convert a reference to a Payload to a byte slice
  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Interpret the payload as UTF-8 text
  pub fn as_str(&self) -> Option<&str> {
    std::str::from_utf8(&self.0).ok()
  }

  /// Whether the payload carries any bytes
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (request, response, empty)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl From<u8> for Byte1 {
  fn from(b: u8) -> Self {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Byte1 { ver: Version(ver),
            ty: Type::from_bits(ty).expect("2-bit field"),
            tkl }
  }
}

/// # CoAP Messages
/// This struct provides a high-level API for manipulating requests & responses,
/// while still being cheaply serializable to & from the byte layout of CoAP
/// messages on the wire.
///
/// All fields are public and the struct can be built with a literal;
/// [`Message::new`] is the usual constructor.
///
/// This type carries no networking state; the runtime pairs it with the
/// peer address (`Addrd<Message>` in the `newt` crate).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`opt::OptValue`] for details
  pub opts: Opts,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Message {
  /// Create a new message
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           token,
           ty,
           code,
           ver: Version::default(),
           payload: Payload(Vec::new()),
           opts: Opts::new() }
  }

  /// Create a new message that ACKs this one, carrying the same token.
  pub fn ack(&self) -> Self {
    Self { id: self.id,
           token: self.token,
           ver: Default::default(),
           ty: Type::Ack,
           code: Code::EMPTY,
           payload: Payload(Default::default()),
           opts: Default::default() }
  }

  /// Whether the message passes the endpoint's format check:
  /// supported version, recognized code, every option number recognized.
  ///
  /// (The 2-bit type field cannot hold an unassigned value.)
  pub fn well_formed(&self) -> bool {
    self.ver.is_supported()
    && self.code.is_recognized()
    && self.opts.keys().all(OptNumber::is_recognized)
  }

  /// Replace any existing value of option `n` with `v`
  pub fn set_opt(&mut self, n: OptNumber, v: OptValue) {
    self.opts.insert(n, v);
  }

  /// Get the value of an option by number
  pub fn get_opt(&self, n: OptNumber) -> Option<&OptValue> {
    self.opts.get(&n)
  }

  /// Get the value of an option, interpreted as a UTF-8 string
  pub fn get_str(&self, n: OptNumber) -> Option<&str> {
    self.get_opt(n).and_then(OptValue::as_str)
  }

  /// Get the value of an option, interpreted as an unsigned integer
  pub fn get_uint(&self, n: OptNumber) -> Option<u64> {
    self.get_opt(n).and_then(OptValue::as_uint)
  }

  /// The Uri-Path option
  pub fn uri_path(&self) -> Option<&str> {
    self.get_str(known::URI_PATH)
  }

  /// Update the Uri-Path option
  pub fn set_uri_path<S: Into<String>>(&mut self, path: S) {
    self.set_opt(known::URI_PATH, OptValue::Str(path.into()));
  }

  /// The Location-Path option
  pub fn location_path(&self) -> Option<&str> {
    self.get_str(known::LOCATION_PATH)
  }

  /// Update the Location-Path option
  pub fn set_location_path<S: Into<String>>(&mut self, path: S) {
    self.set_opt(known::LOCATION_PATH, OptValue::Str(path.into()));
  }

  /// The Content-Format option
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.get_uint(known::CONTENT_FORMAT)
        .and_then(|v| u16::try_from(v).ok())
        .and_then(ContentFormat::from_value)
  }

  /// Update the Content-Format option
  pub fn set_content_format(&mut self, format: ContentFormat) {
    self.set_opt(known::CONTENT_FORMAT,
                 OptValue::Uint(format.value() as u64));
  }

  /// Which block option this message carries, Block1 winning
  /// when both are present
  pub fn block_option(&self) -> Option<OptNumber> {
    [known::BLOCK1, known::BLOCK2].into_iter()
                                  .find(|n| self.opts.contains_key(n))
  }

  /// The decoded Block1 or Block2 value, if either is present
  pub fn block(&self) -> Option<Block> {
    self.block_option()
        .and_then(|n| self.get_uint(n))
        .map(|v| Block::decode(v as u32))
  }

  /// The block index of this message's block option
  pub fn block_number(&self) -> Option<u32> {
    self.block().map(|b| b.num)
  }

  /// Update the given block option
  pub fn set_block(&mut self, n: OptNumber, block: Block) {
    self.set_opt(n, OptValue::Uint(block.encode() as u64));
  }

  /// The size option paired with this message's block option
  /// (Block1 -> Size1, Block2 -> Size2)
  pub fn size_option_for_block(&self) -> Option<OptNumber> {
    match self.block_option() {
      | Some(known::BLOCK1) => Some(known::SIZE1),
      | Some(known::BLOCK2) => Some(known::SIZE2),
      | _ => None,
    }
  }

  /// The value of whichever size option is present
  pub fn size(&self) -> Option<u64> {
    [known::SIZE1, known::SIZE2].into_iter()
                                .find_map(|n| self.get_uint(n))
  }

  /// The id of the request this block response answers:
  /// `id - block_num - 1`, wrapping modulo 65536.
  ///
  /// Only meaningful for messages carrying a block option, where the
  /// sender derived each block's id from the request id.
  pub fn parent_id(&self) -> Option<Id> {
    self.block_number().map(|num| {
                         Id(self.id
                                .0
                                .wrapping_sub(num as u16)
                                .wrapping_sub(1))
                       })
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next().ok_or_else(MessageParseError::eof)?.into();

    if tkl > 8 {
      return Err(Self::Error::InvalidTokenLength(tkl));
    }

    let code: Code = bytes.next().ok_or_else(MessageParseError::eof)?.into();
    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token = bytes.take_exact(tkl as usize)
                     .ok_or_else(MessageParseError::eof)?;
    let token = ArrayVec::<[u8; 8]>::try_from(token).expect("tkl was checked to be <= 8");
    let token = Token(token);

    let opts = Opts::try_consume_bytes(&mut bytes)?;

    // a bare trailing 0xFF yields an empty payload
    if !bytes.is_exhausted() {
      bytes.next();
    }
    let payload = Payload(bytes.take_until_end().to_vec());

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload })
  }
}
