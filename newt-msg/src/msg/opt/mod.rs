use std::collections::BTreeMap;
use std::ops::{Add, Sub};

use crate::cursor::Cursor;
use crate::from_bytes::TryConsumeBytes;

/// Option parsing error
pub mod parse_error;
pub use parse_error::*;

/// Block1 / Block2 option values
pub mod block;
pub use block::Block;

/// The "Option Delta" is the difference between this Option's Number
/// and the previous Option's number.
///
/// This is just used to compute the Option Number, identifying which
/// Option is being set (e.g. Content-Format has a Number of 12)
///
/// # Related
/// - [RFC7252#section-3.1 Option Format](https://datatracker.ietf.org/doc/html/rfc7252#section-3.1)
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct OptDelta(pub u32);

/// A CoAP option number, identifying which option an
/// [`OptValue`] is a value for.
///
/// # Related
/// - [RFC7252#section-5.4.6 Option Numbers](https://datatracker.ietf.org/doc/html/rfc7252#section-5.4.6)
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

impl Add for OptNumber {
  type Output = OptNumber;

  fn add(self, rhs: Self) -> Self::Output {
    Self(self.0 + rhs.0)
  }
}

impl Sub for OptNumber {
  type Output = OptNumber;

  fn sub(self, rhs: Self) -> Self::Output {
    Self(self.0 - rhs.0)
  }
}

/// Option numbers the endpoint understands.
///
/// Datagrams carrying any other number fail the dispatcher's format check.
pub mod known {
  use super::OptNumber;

  /// If-Match
  pub const IF_MATCH: OptNumber = OptNumber(1);
  /// Uri-Host
  pub const URI_HOST: OptNumber = OptNumber(3);
  /// ETag
  pub const ETAG: OptNumber = OptNumber(4);
  /// If-None-Match
  pub const IF_NONE_MATCH: OptNumber = OptNumber(5);
  /// Uri-Port
  pub const URI_PORT: OptNumber = OptNumber(7);
  /// Location-Path
  pub const LOCATION_PATH: OptNumber = OptNumber(8);
  /// Uri-Path
  pub const URI_PATH: OptNumber = OptNumber(11);
  /// Content-Format
  pub const CONTENT_FORMAT: OptNumber = OptNumber(12);
  /// Max-Age
  pub const MAX_AGE: OptNumber = OptNumber(14);
  /// Uri-Query
  pub const URI_QUERY: OptNumber = OptNumber(15);
  /// Accept
  pub const ACCEPT: OptNumber = OptNumber(17);
  /// Location-Query
  pub const LOCATION_QUERY: OptNumber = OptNumber(20);
  /// Block2 (response payload blocking)
  pub const BLOCK2: OptNumber = OptNumber(23);
  /// Block1 (request payload blocking)
  pub const BLOCK1: OptNumber = OptNumber(27);
  /// Size2
  pub const SIZE2: OptNumber = OptNumber(28);
  /// Proxy-Uri
  pub const PROXY_URI: OptNumber = OptNumber(35);
  /// Proxy-Scheme
  pub const PROXY_SCHEME: OptNumber = OptNumber(39);
  /// Size1
  pub const SIZE1: OptNumber = OptNumber(60);
}

/// The shape an option's value bytes decode into.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueFormat {
  /// UTF-8 string
  Str,
  /// Big-endian unsigned integer, minimal width
  Uint,
  /// Raw bytes
  Opaque,
  /// Always zero-length
  Empty,
}

impl OptNumber {
  /// The value format for this option number, or `None`
  /// when the number is not one the endpoint understands.
  ///
  /// Block1 and Block2 are integers; the packed block fields are
  /// interpreted by [`Block`].
  pub fn value_format(&self) -> Option<ValueFormat> {
    use known::*;

    match *self {
      | URI_HOST | LOCATION_PATH | URI_PATH | URI_QUERY | LOCATION_QUERY | PROXY_URI
      | PROXY_SCHEME => Some(ValueFormat::Str),
      | ETAG | URI_PORT | CONTENT_FORMAT | MAX_AGE | ACCEPT | BLOCK2 | BLOCK1 | SIZE2 | SIZE1 => {
        Some(ValueFormat::Uint)
      },
      | IF_MATCH => Some(ValueFormat::Opaque),
      | IF_NONE_MATCH => Some(ValueFormat::Empty),
      | _ => None,
    }
  }

  /// Whether this number appears in the [`known`] table
  pub fn is_recognized(&self) -> bool {
    self.value_format().is_some()
  }
}

/// An option value in its typed, decoded form.
///
/// The wire carries raw bytes; which shape they decode into is decided
/// by the option number's [`ValueFormat`]. Unknown numbers decode as
/// [`OptValue::Opaque`] so the format check can reject the whole message
/// rather than the parser.
#[derive(Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug)]
pub enum OptValue {
  /// UTF-8 string (path-like options)
  Str(String),
  /// Unsigned integer (block, size, format options)
  Uint(u64),
  /// Raw bytes
  Opaque(Vec<u8>),
  /// Zero-length flag value
  Empty,
}

impl OptValue {
  /// Decode raw value bytes into the typed form dictated by `number`.
  pub fn decode(number: OptNumber, raw: &[u8]) -> Result<OptValue, OptParseError> {
    match number.value_format() {
      | Some(ValueFormat::Str) => String::from_utf8(raw.to_vec()).map(OptValue::Str)
                                                                 .map_err(|_| {
                                                                   OptParseError::OptionValueNotUtf8
                                                                 }),
      | Some(ValueFormat::Uint) => match raw.len() {
        | n if n > 8 => Err(OptParseError::OptionValueTooWide(n)),
        | _ => {
          let mut v = 0u64;
          raw.iter().for_each(|b| v = (v << 8) | *b as u64);
          Ok(OptValue::Uint(v))
        },
      },
      | Some(ValueFormat::Empty) => Ok(OptValue::Empty),
      | Some(ValueFormat::Opaque) | None => Ok(OptValue::Opaque(raw.to_vec())),
    }
  }

  /// The value bytes as they appear on the wire.
  ///
  /// Integers take their minimal big-endian width; zero is zero-length.
  pub fn to_wire(&self) -> Vec<u8> {
    match self {
      | OptValue::Str(s) => s.as_bytes().to_vec(),
      | OptValue::Uint(v) => {
        let bytes = v.to_be_bytes();
        let width = (8 - v.leading_zeros() as usize / 8).min(8);
        bytes[8 - width..].to_vec()
      },
      | OptValue::Opaque(bs) => bs.clone(),
      | OptValue::Empty => Vec::new(),
    }
  }

  /// Borrow the string value, if this is a [`OptValue::Str`]
  pub fn as_str(&self) -> Option<&str> {
    match self {
      | OptValue::Str(s) => Some(s),
      | _ => None,
    }
  }

  /// Copy the integer value, if this is a [`OptValue::Uint`]
  pub fn as_uint(&self) -> Option<u64> {
    match self {
      | OptValue::Uint(v) => Some(*v),
      | _ => None,
    }
  }
}

/// The options of one message: number -> typed value, numbers unique,
/// iterated in ascending wire order.
pub type Opts = BTreeMap<OptNumber, OptValue>;

/// Low-level representation of a CoAP Option, closely mirroring the byte
/// layout of message options.
///
/// Notably, this doesn't include the Number (key, e.g. "Content-Format" or
/// "Uri-Path"); on the wire each option only carries its [`OptDelta`] from
/// the previous one.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Opt {
  pub(crate) delta: OptDelta,
  pub(crate) value: Vec<u8>,
}

impl Opt {
  /// Given a collection to [`Extend`] and an Opt, add that Opt's bytes to the collection.
  pub(crate) fn extend_bytes(&self, bytes: &mut Vec<u8>) {
    let (del, del_bytes) = crate::to_bytes::opt_len_or_delta(self.delta.0);
    let (len, len_bytes) = crate::to_bytes::opt_len_or_delta(self.value.len() as u32);
    let del = del << 4;

    let header = del | len;

    bytes.push(header);

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }

    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(&self.value);
  }
}

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u32, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok((n as u32) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => Ok(u16::from_be_bytes([a, b]) as u32 + 269),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(head as u32),
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Opt {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let byte1 = match bytes.peek() {
      | None | Some(0b11111111) => return Err(OptParseError::OptionsExhausted),
      | Some(b) => {
        bytes.next();
        b
      },
    };

    // NOTE: delta must be consumed before the length extension
    let delta = parse_opt_len_or_delta(byte1 >> 4,
                                       bytes,
                                       OptParseError::OptionDeltaReservedValue(15))?;
    let delta = OptDelta(delta);

    let len = parse_opt_len_or_delta(byte1 & 0b00001111,
                                     bytes,
                                     OptParseError::ValueLengthReservedValue(15))?
              as usize;

    let value = bytes.take_exact(len)
                     .ok_or_else(OptParseError::eof)?
                     .to_vec();

    Ok(Opt { delta, value })
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Opts {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = Opts::new();
    let mut prev = OptNumber(0);

    loop {
      match Opt::try_consume_bytes(bytes) {
        | Ok(opt) => {
          let num = prev + OptNumber(opt.delta.0);
          opts.insert(num, OptValue::decode(num, &opt.value)?);
          prev = num;
        },
        | Err(OptParseError::OptionsExhausted) => break Ok(opts),
        | Err(e) => break Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_opt() {
    let mut opt_bytes = Cursor::new([0b00010001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: OptDelta(1),
                     value: vec![1] });

    let mut opt_bytes = Cursor::new([0b11010001, 0b00000001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: OptDelta(14),
                     value: vec![1] });

    let mut opt_bytes = Cursor::new([0b11100001, 0b00000000, 0b00000001, 0b00000001]);
    let opt = Opt::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opt,
               Opt { delta: OptDelta(270),
                     value: vec![1] });

    let mut opt_bytes = Cursor::new([0b11110001, 0b00000001]);
    assert_eq!(Opt::try_consume_bytes(&mut opt_bytes),
               Err(OptParseError::OptionDeltaReservedValue(15)));
  }

  #[test]
  fn parse_opt_map() {
    let mut opt_bytes = Cursor::new([0b10110100, b'p', b'a', b't', b'h', 0b00010001, 50,
                                     0b11111111]);
    let opts = Opts::try_consume_bytes(&mut opt_bytes).unwrap();
    assert_eq!(opts,
               Opts::from([(known::URI_PATH, OptValue::Str("path".into())),
                           (known::CONTENT_FORMAT, OptValue::Uint(50))]));
  }

  #[test]
  fn truncated_value() {
    let mut opt_bytes = Cursor::new([0b00010100, 1, 2]);
    assert_eq!(Opt::try_consume_bytes(&mut opt_bytes),
               Err(OptParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn uint_wire_width() {
    assert_eq!(OptValue::Uint(0).to_wire(), Vec::<u8>::new());
    assert_eq!(OptValue::Uint(6).to_wire(), vec![6]);
    assert_eq!(OptValue::Uint(0x1ff).to_wire(), vec![1, 0xff]);
    assert_eq!(OptValue::Uint(u64::MAX).to_wire(), vec![0xff; 8]);
  }

  #[test]
  fn typed_decode() {
    assert_eq!(OptValue::decode(known::URI_PATH, b"share_drive").unwrap(),
               OptValue::Str("share_drive".into()));
    assert_eq!(OptValue::decode(known::BLOCK2, &[0x01, 0x06]).unwrap(),
               OptValue::Uint(0x106));
    assert_eq!(OptValue::decode(known::IF_NONE_MATCH, &[]).unwrap(),
               OptValue::Empty);
    assert_eq!(OptValue::decode(known::IF_MATCH, &[1, 2]).unwrap(),
               OptValue::Opaque(vec![1, 2]));
    assert_eq!(OptValue::decode(OptNumber(9999), &[1]).unwrap(),
               OptValue::Opaque(vec![1]));
    assert_eq!(OptValue::decode(known::URI_PATH, &[0xff, 0xfe]),
               Err(OptParseError::OptionValueNotUtf8));
  }
}
