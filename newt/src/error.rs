use newt_msg::to_bytes::MessageToBytesError;
use newt_msg::{MessageParseError, OptNumber};

/// An error encounterable inside the runtime
#[derive(Debug)]
pub enum Error {
  /// Some socket or filesystem operation failed
  Io(std::io::Error),

  /// Serializing a message from bytes failed
  FromBytes(MessageParseError),

  /// Serializing a message to bytes failed
  ToBytes(MessageToBytesError),

  /// A JSON control payload did not parse
  Json(serde_json::Error),

  /// A message was missing an option the operation requires
  MissingOption(OptNumber),

  /// The overall exchange was marked failed before the operation
  /// could complete
  ExchangeFailed,
}

impl From<std::io::Error> for Error {
  fn from(e: std::io::Error) -> Self {
    Self::Io(e)
  }
}

impl From<MessageParseError> for Error {
  fn from(e: MessageParseError) -> Self {
    Self::FromBytes(e)
  }
}

impl From<MessageToBytesError> for Error {
  fn from(e: MessageToBytesError) -> Self {
    Self::ToBytes(e)
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Self::Json(e)
  }
}

impl From<zip::result::ZipError> for Error {
  fn from(e: zip::result::ZipError) -> Self {
    match e {
      | zip::result::ZipError::Io(io) => Self::Io(io),
      | other => Self::Io(std::io::Error::new(std::io::ErrorKind::InvalidData,
                                              other.to_string())),
    }
  }
}

impl std::fmt::Display for Error {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      | Error::Io(e) => write!(f, "io error: {}", e),
      | Error::FromBytes(e) => write!(f, "message failed to parse: {:?}", e),
      | Error::ToBytes(e) => write!(f, "message failed to serialize: {:?}", e),
      | Error::Json(e) => write!(f, "control payload failed to parse: {}", e),
      | Error::MissingOption(n) => write!(f, "required option {} missing", n.0),
      | Error::ExchangeFailed => write!(f, "exchange already failed"),
    }
  }
}

impl std::error::Error for Error {}
