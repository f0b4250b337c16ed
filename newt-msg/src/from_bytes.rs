use crate::cursor::Cursor;

/// Fallible construction of a value from one raw datagram.
///
/// Implemented by [`Message`](crate::Message) as the entry point of the
/// decode path; the bound on `A` lets callers hand over whatever byte
/// container their receive buffer produced.
pub trait TryFromBytes<A: AsRef<[u8]>>: Sized {
  /// Why the bytes were not a valid encoding of `Self`
  type Error;

  /// Parse `Self` out of the complete buffer
  fn try_from_bytes(bytes: A) -> Result<Self, Self::Error>;
}

/// Fallible parse of one wire field off the front of a shared cursor.
///
/// Each piece of the message layout (the id, one option, the option map)
/// consumes exactly the bytes that belong to it and leaves the cursor on
/// the next field — which is what lets the `Message` decode be a straight
/// pipeline of `try_consume_bytes` calls ending at the payload marker.
pub(crate) trait TryConsumeBytes<A: AsRef<[u8]>>: Sized {
  /// Why the next bytes were not a valid encoding of `Self`
  type Error;

  /// Parse `Self` off the front of `bytes`, advancing the cursor past it
  fn try_consume_bytes(bytes: &mut Cursor<A>) -> Result<Self, Self::Error>;
}
