/// Indicates if this message is of
/// type Confirmable (0), Non-confirmable (1), Acknowledgement (2), or Reset (3).
///
/// See [RFC7252 - Message Details](https://datatracker.ietf.org/doc/html/rfc7252#section-3) for context
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug)]
pub enum Type {
  /// Some messages require an acknowledgement.  These messages are
  /// called "Confirmable".  When no packets are lost, each Confirmable
  /// message elicits exactly one return message of type Acknowledgement
  /// or type Reset.
  Con,
  /// Some messages do not require an acknowledgement.  This is
  /// particularly true for messages that are repeated regularly for
  /// application requirements, such as repeated readings from a sensor.
  Non,
  /// An Acknowledgement message acknowledges that a specific
  /// Confirmable message arrived.
  Ack,
  /// A Reset message indicates that a specific message (Confirmable or
  /// Non-confirmable) was received, but some context is missing to
  /// properly process it.
  Reset,
}

impl Type {
  /// The 2-bit wire representation of this type
  pub fn bits(&self) -> u8 {
    match self {
      | Type::Con => 0,
      | Type::Non => 1,
      | Type::Ack => 2,
      | Type::Reset => 3,
    }
  }

  /// Parse a 2-bit type field.
  ///
  /// All four values of the field are assigned, so this cannot fail
  /// for inputs < 4.
  pub fn from_bits(b: u8) -> Option<Type> {
    match b {
      | 0 => Some(Type::Con),
      | 1 => Some(Type::Non),
      | 2 => Some(Type::Ack),
      | 3 => Some(Type::Reset),
      | _ => None,
    }
  }
}

impl From<Type> for u8 {
  fn from(t: Type) -> u8 {
    t.bits()
  }
}
