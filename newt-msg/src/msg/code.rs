/// # Message Code
///
/// The message code splits into a 3-bit class (the most significant digit of
/// the dotted human form) and a 5-bit detail, packed into one byte as
/// `class·32 + detail`.
///
/// # Examples
/// ```
/// use newt_msg::Code;
///
/// assert_eq!(Code { class: 2,
///                   detail: 5 }.to_string(),
///            "2.05".to_string());
/// ```
///
/// See [RFC7252 Section 12.1](https://datatracker.ietf.org/doc/html/rfc7252#section-12.1)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request (or EMPTY)|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  pub detail: u8,
}

/// Whether a code is a request, a response (by status class), or empty
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeKind {
  /// EMPTY (0.00)
  Empty,
  /// A request code (0.xx)
  Request,
  /// A success response code (2.xx)
  Success,
  /// A client error response code (4.xx)
  ClientError,
  /// A server error response code (5.xx)
  ServerError,
}

impl Code {
  /// Create a new Code
  ///
  /// ```
  /// use newt_msg::Code;
  ///
  /// let content = Code::new(2, 05);
  /// ```
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// Get the human string representation of a message code
  pub fn to_human(&self) -> [char; 4] {
    let to_char = |d: u8| char::from_digit(d.into(), 10).unwrap();
    [to_char(self.class),
     '.',
     to_char(self.detail / 10),
     to_char(self.detail % 10)]
  }

  /// Get whether this code is for a request, response, or empty message
  ///
  /// ```
  /// use newt_msg::{Code, CodeKind};
  ///
  /// assert_eq!(Code::EMPTY.kind(), CodeKind::Empty);
  /// assert_eq!(Code::GET.kind(), CodeKind::Request);
  /// assert_eq!(Code::CONTENT.kind(), CodeKind::Success);
  /// assert_eq!(Code::NOT_FOUND.kind(), CodeKind::ClientError);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match (self.class, self.detail) {
      | (0, 0) => CodeKind::Empty,
      | (0, _) => CodeKind::Request,
      | (2, _) => CodeKind::Success,
      | (4, _) => CodeKind::ClientError,
      | (_, _) => CodeKind::ServerError,
    }
  }

  /// Whether this is one of the request method codes
  /// (GET, POST, PUT, DELETE, FETCH)
  pub fn is_method(&self) -> bool {
    matches!(*self,
             Code::GET | Code::POST | Code::PUT | Code::DELETE | Code::FETCH)
  }

  /// Whether this code appears in the set the endpoint understands.
  ///
  /// Datagrams carrying any other code fail the dispatcher's format check.
  pub fn is_recognized(&self) -> bool {
    matches!((self.class, self.detail),
             (0, 0..=5)
             | (2, 1..=5)
             | (2, 31)
             | (4, 0 | 1 | 3 | 4 | 5 | 8 | 9 | 12 | 13 | 15)
             | (5, 0..=5))
  }

  /// 0.00
  pub const EMPTY: Self = Self::new(0, 0);
  /// 0.01
  pub const GET: Self = Self::new(0, 1);
  /// 0.02
  pub const POST: Self = Self::new(0, 2);
  /// 0.03
  pub const PUT: Self = Self::new(0, 3);
  /// 0.04
  pub const DELETE: Self = Self::new(0, 4);
  /// 0.05
  pub const FETCH: Self = Self::new(0, 5);

  /// 2.01
  pub const CREATED: Self = Self::new(2, 1);
  /// 2.02
  pub const DELETED: Self = Self::new(2, 2);
  /// 2.03
  pub const VALID: Self = Self::new(2, 3);
  /// 2.04
  pub const CHANGED: Self = Self::new(2, 4);
  /// 2.05
  pub const CONTENT: Self = Self::new(2, 5);
  /// 2.31
  pub const CONTINUE: Self = Self::new(2, 31);

  /// 4.00
  pub const BAD_REQUEST: Self = Self::new(4, 0);
  /// 4.01
  pub const UNAUTHORIZED: Self = Self::new(4, 1);
  /// 4.03
  pub const FORBIDDEN: Self = Self::new(4, 3);
  /// 4.04
  pub const NOT_FOUND: Self = Self::new(4, 4);
  /// 4.05
  pub const METHOD_NOT_ALLOWED: Self = Self::new(4, 5);
  /// 4.08, doubles as the runtime's failed-request sentinel
  pub const ENTITY_INCOMPLETE: Self = Self::new(4, 8);
  /// 4.09
  pub const CONFLICT: Self = Self::new(4, 9);
  /// 4.12
  pub const PRECONDITION_FAILED: Self = Self::new(4, 12);
  /// 4.13
  pub const ENTITY_TOO_LARGE: Self = Self::new(4, 13);
  /// 4.15
  pub const UNSUPPORTED_FORMAT: Self = Self::new(4, 15);

  /// 5.00
  pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);
  /// 5.01
  pub const NOT_IMPLEMENTED: Self = Self::new(5, 1);
  /// 5.02
  pub const BAD_GATEWAY: Self = Self::new(5, 2);
  /// 5.03
  pub const SERVICE_UNAVAILABLE: Self = Self::new(5, 3);
  /// 5.04
  pub const GATEWAY_TIMEOUT: Self = Self::new(5, 4);
  /// 5.05
  pub const PROXYING_NOT_SUPPORTED: Self = Self::new(5, 5);
}

impl std::fmt::Display for Code {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.to_human().iter().try_for_each(|c| write!(f, "{}", c))
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    // xxxyyyyy

    // xxx => class
    let class = b >> 5;

    // yyyyy => detail
    let detail = b & 0b00011111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = (code.class << 5) & 0b11100000;
    let detail = code.detail & 0b00011111;

    class | detail
  }
}
