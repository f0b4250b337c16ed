/// Content formats the endpoint understands.
///
/// # Related
/// - [RFC7252 Section 12.3 Content-Format Registry](https://datatracker.ietf.org/doc/html/rfc7252#section-12.3)
#[derive(Copy, Clone, Hash, PartialEq, PartialOrd, Eq, Ord, Debug)]
pub enum ContentFormat {
  /// `text/plain; charset=utf-8` (0)
  Text,
  /// `application/link-format` (40)
  LinkFormat,
  /// `application/xml` (41)
  Xml,
  /// `application/octet-stream` (42)
  OctetStream,
  /// `application/exi` (47)
  Exi,
  /// `application/json` (50)
  Json,
}

impl ContentFormat {
  /// The registry value for this format
  pub fn value(&self) -> u16 {
    match self {
      | ContentFormat::Text => 0,
      | ContentFormat::LinkFormat => 40,
      | ContentFormat::Xml => 41,
      | ContentFormat::OctetStream => 42,
      | ContentFormat::Exi => 47,
      | ContentFormat::Json => 50,
    }
  }

  /// Look a registry value up, `None` for formats outside the recognized set
  pub fn from_value(v: u16) -> Option<ContentFormat> {
    match v {
      | 0 => Some(ContentFormat::Text),
      | 40 => Some(ContentFormat::LinkFormat),
      | 41 => Some(ContentFormat::Xml),
      | 42 => Some(ContentFormat::OctetStream),
      | 47 => Some(ContentFormat::Exi),
      | 50 => Some(ContentFormat::Json),
      | _ => None,
    }
  }
}
