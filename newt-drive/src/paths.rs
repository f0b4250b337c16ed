use std::path::PathBuf;

/// The user's home directory, falling back to the current directory when
/// the environment doesn't say.
pub fn home() -> PathBuf {
  std::env::var_os("HOME").map(PathBuf::from)
                          .unwrap_or_else(|| PathBuf::from("."))
}

/// Where the server keeps a named resource's files:
/// `<home>/coap/server/resources/<name>/`
pub fn server_root(resource_name: &str) -> PathBuf {
  home().join("coap/server/resources").join(resource_name)
}

/// Where client downloads land by default:
/// `<home>/coap/client/resources/downloads/`
pub fn client_downloads_root() -> PathBuf {
  home().join("coap/client/resources/downloads")
}

/// Expand a user-entered path: `~/x` and relative paths resolve against
/// the home directory, absolute paths stand as given.
pub fn expand(input: &str) -> PathBuf {
  match input.strip_prefix("~/") {
    | Some(rest) => home().join(rest),
    | None if input.starts_with('/') => PathBuf::from(input),
    | None => home().join(input),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expansion() {
    assert_eq!(expand("/tmp/x"), PathBuf::from("/tmp/x"));
    assert_eq!(expand("~/files/y"), home().join("files/y"));
    assert_eq!(expand("files/y"), home().join("files/y"));
  }

  #[test]
  fn conventional_roots() {
    assert!(server_root("share_drive").ends_with("coap/server/resources/share_drive"));
    assert!(client_downloads_root().ends_with("coap/client/resources/downloads"));
  }
}
