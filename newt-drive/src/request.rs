//! Builders for the requests the client sends.
//!
//! Every request is confirmable and addressed at the server's
//! `share_drive` resource; the endpoint stamps the token when the
//! request is submitted.

use std::sync::atomic::{AtomicU16, Ordering};

use newt_msg::{known, Block, Code, ContentFormat, Id, Message, Payload, Token, Type};
use rand::Rng;

/// First Uri-Path segment every drive request addresses
pub const RESOURCE: &str = "share_drive";

/// Stamps drive requests with ids from a random-seeded wrapping counter
#[derive(Debug)]
pub struct RequestFactory {
  next_id: AtomicU16,
}

impl Default for RequestFactory {
  fn default() -> Self {
    Self::new()
  }
}

impl RequestFactory {
  /// A factory whose id sequence starts at a random point
  pub fn new() -> Self {
    Self { next_id: AtomicU16::new(rand::thread_rng().gen()) }
  }

  fn next(&self, code: Code) -> Message {
    let id = Id(self.next_id.fetch_add(1, Ordering::SeqCst));
    let mut msg = Message::new(Type::Con, code, id, Token::default());
    msg.set_uri_path(RESOURCE);
    msg
  }

  /// GET a remote file or folder, block-wise via Block2
  pub fn download(&self, remote: &str, szx: u8) -> Message {
    let mut msg = self.next(Code::GET);
    msg.set_location_path(remote);
    msg.set_block(known::BLOCK2, Block::new(0, false, szx));
    msg
  }

  /// PUT a local file or folder, block-wise via Block1; the payload names
  /// the remote directory to land in
  pub fn upload(&self, local: &str, remote_dir: &str, szx: u8) -> Message {
    let mut msg = self.next(Code::PUT);
    msg.set_location_path(local);
    msg.set_block(known::BLOCK1, Block::new(0, false, szx));
    msg.set_content_format(ContentFormat::Json);
    msg.payload = json_payload(serde_json::json!({ "upload_path": remote_dir }));
    msg
  }

  /// POST a rename of a remote path
  pub fn rename(&self, remote: &str, new_name: &str) -> Message {
    self.change(remote, serde_json::json!({ "rename": new_name }))
  }

  /// POST a move of a remote path to another remote directory
  pub fn relocate(&self, remote: &str, new_location: &str) -> Message {
    self.change(remote, serde_json::json!({ "move": new_location }))
  }

  fn change(&self, remote: &str, body: serde_json::Value) -> Message {
    let mut msg = self.next(Code::POST);
    msg.set_location_path(remote);
    msg.set_content_format(ContentFormat::Json);
    msg.payload = json_payload(body);
    msg
  }

  /// DELETE a remote path
  pub fn delete(&self, remote: &str) -> Message {
    let mut msg = self.next(Code::DELETE);
    msg.set_location_path(remote);
    msg
  }

  /// FETCH the remote catalogue, block-wise via Block2
  pub fn fetch(&self, szx: u8) -> Message {
    let mut msg = self.next(Code::FETCH);
    msg.set_block(known::BLOCK2, Block::new(0, false, szx));
    msg
  }
}

fn json_payload(v: serde_json::Value) -> Payload {
  Payload(v.to_string().into_bytes())
}

/// Read a request's JSON control payload
pub fn control_payload(msg: &Message) -> Option<serde_json::Value> {
  serde_json::from_slice(msg.payload.as_bytes()).ok()
}

/// A string field out of a request's JSON control payload
pub fn control_field(msg: &Message, field: &str) -> Option<String> {
  control_payload(msg)?.get(field)
                       .and_then(|v| v.as_str())
                       .map(String::from)
}

#[cfg(test)]
mod tests {
  use newt_msg::OptValue;

  use super::*;

  #[test]
  fn download_shape() {
    let factory = RequestFactory::new();
    let msg = factory.download("notes/todo.txt", 6);

    assert_eq!(msg.ty, Type::Con);
    assert_eq!(msg.code, Code::GET);
    assert_eq!(msg.uri_path(), Some(RESOURCE));
    assert_eq!(msg.location_path(), Some("notes/todo.txt"));
    assert_eq!(msg.block(), Some(Block::new(0, false, 6)));
    assert_eq!(msg.block_option(), Some(known::BLOCK2));
  }

  #[test]
  fn upload_carries_target_dir() {
    let factory = RequestFactory::new();
    let msg = factory.upload("/home/me/a.bin", "backups", 6);

    assert_eq!(msg.code, Code::PUT);
    assert_eq!(msg.block_option(), Some(known::BLOCK1));
    assert_eq!(msg.content_format(), Some(ContentFormat::Json));
    assert_eq!(control_field(&msg, "upload_path").as_deref(), Some("backups"));
  }

  #[test]
  fn change_payloads() {
    let factory = RequestFactory::new();
    assert_eq!(control_field(&factory.rename("a.txt", "b.txt"), "rename").as_deref(),
               Some("b.txt"));
    assert_eq!(control_field(&factory.relocate("a.txt", "archive"), "move").as_deref(),
               Some("archive"));
  }

  #[test]
  fn ids_advance() {
    let factory = RequestFactory::new();
    let a = factory.fetch(6).id;
    let b = factory.fetch(6).id;
    assert_eq!(b.0, a.0.wrapping_add(1));
  }

  #[test]
  fn fetch_has_no_location() {
    let factory = RequestFactory::new();
    let msg = factory.fetch(6);
    assert_eq!(msg.location_path(), None);
    assert_eq!(msg.get_opt(known::BLOCK2),
               Some(&OptValue::Uint(Block::new(0, false, 6).encode() as u64)));
  }
}
