use std::path::PathBuf;

use newt::block::splitter;
use newt::endpoint::Context;
use newt::ident::WorkId;
use newt::net::Addrd;
use newt::resource::Resource;
use newt::Error;
use newt_msg::{Code, Message};

use crate::paths;

/// The client side of the share drive.
///
/// Inbound methods are not served here (the default 5.01 answers apply);
/// what the client does handle is the return traffic of its own requests:
/// download blocks and catalogue entries via `handle_response`, and the
/// body of an upload via `handle_internal`.
pub struct ClientResource {
  name: String,
  downloads: PathBuf,
}

impl ClientResource {
  /// A client resource saving downloads under `downloads`
  pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, downloads: P) -> Self {
    Self { name: name.into(),
           downloads: downloads.into() }
  }
}

impl Resource for ClientResource {
  fn name(&self) -> &str {
    &self.name
  }

  fn handle_internal(&self, ctx: &Context, msg: &Addrd<Message>) -> Result<(), Error> {
    let local = match msg.data().location_path() {
      | Some(l) => paths::expand(l),
      | None => return Ok(()),
    };
    if !local.exists() {
      log::warn!("upload source {} does not exist", local.display());
      return Ok(());
    }

    // the upload request itself must be acknowledged before its body
    // starts flowing
    ctx.pool.wait_settled(WorkId::of(msg));

    splitter::send_file(ctx, msg, &local)
  }

  fn handle_response(&self, ctx: &Context, msg: &Addrd<Message>) -> Result<(), Error> {
    if msg.data().code != Code::CONTENT {
      return Ok(());
    }

    if msg.data().location_path().is_some() {
      ctx.assembler.handle_block(&ctx.pool, msg, &self.downloads)
    } else {
      ctx.assembler.handle_listing(&ctx.pool, msg)
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use newt::config::Config;
  use newt::endpoint::Endpoint;
  use newt::ident::ExchangeId;
  use newt::resource::ResourceRegistry;
  use newt_msg::{known, Block, Id, Payload, Token, Type};

  use super::*;

  #[derive(Debug, Default)]
  struct NullSock;

  impl newt::net::Socket for NullSock {
    fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
      Ok(std::net::SocketAddr::from(([127, 0, 0, 1], 5683)))
    }

    fn send(&self, _: Addrd<&[u8]>) -> std::io::Result<()> {
      Ok(())
    }

    fn recv(&self, _: &mut [u8]) -> std::io::Result<Option<Addrd<usize>>> {
      std::thread::sleep(std::time::Duration::from_millis(5));
      Ok(None)
    }
  }

  fn peer() -> std::net::SocketAddr {
    std::net::SocketAddr::from(([127, 0, 0, 1], 40200))
  }

  #[test]
  fn responses_route_blocks_and_listings() {
    let tmp = tempfile::tempdir().unwrap();
    let resource = ClientResource::new("downloads", tmp.path());
    let ep = Endpoint::new(Config::default(),
                           Arc::new(NullSock),
                           ResourceRegistry::new());
    let ctx = ep.context();
    let token = Token::from_seq(1);

    // a download block: has a Location-Path, lands on disk
    let mut block = Message::new(Type::Con, Code::CONTENT, Id(2), token);
    block.set_block(known::BLOCK2, Block::new(0, false, 6));
    block.set_location_path("got.bin");
    block.payload = Payload(b"bytes".to_vec());
    resource.handle_response(&ctx, &Addrd(block, peer())).unwrap();
    assert_eq!(std::fs::read(tmp.path().join("got.bin")).unwrap(), b"bytes");

    // a listing entry: no Location-Path, lands in the catalogue
    let token2 = Token::from_seq(2);
    let mut entry = Message::new(Type::Con, Code::CONTENT, Id(3), token2);
    entry.set_block(known::BLOCK2, Block::new(0, false, 6));
    entry.payload = Payload(serde_json::json!({"file": "remote.txt"}).to_string()
                                                                     .into_bytes());
    resource.handle_response(&ctx, &Addrd(entry, peer())).unwrap();
    assert_eq!(ctx.assembler.content(), vec!["remote.txt".to_string()]);

    // both exchanges completed
    assert!(ctx.pool
               .wait_overall_timeout(ExchangeId { peer: peer(), token },
                                     std::time::Duration::from_millis(10)));
    assert!(ctx.pool
               .wait_overall_timeout(ExchangeId { peer: peer(), token: token2 },
                                     std::time::Duration::from_millis(10)));
  }

  #[test]
  fn non_content_responses_are_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let resource = ClientResource::new("downloads", tmp.path());
    let ep = Endpoint::new(Config::default(),
                           Arc::new(NullSock),
                           ResourceRegistry::new());

    let changed = Message::new(Type::Ack, Code::CHANGED, Id(1), Token::from_seq(1));
    resource.handle_response(&ep.context(), &Addrd(changed, peer()))
            .unwrap();
    assert!(std::fs::read_dir(tmp.path()).unwrap().next().is_none());
  }
}
