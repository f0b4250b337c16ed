use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use newt_msg::{known, Block, Code, ContentFormat, Message, OptValue, Payload, Type};

use crate::endpoint::Context;
use crate::ident::ExchangeId;
use crate::net::Addrd;
use crate::time::Stopwatch;
use crate::Error;

/// Fragment `path` into CONTENT responses answering `request` and feed
/// them through the transaction pool.
///
/// The request's Block1/Block2 option decides the block family and size.
/// Directories are zipped (stored) into a sibling artefact first, which
/// is deleted once every block has been handed to the pool. Response `i`
/// (1-based) gets id `request.id + i`, the source's file name as
/// Location-Path, and — on the first block only — the total block count
/// in the matching size option.
///
/// Every block passes [`admit`](crate::transaction::TransactionPool::admit)
/// before it is sent, so an exchange the peer has reset aborts instead of
/// producing more traffic.
pub fn send_file(ctx: &Context, request: &Addrd<Message>, path: &Path) -> Result<(), Error> {
  let block_opt = request.data()
                         .block_option()
                         .ok_or(Error::MissingOption(known::BLOCK2))?;
  let szx = request.data().block().map(|b| b.szx).unwrap_or(ctx.cfg.block_szx);
  let block_size = Block::new(0, false, szx).size();

  let mut temp_zip = None;
  let path = if path.is_dir() {
    log::info!("zipping folder {}", path.display());
    let artefact = crate::archive::zip_dir(path)?;
    temp_zip = Some(artefact.clone());
    artefact
  } else {
    path.to_path_buf()
  };

  let cleanup = |temp: &Option<std::path::PathBuf>| {
    if let Some(z) = temp {
      fs::remove_file(z).ok();
    }
  };

  let total = {
    let len = fs::metadata(&path)?.len();
    ((len + block_size as u64 - 1) / block_size as u64) as u32
  };
  let name = path.file_name()
                 .map(|n| n.to_string_lossy().into_owned())
                 .unwrap_or_default();
  let size_opt = request.data()
                        .size_option_for_block()
                        .unwrap_or(known::SIZE2);

  log::info!("<{:?}> sending {} as {} blocks of {}",
             request.data().token,
             path.display(),
             total,
             block_size);

  let mut file = BufReader::new(File::open(&path)?);
  let mut buf = vec![0u8; block_size];
  let watch = Stopwatch::new(ctx.clock.clone());

  for i in 1..=total {
    let n = read_block(&mut file, &mut buf)?;

    let mut resp = Message::new(Type::Con,
                                Code::CONTENT,
                                request.data().id.stepped(i as u16),
                                request.data().token);
    resp.set_content_format(ContentFormat::OctetStream);
    resp.set_location_path(name.clone());
    resp.set_block(block_opt, Block::new(i - 1, i != total, szx));
    if i == 1 {
      resp.set_opt(size_opt, OptValue::Uint(total as u64));
    }
    resp.payload = Payload(buf[..n].to_vec());

    let resp = Addrd(resp, request.addr());

    if !ctx.pool.admit(&resp, i == total) {
      log::warn!("<{:?}> transfer aborted after {} blocks", request.data().token, i - 1);
      cleanup(&temp_zip);
      return Ok(());
    }

    ctx.pool.add(&*ctx.sock, resp, request.data().id)?;
  }

  cleanup(&temp_zip);

  let retransmissions = ctx.pool.retransmit_count(ExchangeId::of(request));
  log::info!("<{:?}> transfer of {} blocks finished in {:?} with {} retransmissions",
             request.data().token,
             total,
             watch.elapsed(),
             retransmissions);

  ctx.pool.finish_overall(ExchangeId::of(request));
  Ok(())
}

/// Walk `root` and answer `request` with one JSON catalogue entry per
/// directory entry: `{"folder": <relative>}` or `{"file": <relative>}`,
/// block-numbered like a file transfer.
///
/// A leading placeholder entry guarantees at least one block, so the
/// more-flag bookkeeping works for an empty tree too.
pub fn send_listing(ctx: &Context, request: &Addrd<Message>, root: &Path) -> Result<(), Error> {
  let block_opt = request.data()
                         .block_option()
                         .ok_or(Error::MissingOption(known::BLOCK2))?;
  let szx = request.data().block().map(|b| b.szx).unwrap_or(ctx.cfg.block_szx);

  let mut entries = vec![serde_json::json!({})];
  walk(root, root, &mut entries)?;
  let total = entries.len() as u32;

  let watch = Stopwatch::new(ctx.clock.clone());

  for (ix, entry) in entries.into_iter().enumerate() {
    let i = ix as u32 + 1;

    let mut resp = Message::new(Type::Con,
                                Code::CONTENT,
                                request.data().id.stepped(i as u16),
                                request.data().token);
    resp.set_content_format(ContentFormat::Json);
    resp.set_block(block_opt, Block::new(i - 1, i != total, szx));
    resp.payload = Payload(entry.to_string().into_bytes());

    let resp = Addrd(resp, request.addr());

    if !ctx.pool.admit(&resp, i == total) {
      log::warn!("<{:?}> listing aborted", request.data().token);
      return Ok(());
    }

    ctx.pool.add(&*ctx.sock, resp, request.data().id)?;
  }

  log::debug!("<{:?}> listing of {} entries sent in {:?}",
              request.data().token,
              total,
              watch.elapsed());
  Ok(())
}

fn walk(root: &Path, dir: &Path, entries: &mut Vec<serde_json::Value>) -> std::io::Result<()> {
  for entry in fs::read_dir(dir)? {
    let path = entry?.path();
    let rel = path.strip_prefix(root)
                  .unwrap_or(&path)
                  .to_string_lossy()
                  .into_owned();

    if path.is_dir() {
      entries.push(serde_json::json!({ "folder": rel }));
      walk(root, &path, entries)?;
    } else {
      entries.push(serde_json::json!({ "file": rel }));
    }
  }
  Ok(())
}

fn read_block(file: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
  let mut filled = 0;
  while filled < buf.len() {
    match file.read(&mut buf[filled..])? {
      | 0 => break,
      | n => filled += n,
    }
  }
  Ok(filled)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use newt_msg::{Id, Token};

  use super::*;
  use crate::config::Config;
  use crate::endpoint::Endpoint;
  use crate::resource::ResourceRegistry;
  use crate::test::{addr, FakeClock, MockSocket};

  fn test_ctx() -> (Context, Arc<MockSocket>) {
    let sock = MockSocket::shared(addr(5683));
    let ep = Endpoint::with_clock(Config::default(),
                                  sock.clone(),
                                  ResourceRegistry::new(),
                                  FakeClock::shared());
    (ep.context(), sock)
  }

  fn download_request(peer: std::net::SocketAddr, szx: u8) -> Addrd<Message> {
    let mut req = Message::new(Type::Con, Code::GET, Id(50), Token::from_seq(3));
    req.set_uri_path("share_drive");
    req.set_block(known::BLOCK2, Block::new(0, false, szx));
    Addrd(req, peer)
  }

  /// finish whatever the splitter has in flight, as the peer's ACKs would
  fn drain_pool(ctx: &Context, sock: &MockSocket) {
    for sent in sock.sent() {
      ctx.pool.finish(&sent);
    }
  }

  #[test]
  fn single_block_file() {
    let (ctx, sock) = test_ctx();
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("hello.txt");
    fs::write(&file, b"hello\n").unwrap();

    // 64-byte blocks
    let req = download_request(addr(40010), 2);
    send_file(&ctx, &req, &file).unwrap();

    let sent = sock.sent();
    assert_eq!(sent.len(), 1);

    let resp = sent[0].data();
    assert_eq!(resp.ty, Type::Con);
    assert_eq!(resp.code, Code::CONTENT);
    assert_eq!(resp.id, Id(51));
    assert_eq!(resp.token, Token::from_seq(3));
    assert_eq!(resp.block(), Some(Block::new(0, false, 2)));
    assert_eq!(resp.size(), Some(1));
    assert_eq!(resp.location_path(), Some("hello.txt"));
    assert_eq!(resp.payload.as_bytes(), b"hello\n");

    assert!(ctx.pool
               .wait_overall_timeout(ExchangeId::of(&req), std::time::Duration::from_secs(1)));
  }

  #[test]
  fn multi_block_numbering_and_sizes() {
    let (ctx, sock) = test_ctx();
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("body.bin");
    fs::write(&file, vec![7u8; 1500]).unwrap();

    // szx 6 -> 1024-byte blocks -> 1024 + 476
    let req = download_request(addr(40011), 6);

    // the pool drains only when the peer acks, which the test does from
    // another thread
    let acker = {
      let (ctx, sock) = (ctx.clone(), sock.clone());
      std::thread::spawn(move || {
        loop {
          drain_pool(&ctx, &sock);
          if ctx.pool
                .wait_overall_timeout(ExchangeId { peer: addr(40011),
                                                   token: Token::from_seq(3) },
                                      std::time::Duration::from_millis(10))
          {
            break;
          }
        }
      })
    };

    send_file(&ctx, &req, &file).unwrap();
    acker.join().unwrap();

    let sent = sock.sent();
    assert_eq!(sent.len(), 2);

    assert_eq!(sent[0].data().block(), Some(Block::new(0, true, 6)));
    assert_eq!(sent[0].data().size(), Some(2));
    assert_eq!(sent[0].data().payload.as_bytes().len(), 1024);

    assert_eq!(sent[1].data().block(), Some(Block::new(1, false, 6)));
    assert_eq!(sent[1].data().size(), None, "only the first block carries the total");
    assert_eq!(sent[1].data().payload.as_bytes().len(), 476);
  }

  #[test]
  fn failed_exchange_stops_production() {
    let (ctx, sock) = test_ctx();
    let tmp = tempfile::tempdir().unwrap();
    let file = tmp.path().join("big.bin");
    fs::write(&file, vec![1u8; 4096]).unwrap();

    let req = download_request(addr(40012), 6);
    ctx.pool.fail_overall(ExchangeId::of(&req));

    send_file(&ctx, &req, &file).unwrap();
    assert!(sock.sent().is_empty(), "no block goes out for a reset exchange");
  }

  #[test]
  fn listing_walks_tree() {
    let (ctx, sock) = test_ctx();
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("docs")).unwrap();
    fs::write(tmp.path().join("docs/readme.md"), b"hi").unwrap();
    fs::write(tmp.path().join("top.txt"), b"x").unwrap();

    let mut req = Message::new(Type::Con, Code::FETCH, Id(10), Token::from_seq(4));
    req.set_uri_path("share_drive");
    req.set_block(known::BLOCK2, Block::new(0, false, 6));
    let req = Addrd(req, addr(40013));

    let acker = {
      let (ctx, sock) = (ctx.clone(), sock.clone());
      std::thread::spawn(move || {
        for _ in 0..100 {
          drain_pool(&ctx, &sock);
          std::thread::sleep(std::time::Duration::from_millis(5));
        }
      })
    };

    send_listing(&ctx, &req, tmp.path()).unwrap();
    acker.join().unwrap();

    let sent = sock.sent();
    // placeholder + folder + 2 files
    assert_eq!(sent.len(), 4);

    let payloads: Vec<serde_json::Value> =
      sent.iter()
          .map(|m| serde_json::from_slice(m.data().payload.as_bytes()).unwrap())
          .collect();
    assert_eq!(payloads[0], serde_json::json!({}));
    assert!(payloads.iter().any(|v| v.get("folder").is_some()));
    assert_eq!(payloads.iter().filter(|v| v.get("file").is_some()).count(), 2);

    // last block clears the more flag
    assert!(!sent.last().unwrap().data().block().unwrap().more);
    assert!(sent[..3].iter().all(|m| m.data().block().unwrap().more));
  }
}
