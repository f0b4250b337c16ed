use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use newt_msg::{known, Message};

use crate::ident::ExchangeId;
use crate::net::Addrd;
use crate::time::SharedClock;
use crate::transaction::TransactionPool;
use crate::Error;

struct Assembly {
  total: Option<u32>,
  write_index: u32,
  received: HashMap<u32, Vec<u8>>,
  started_at: u64,
}

#[derive(Default)]
struct AsmState {
  in_assembly: HashMap<ExchangeId, Assembly>,
  folders: Vec<String>,
  files: Vec<String>,
  save_dir: Option<PathBuf>,
}

/// Reassembles block-wise transfers, one per exchange, shared by every
/// worker of an endpoint.
///
/// Blocks may arrive in any order; payload bytes are appended to the
/// destination file in strictly increasing block-number order, with
/// out-of-order arrivals parked in a gap buffer until their turn. The
/// destination file is written only under the assembler's lock.
pub struct Assembler {
  clock: SharedClock,
  state: Mutex<AsmState>,
}

impl std::fmt::Debug for Assembler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let st = self.lock();
    f.debug_struct("Assembler")
     .field("in_assembly", &st.in_assembly.len())
     .field("save_dir", &st.save_dir)
     .finish()
  }
}

impl Assembler {
  /// Create an assembler with nothing in flight
  pub fn new(clock: SharedClock) -> Self {
    Self { clock,
           state: Mutex::new(AsmState::default()) }
  }

  fn lock(&self) -> MutexGuard<'_, AsmState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Redirect the next transfer's destination directory (a download's
  /// save location, or an upload's target folder). Cleared automatically
  /// when a transfer completes.
  pub fn set_save_dir(&self, dir: Option<PathBuf>) {
    self.lock().save_dir = dir;
  }

  /// Take one arriving block of a file transfer.
  ///
  /// The destination is `save_dir` (or `default_root`) joined with the
  /// block's Location-Path. A pre-existing destination file is deleted
  /// when the first block of an exchange arrives, never mid-transfer.
  /// When the final contiguous block lands, the exchange is finished in
  /// `pool` and a `.zip` destination is unzipped into its sibling
  /// directory and removed.
  pub fn handle_block(&self,
                      pool: &TransactionPool,
                      msg: &Addrd<Message>,
                      default_root: &Path)
                      -> Result<(), Error> {
    let block = msg.data()
                   .block()
                   .ok_or(Error::MissingOption(known::BLOCK2))?;
    let location = msg.data()
                      .location_path()
                      .ok_or(Error::MissingOption(known::LOCATION_PATH))?
                      .to_string();
    let ex = ExchangeId::of(msg);

    let mut st = self.lock();

    let dest = st.save_dir
                 .clone()
                 .unwrap_or_else(|| default_root.to_path_buf())
                 .join(&location);

    if !st.in_assembly.contains_key(&ex) {
      st.in_assembly.insert(ex,
                            Assembly { total: None,
                                       write_index: 0,
                                       received: HashMap::new(),
                                       started_at: self.clock.now_millis() });

      // never leak a previous (possibly partial) download
      if dest.is_file() {
        fs::remove_file(&dest)?;
      }
      if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
      }
    }

    if block.num == 0 {
      if let Some(total) = msg.data().size() {
        log::info!("<{:?}> downloading {} blocks", msg.data().token, total);
      }
    }

    let assembly = st.in_assembly.get_mut(&ex).expect("inserted above");

    if !block.more {
      assembly.total = Some(block.num);
    }

    if block.num == assembly.write_index {
      append(&dest, msg.data().payload.as_bytes())?;
      assembly.write_index += 1;

      while let Some(parked) = assembly.received.remove(&assembly.write_index) {
        append(&dest, &parked)?;
        assembly.write_index += 1;
      }
    } else {
      assembly.received
              .insert(block.num, msg.data().payload.as_bytes().to_vec());
    }

    let complete = assembly.total
                           .map(|total| assembly.write_index == total + 1)
                           .unwrap_or(false);
    if complete {
      let elapsed = self.clock.now_millis() - assembly.started_at;
      st.in_assembly.remove(&ex);
      st.save_dir = None;
      pool.finish_overall(ex);

      if dest.extension().map(|e| e == "zip").unwrap_or(false) {
        log::info!("<{:?}> unzipping {}", msg.data().token, dest.display());
        crate::archive::unzip_sibling(&dest)?;
        fs::remove_file(&dest)?;
      }

      log::info!("<{:?}> download finished in {}ms", msg.data().token, elapsed);
    }

    Ok(())
  }

  /// Take one arriving entry of a catalogue listing
  /// (`{"folder": …}` / `{"file": …}`); entries with neither key are
  /// placeholders and only advance the more-flag bookkeeping.
  pub fn handle_listing(&self, pool: &TransactionPool, msg: &Addrd<Message>) -> Result<(), Error> {
    let block = msg.data()
                   .block()
                   .ok_or(Error::MissingOption(known::BLOCK2))?;
    let entry: serde_json::Value = serde_json::from_slice(msg.data().payload.as_bytes())?;

    let mut st = self.lock();

    if let Some(folder) = entry.get("folder").and_then(|v| v.as_str()) {
      st.folders.push(folder.to_string());
    } else if let Some(file) = entry.get("file").and_then(|v| v.as_str()) {
      st.files.push(file.to_string());
    }

    if !block.more {
      pool.finish_overall(ExchangeId::of(msg));
    }

    Ok(())
  }

  /// Every known remote path, files and folders, shortest first
  pub fn content(&self) -> Vec<String> {
    let st = self.lock();
    let mut all: Vec<String> = st.files.iter().chain(st.folders.iter()).cloned().collect();
    all.sort_by_key(|p| p.len());
    all
  }

  /// Every known remote folder, shortest first
  pub fn folders(&self) -> Vec<String> {
    let mut folders = self.lock().folders.clone();
    folders.sort_by_key(|p| p.len());
    folders
  }

  /// Forget the catalogue (before a re-sync)
  pub fn clear_content(&self) {
    let mut st = self.lock();
    st.folders.clear();
    st.files.clear();
  }
}

fn append(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
  OpenOptions::new().create(true)
                    .append(true)
                    .open(dest)?
                    .write_all(bytes)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use newt_msg::{Block, Code, Id, Payload, Token, Type};

  use super::*;
  use crate::config::Config;
  use crate::test::{addr, FakeClock};

  fn fixture() -> (Assembler, Arc<TransactionPool>) {
    let clock = FakeClock::shared();
    (Assembler::new(clock.clone()),
     Arc::new(TransactionPool::new(Config::default(), clock)))
  }

  fn content_block(num: u32, more: bool, payload: &[u8], token: Token) -> Addrd<Message> {
    let mut msg = Message::new(Type::Con,
                               Code::CONTENT,
                               Id(100 + num as u16),
                               token);
    msg.set_block(known::BLOCK2, Block::new(num, more, 2));
    msg.set_location_path("out.bin");
    msg.payload = Payload(payload.to_vec());
    Addrd(msg, addr(40020))
  }

  #[test]
  fn in_order_arrival() {
    let (asm, pool) = fixture();
    let tmp = tempfile::tempdir().unwrap();
    let token = Token::from_seq(1);

    for (num, chunk) in [b"aaaa", b"bbbb"].iter().enumerate() {
      asm.handle_block(&pool,
                       &content_block(num as u32, num == 0, chunk.as_slice(), token),
                       tmp.path())
         .unwrap();
    }

    assert_eq!(fs::read(tmp.path().join("out.bin")).unwrap(), b"aaaabbbb");
    assert!(pool.wait_overall_timeout(ExchangeId { peer: addr(40020),
                                                   token },
                                      std::time::Duration::from_millis(10)));
  }

  #[test]
  fn every_arrival_order_writes_in_block_order() {
    // all permutations of four blocks
    let chunks: [&[u8]; 4] = [b"one-", b"two-", b"three-", b"four"];
    let expected = b"one-two-three-four".to_vec();

    let mut orders = Vec::new();
    for a in 0..4u32 {
      for b in 0..4u32 {
        for c in 0..4u32 {
          for d in 0..4u32 {
            let order = [a, b, c, d];
            let mut sorted = order;
            sorted.sort_unstable();
            if sorted == [0, 1, 2, 3] {
              orders.push(order);
            }
          }
        }
      }
    }
    assert_eq!(orders.len(), 24);

    for (ix, order) in orders.into_iter().enumerate() {
      let (asm, pool) = fixture();
      let tmp = tempfile::tempdir().unwrap();
      let token = Token::from_seq(ix as u64);
      let dest = tmp.path().join("out.bin");

      for num in order {
        asm.handle_block(&pool,
                         &content_block(num, num != 3, chunks[num as usize], token),
                         tmp.path())
           .unwrap();

        // at no point may a later chunk appear before an earlier one
        if dest.exists() {
          let written = fs::read(&dest).unwrap();
          assert!(expected.starts_with(&written),
                  "order {:?}: {:?} is not a prefix of the source",
                  order,
                  String::from_utf8_lossy(&written));
        }
      }

      assert_eq!(fs::read(&dest).unwrap(), expected, "order {:?}", order);
    }
  }

  #[test]
  fn preexisting_destination_is_replaced() {
    let (asm, pool) = fixture();
    let tmp = tempfile::tempdir().unwrap();
    let token = Token::from_seq(9);
    fs::write(tmp.path().join("out.bin"), b"stale bytes").unwrap();

    asm.handle_block(&pool, &content_block(0, false, b"fresh", token), tmp.path())
       .unwrap();

    assert_eq!(fs::read(tmp.path().join("out.bin")).unwrap(), b"fresh");
  }

  #[test]
  fn save_dir_redirects_and_resets() {
    let (asm, pool) = fixture();
    let tmp = tempfile::tempdir().unwrap();
    let elsewhere = tmp.path().join("elsewhere");
    fs::create_dir_all(&elsewhere).unwrap();

    asm.set_save_dir(Some(elsewhere.clone()));
    asm.handle_block(&pool,
                     &content_block(0, false, b"payload", Token::from_seq(2)),
                     tmp.path())
       .unwrap();

    assert!(elsewhere.join("out.bin").is_file());
    assert!(!tmp.path().join("out.bin").exists());

    // the redirect is one-shot
    asm.handle_block(&pool,
                     &content_block(0, false, b"payload", Token::from_seq(3)),
                     tmp.path())
       .unwrap();
    assert!(tmp.path().join("out.bin").is_file());
  }

  #[test]
  fn zip_destination_unzips_on_completion() {
    let (asm, pool) = fixture();
    let tmp = tempfile::tempdir().unwrap();

    // build a real stored zip to feed through
    let src = tmp.path().join("bundle");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("inner.txt"), b"zipped!").unwrap();
    let archive = crate::archive::zip_dir(&src).unwrap();
    let bytes = fs::read(&archive).unwrap();
    fs::remove_file(&archive).unwrap();
    fs::remove_dir_all(&src).unwrap();

    let token = Token::from_seq(5);
    let mut msg = Message::new(Type::Con, Code::CONTENT, Id(1), token);
    msg.set_block(known::BLOCK2, Block::new(0, false, 6));
    msg.set_location_path("bundle.zip");
    msg.payload = Payload(bytes);

    asm.handle_block(&pool, &Addrd(msg, addr(40021)), tmp.path())
       .unwrap();

    assert!(tmp.path().join("bundle/inner.txt").is_file());
    assert!(!tmp.path().join("bundle.zip").exists(),
            "the archive is deleted after extraction");
    assert_eq!(fs::read(tmp.path().join("bundle/inner.txt")).unwrap(), b"zipped!");
  }

  #[test]
  fn listing_accumulates_catalog() {
    let (asm, pool) = fixture();
    let token = Token::from_seq(6);

    let entry = |num, more, body: serde_json::Value| {
      let mut msg = Message::new(Type::Con, Code::CONTENT, Id(num as u16), token);
      msg.set_block(known::BLOCK2, Block::new(num, more, 6));
      msg.payload = Payload(body.to_string().into_bytes());
      Addrd(msg, addr(40022))
    };

    asm.handle_listing(&pool, &entry(0, true, serde_json::json!({}))).unwrap();
    asm.handle_listing(&pool, &entry(1, true, serde_json::json!({"folder": "docs"})))
       .unwrap();
    asm.handle_listing(&pool,
                       &entry(2, false, serde_json::json!({"file": "docs/readme.md"})))
       .unwrap();

    assert_eq!(asm.folders(), vec!["docs".to_string()]);
    assert_eq!(asm.content(),
               vec!["docs".to_string(), "docs/readme.md".to_string()]);
    assert!(pool.wait_overall_timeout(ExchangeId { peer: addr(40022),
                                                   token },
                                      std::time::Duration::from_millis(10)));

    asm.clear_content();
    assert!(asm.content().is_empty());
  }
}
