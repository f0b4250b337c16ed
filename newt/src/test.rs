//! Shared test fixtures: a hand-advanced clock and an in-memory socket.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use newt_msg::{Code, Id, Message, Token, TryFromBytes, Type};

use crate::net::{Addrd, Socket};
use crate::time::Clock;

/// A [`Clock`] the test advances by hand.
#[derive(Debug, Default)]
pub(crate) struct FakeClock(AtomicU64);

impl FakeClock {
  pub(crate) fn shared() -> Arc<FakeClock> {
    Arc::new(FakeClock::default())
  }

  pub(crate) fn advance(&self, millis: u64) {
    self.0.fetch_add(millis, Ordering::SeqCst);
  }
}

impl Clock for FakeClock {
  fn now_millis(&self) -> u64 {
    self.0.load(Ordering::SeqCst)
  }
}

/// An in-memory [`Socket`]: sends are recorded, receives pop a queue the
/// test fills.
#[derive(Debug)]
pub(crate) struct MockSocket {
  local: SocketAddr,
  inbox: Mutex<VecDeque<Addrd<Vec<u8>>>>,
  outbox: Mutex<Vec<Addrd<Vec<u8>>>>,
}

impl MockSocket {
  pub(crate) fn new(local: SocketAddr) -> MockSocket {
    MockSocket { local,
                 inbox: Mutex::new(VecDeque::new()),
                 outbox: Mutex::new(Vec::new()) }
  }

  pub(crate) fn shared(local: SocketAddr) -> Arc<MockSocket> {
    Arc::new(Self::new(local))
  }

  /// Queue a datagram for the next `recv`
  pub(crate) fn push_inbound(&self, datagram: Addrd<Vec<u8>>) {
    self.inbox.lock().unwrap().push_back(datagram);
  }

  /// Everything sent so far, decoded
  pub(crate) fn sent(&self) -> Vec<Addrd<Message>> {
    self.outbox
        .lock()
        .unwrap()
        .iter()
        .map(|d| d.as_ref().map(|bytes| Message::try_from_bytes(bytes).unwrap()))
        .collect()
  }

  /// Everything sent so far, raw
  pub(crate) fn sent_raw(&self) -> Vec<Addrd<Vec<u8>>> {
    self.outbox.lock().unwrap().clone()
  }

  pub(crate) fn clear_sent(&self) {
    self.outbox.lock().unwrap().clear();
  }
}

impl Socket for MockSocket {
  fn local_addr(&self) -> io::Result<SocketAddr> {
    Ok(self.local)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> io::Result<()> {
    self.outbox
        .lock()
        .unwrap()
        .push(Addrd(msg.data().to_vec(), msg.addr()));
    Ok(())
  }

  fn recv(&self, buffer: &mut [u8]) -> io::Result<Option<Addrd<usize>>> {
    match self.inbox.lock().unwrap().pop_front() {
      | Some(Addrd(bytes, addr)) => {
        let n = bytes.len().min(buffer.len());
        buffer[..n].copy_from_slice(&bytes[..n]);
        Ok(Some(Addrd(n, addr)))
      },
      | None => {
        // stand in for the 1s poll timeout without stalling tests
        std::thread::sleep(std::time::Duration::from_millis(5));
        Ok(None)
      },
    }
  }
}

pub(crate) fn addr(port: u16) -> SocketAddr {
  SocketAddr::from(([127, 0, 0, 1], port))
}

/// A plain confirmable GET, deterministic for a given (id, token)
pub(crate) fn con_request(id: Id, token: Token, peer: SocketAddr) -> Addrd<Message> {
  let mut msg = Message::new(Type::Con, Code::GET, id, token);
  msg.set_uri_path("share_drive");
  Addrd(msg, peer)
}
