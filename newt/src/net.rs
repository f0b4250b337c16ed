use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

/// Data that came from (or is headed to) a network socket
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Discard the socket address and get the data in this Addressed
  pub fn unwrap(self) -> T {
    self.0
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Mutably borrow the contents of the addressed item
  pub fn data_mut(&mut self) -> &mut T {
    &mut self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

impl<T> AsMut<T> for Addrd<T> {
  fn as_mut(&mut self) -> &mut T {
    &mut self.0
  }
}

/// A CoAP network socket.
///
/// This narrows [`std::net::UdpSocket`] down to what the runtime needs and
/// lets tests substitute an in-memory transport. Sending must be safe from
/// any thread.
pub trait Socket: Send + Sync + std::fmt::Debug {
  /// Get the local address this socket was bound to
  fn local_addr(&self) -> io::Result<SocketAddr>;

  /// Send a datagram to a remote address
  fn send(&self, msg: Addrd<&[u8]>) -> io::Result<()>;

  /// Pull a buffered datagram from the socket, along with the address of
  /// the sender.
  ///
  /// `Ok(None)` means the receive timeout elapsed with nothing to read;
  /// the caller decides whether to poll again.
  fn recv(&self, buffer: &mut [u8]) -> io::Result<Option<Addrd<usize>>>;
}

/// Shared handle to a socket
pub type SharedSocket = Arc<dyn Socket>;

impl Socket for UdpSocket {
  fn local_addr(&self) -> io::Result<SocketAddr> {
    UdpSocket::local_addr(self)
  }

  fn send(&self, msg: Addrd<&[u8]>) -> io::Result<()> {
    self.send_to(msg.data(), msg.addr()).map(|_| ())
  }

  fn recv(&self, buffer: &mut [u8]) -> io::Result<Option<Addrd<usize>>> {
    match self.recv_from(buffer) {
      | Ok((n, addr)) => Ok(Some(Addrd(n, addr))),
      | Err(e) if matches!(e.kind(),
                           io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
      {
        Ok(None)
      },
      | Err(e) => Err(e),
    }
  }
}

/// Bind a [`UdpSocket`] suitable for an endpoint: blocking reads with
/// `recv_timeout` so the receiver loop can notice shutdown.
pub fn bind<A: ToSocketAddrs>(addr: A, recv_timeout: Duration) -> io::Result<UdpSocket> {
  let sock = UdpSocket::bind(addr)?;
  sock.set_read_timeout(Some(recv_timeout))?;
  Ok(sock)
}

/// Encode a message and put it on the wire
pub fn send(sock: &dyn Socket, msg: Addrd<newt_msg::Message>) -> Result<(), crate::Error> {
  use newt_msg::TryIntoBytes;

  let addr = msg.addr();
  let bytes = msg.unwrap().try_into_bytes()?;
  sock.send(Addrd(&bytes, addr))?;
  Ok(())
}
