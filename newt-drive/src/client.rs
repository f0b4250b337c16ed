use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use newt::endpoint::Endpoint;
use newt::ident::ExchangeId;
use newt::Error;

use crate::request::RequestFactory;

/// High-level drive operations against one server, driven over a running
/// [`Endpoint`].
///
/// Every operation stamps a fresh token, submits the request as an
/// internal task, and — where the server answers with a transfer —
/// blocks until the whole exchange completes.
pub struct DriveClient {
  endpoint: Arc<Endpoint>,
  server: SocketAddr,
  requests: RequestFactory,
  szx: u8,
}

impl DriveClient {
  /// A client talking to `server` through `endpoint`
  pub fn new(endpoint: Arc<Endpoint>, server: SocketAddr) -> Self {
    let szx = endpoint.context().cfg.block_szx;
    Self { endpoint,
           server,
           requests: RequestFactory::new(),
           szx }
  }

  /// Re-sync the remote catalogue (blocks until the listing finishes)
  pub fn refresh_catalog(&self) -> Result<(), Error> {
    self.endpoint.assembler().clear_content();

    let msg = self.endpoint
                  .submit_internal(self.requests.fetch(self.szx), self.server, false)?;
    self.endpoint.pool().wait_overall(ExchangeId::of(&msg));
    Ok(())
  }

  /// Download `remote`, saving under `save_dir` (or the default download
  /// directory); blocks until the file is reassembled
  pub fn download(&self, remote: &str, save_dir: Option<PathBuf>) -> Result<(), Error> {
    self.endpoint.assembler().set_save_dir(save_dir);

    let msg = self.endpoint
                  .submit_internal(self.requests.download(remote, self.szx),
                                   self.server,
                                   false)?;
    self.endpoint.pool().wait_overall(ExchangeId::of(&msg));
    Ok(())
  }

  /// Upload the local path `local` into the remote directory
  /// `remote_dir`; blocks until every block is acknowledged
  pub fn upload(&self, local: &str, remote_dir: &str) -> Result<(), Error> {
    let msg = self.endpoint
                  .submit_internal(self.requests.upload(local, remote_dir, self.szx),
                                   self.server,
                                   true)?;
    self.endpoint.pool().wait_overall(ExchangeId::of(&msg));
    Ok(())
  }

  /// Rename a remote path
  pub fn rename(&self, remote: &str, new_name: &str) -> Result<(), Error> {
    self.endpoint
        .submit_internal(self.requests.rename(remote, new_name), self.server, false)?;
    Ok(())
  }

  /// Move a remote path into another remote directory
  pub fn relocate(&self, remote: &str, new_location: &str) -> Result<(), Error> {
    self.endpoint
        .submit_internal(self.requests.relocate(remote, new_location),
                         self.server,
                         false)?;
    Ok(())
  }

  /// Delete a remote path
  pub fn delete(&self, remote: &str) -> Result<(), Error> {
    self.endpoint
        .submit_internal(self.requests.delete(remote), self.server, false)?;
    Ok(())
  }

  /// Everything the last catalogue sync saw, shortest first
  pub fn content(&self) -> Vec<String> {
    self.endpoint.assembler().content()
  }

  /// The remote folders the last catalogue sync saw
  pub fn folders(&self) -> Vec<String> {
    self.endpoint.assembler().folders()
  }
}
