use std::sync::Arc;

use newt_msg::{Code, Message};

use crate::endpoint::Context;
use crate::net::{self, Addrd};
use crate::template;
use crate::Error;

/// A named handler the endpoint routes requests to by the first segment
/// of their Uri-Path.
///
/// One handler per recognized method, plus [`Resource::handle_response`]
/// for success responses received on this endpoint and
/// [`Resource::handle_internal`] for application-initiated outbound work.
/// Every handler defaults to answering 5.01 NOT_IMPLEMENTED.
pub trait Resource: Send + Sync {
  /// The name routing matches against the first Uri-Path segment
  fn name(&self) -> &str;

  /// GET
  fn handle_get(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    not_implemented(ctx, req)
  }

  /// POST
  fn handle_post(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    not_implemented(ctx, req)
  }

  /// PUT
  fn handle_put(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    not_implemented(ctx, req)
  }

  /// DELETE
  fn handle_delete(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    not_implemented(ctx, req)
  }

  /// FETCH
  fn handle_fetch(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    not_implemented(ctx, req)
  }

  /// A success response arrived for work this endpoint originated
  fn handle_response(&self, ctx: &Context, msg: &Addrd<Message>) -> Result<(), Error> {
    not_implemented(ctx, msg)
  }

  /// Application-initiated outbound work (e.g. reading and splitting a
  /// local file once the peer has acknowledged the request)
  fn handle_internal(&self, ctx: &Context, msg: &Addrd<Message>) -> Result<(), Error> {
    not_implemented(ctx, msg)
  }
}

/// The default handler body: a 5.01 RST back to the peer
fn not_implemented(ctx: &Context, msg: &Addrd<Message>) -> Result<(), Error> {
  net::send(&*ctx.sock,
            Addrd(template::reset(Code::NOT_IMPLEMENTED, msg.data().token, msg.data().id),
                  msg.addr()))
}

/// Ordered list of named [`Resource`]s plus an optional default used when
/// no name matches (or the message has no path at all).
#[derive(Default)]
pub struct ResourceRegistry {
  named: Vec<Arc<dyn Resource>>,
  default: Option<Arc<dyn Resource>>,
}

impl std::fmt::Debug for ResourceRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ResourceRegistry")
     .field("named",
            &self.named.iter().map(|r| r.name()).collect::<Vec<_>>())
     .field("default", &self.default.as_ref().map(|r| r.name()))
     .finish()
  }
}

impl ResourceRegistry {
  /// An empty registry
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a named resource
  pub fn add(&mut self, resource: Arc<dyn Resource>) {
    self.named.push(resource);
  }

  /// Register the fallback resource
  pub fn set_default(&mut self, resource: Arc<dyn Resource>) {
    self.default = Some(resource);
  }

  /// Find the resource for the first Uri-Path segment of a message.
  ///
  /// `None` segment (no path) falls through to the default, as do
  /// segments matching no name.
  pub fn lookup(&self, segment: Option<&str>) -> Option<&dyn Resource> {
    segment.and_then(|s| self.named.iter().find(|r| r.name() == s))
           .or(self.default.as_ref())
           .map(AsRef::as_ref)
  }
}
