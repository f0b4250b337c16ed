use std::fs;
use std::path::{Path, PathBuf};

use newt::block::splitter;
use newt::endpoint::Context;
use newt::net::{self, Addrd};
use newt::resource::Resource;
use newt::template;
use newt::Error;
use newt_msg::{Code, Message};

use crate::request;

/// The server side of the share drive.
///
/// Serves one directory tree: GET streams a file (or zipped folder) out
/// block-wise, PUT arms the assembler for an incoming upload, POST
/// renames or moves, DELETE removes, FETCH streams the catalogue. All
/// paths in requests are relative to the resource root.
pub struct DriveResource {
  name: String,
  root: PathBuf,
}

impl DriveResource {
  /// A drive resource named `name` rooted at `root`
  pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, root: P) -> Self {
    Self { name: name.into(),
           root: root.into() }
  }

  /// Refuse a request with an error RST and fail the exchange locally,
  /// so blocks already in flight for it are dropped instead of assembled
  fn reply(&self, ctx: &Context, msg: &Addrd<Message>, code: Code) -> Result<(), Error> {
    ctx.pool.fail_overall(newt::ident::ExchangeId::of(msg));
    net::send(&*ctx.sock,
              Addrd(template::reset(code, msg.data().token, msg.data().id),
                    msg.addr()))
  }

  fn ack(&self, ctx: &Context, msg: &Addrd<Message>, ack: Message) -> Result<(), Error> {
    net::send(&*ctx.sock, Addrd(ack, msg.addr()))
  }

  /// Resolve a request's Location-Path inside the resource root
  fn resolve(&self, location: &str) -> PathBuf {
    self.root.join(location.trim_start_matches('/'))
  }
}

impl Resource for DriveResource {
  fn name(&self) -> &str {
    &self.name
  }

  fn handle_get(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    let (location, has_block) = (req.data().location_path(), req.data().block().is_some());

    match location {
      | Some(location) if has_block => {
        let path = self.resolve(location);
        if !path.exists() {
          log::warn!("download of missing path {:?}", location);
          self.reply(ctx, req, Code::NOT_FOUND)
        } else {
          splitter::send_file(ctx, req, &path)
        }
      },
      | _ => self.reply(ctx, req, Code::BAD_REQUEST),
    }
  }

  fn handle_put(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    let location = req.data().location_path();
    let upload_path = request::control_field(req.data(), "upload_path");

    let (location, upload_path) = match (location, req.data().block(), upload_path) {
      | (Some(l), Some(_), Some(u)) => (l, u),
      | _ => return self.reply(ctx, req, Code::BAD_REQUEST),
    };

    let upload_dir = self.resolve(&upload_path);
    if !upload_dir.is_dir() {
      log::warn!("upload into missing directory {:?}", upload_path);
      return self.reply(ctx, req, Code::BAD_REQUEST);
    }

    let file_name = Path::new(location).file_name()
                                       .map(|n| n.to_string_lossy().into_owned())
                                       .unwrap_or_default();
    if upload_dir.join(&file_name).exists() {
      log::warn!("upload target {:?} already exists", file_name);
      return self.reply(ctx, req, Code::CONFLICT);
    }

    // the blocks themselves arrive as CONTENT responses
    ctx.assembler.set_save_dir(Some(upload_dir));
    Ok(())
  }

  fn handle_post(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    let location = match req.data().location_path() {
      | Some(l) => l,
      | None => return self.reply(ctx, req, Code::BAD_REQUEST),
    };
    let path = self.resolve(location);
    if !path.exists() {
      return self.reply(ctx, req, Code::BAD_REQUEST);
    }

    if let Some(new_name) = request::control_field(req.data(), "rename") {
      let target = path.parent().unwrap_or(&self.root).join(new_name);
      fs::rename(&path, &target)?;
      return self.ack(ctx, req,
                      template::changed_ack(req.data().token, req.data().id));
    }

    if let Some(new_location) = request::control_field(req.data(), "move") {
      let dst = self.resolve(&new_location);
      let target = if dst.is_dir() {
        dst.join(path.file_name().unwrap_or_default())
      } else {
        dst
      };
      fs::rename(&path, &target)?;
      return self.ack(ctx, req,
                      template::changed_ack(req.data().token, req.data().id));
    }

    self.reply(ctx, req, Code::BAD_REQUEST)
  }

  fn handle_delete(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    let location = match req.data().location_path() {
      | Some(l) => l,
      | None => return self.reply(ctx, req, Code::BAD_REQUEST),
    };
    let path = self.resolve(location);

    if path.is_file() {
      fs::remove_file(&path)?;
    } else if path.is_dir() {
      fs::remove_dir_all(&path)?;
    } else {
      return self.reply(ctx, req, Code::BAD_REQUEST);
    }

    log::info!("deleted {:?}", location);
    self.ack(ctx, req,
             template::deleted_ack(req.data().token, req.data().id))
  }

  fn handle_fetch(&self, ctx: &Context, req: &Addrd<Message>) -> Result<(), Error> {
    splitter::send_listing(ctx, req, &self.root)
  }

  fn handle_response(&self, ctx: &Context, msg: &Addrd<Message>) -> Result<(), Error> {
    // upload blocks landing on the server
    if msg.data().code == Code::CONTENT && msg.data().location_path().is_some() {
      ctx.assembler.handle_block(&ctx.pool, msg, &self.root)?;
    }
    Ok(())
  }

  fn handle_internal(&self, _: &Context, _: &Addrd<Message>) -> Result<(), Error> {
    Ok(())
  }
}
