use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use newt_msg::{Code, Message};

use crate::endpoint::Context;
use crate::ident::WorkId;
use crate::net::{self, Addrd};
use crate::resource::ResourceRegistry;
use crate::template;

/// One unit of work for a [`Worker`]
#[derive(Debug)]
pub enum Job {
  /// A message that arrived off the wire
  Net(Addrd<Message>),
  /// Application-initiated outbound work, routed to
  /// [`Resource::handle_internal`](crate::resource::Resource::handle_internal)
  Internal(Addrd<Message>),
  /// Drain and exit
  Stop,
}

/// A worker thread executing routed messages against the matching
/// [`Resource`](crate::resource::Resource).
///
/// Tracks its queue depth, whether it is inside a blocking handler
/// (uploads and downloads hold a worker for the whole transfer), and how
/// long it has sat idle so the reaper can retire it.
pub struct Worker {
  tx: Sender<Job>,
  depth: Arc<AtomicUsize>,
  blocking: Arc<AtomicBool>,
  last_active: Arc<AtomicU64>,
  handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Worker {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Worker")
     .field("depth", &self.queue_depth())
     .field("blocking", &self.is_blocking())
     .finish()
  }
}

impl Worker {
  /// Spawn a worker thread
  pub fn spawn(ctx: Context,
               registry: Arc<ResourceRegistry>,
               dedup: Arc<Mutex<HashMap<WorkId, u64>>>)
               -> Worker {
    let (tx, rx) = mpsc::channel::<Job>();
    let depth = Arc::new(AtomicUsize::new(0));
    let blocking = Arc::new(AtomicBool::new(false));
    let last_active = Arc::new(AtomicU64::new(ctx.clock.now_millis()));

    let handle = {
      let (depth, blocking, last_active) = (depth.clone(), blocking.clone(), last_active.clone());

      std::thread::Builder::new().name("newt-worker".into())
                                 .spawn(move || {
                                   while let Ok(job) = rx.recv() {
                                     let msg = match job {
                                       | Job::Stop => break,
                                       | Job::Net(msg) => {
                                         depth.fetch_sub(1, Ordering::SeqCst);
                                         solve(&ctx, &registry, &blocking, &msg, false);
                                         msg
                                       },
                                       | Job::Internal(msg) => {
                                         depth.fetch_sub(1, Ordering::SeqCst);
                                         solve(&ctx, &registry, &blocking, &msg, true);
                                         msg
                                       },
                                     };

                                     dedup.lock()
                                          .unwrap_or_else(|e| e.into_inner())
                                          .remove(&WorkId::of(&msg));
                                     last_active.store(ctx.clock.now_millis(), Ordering::SeqCst);
                                   }
                                 })
                                 .expect("worker thread spawn")
    };

    Worker { tx,
             depth,
             blocking,
             last_active,
             handle: Some(handle) }
  }

  /// Queue a job on this worker
  pub fn submit(&self, job: Job) {
    self.depth.fetch_add(1, Ordering::SeqCst);
    self.tx.send(job).ok();
  }

  /// How many jobs are waiting (or running)
  pub fn queue_depth(&self) -> usize {
    self.depth.load(Ordering::SeqCst)
  }

  /// Whether the worker is inside a blocking (upload/download) handler
  pub fn is_blocking(&self) -> bool {
    self.blocking.load(Ordering::SeqCst)
  }

  /// Time since the worker last finished a job
  pub fn idle_for(&self, now_millis: u64) -> Duration {
    Duration::from_millis(now_millis.saturating_sub(self.last_active.load(Ordering::SeqCst)))
  }

  /// Ask the thread to exit and wait for it
  pub fn stop(mut self) {
    self.tx.send(Job::Stop).ok();
    if let Some(handle) = self.handle.take() {
      handle.join().ok();
    }
  }
}

/// Route one message to its resource and run the matching handler.
fn solve(ctx: &Context,
         registry: &ResourceRegistry,
         blocking: &AtomicBool,
         msg: &Addrd<Message>,
         internal: bool) {
  let m = msg.data();

  if m.uri_path().is_none() && m.code.is_method() {
    log::warn!("{} from {} carries no Uri-Path", m.code, msg.addr());
    reply(ctx, msg, Code::BAD_REQUEST);
    return;
  }

  let segment = m.uri_path().map(|p| p.split('/').next().unwrap_or(p));
  let resource = match registry.lookup(segment) {
    | Some(r) => r,
    | None => {
      log::warn!("no resource for {:?}", segment);
      reply(ctx, msg, Code::NOT_FOUND);
      return;
    },
  };

  let outcome = if internal {
    resource.handle_internal(ctx, msg)
  } else {
    match m.code {
      | Code::GET => with_blocking(blocking, || resource.handle_get(ctx, msg)),
      | Code::PUT => with_blocking(blocking, || resource.handle_put(ctx, msg)),
      | Code::POST => resource.handle_post(ctx, msg),
      | Code::DELETE => resource.handle_delete(ctx, msg),
      | Code::FETCH => resource.handle_fetch(ctx, msg),
      | _ => resource.handle_response(ctx, msg),
    }
  };

  if let Err(e) = outcome {
    log::error!("handler for {} {:?} failed: {}", m.code, msg.addr(), e);
    reply(ctx, msg, Code::INTERNAL_SERVER_ERROR);
  }
}

fn with_blocking<R>(flag: &AtomicBool, f: impl FnOnce() -> R) -> R {
  flag.store(true, Ordering::SeqCst);
  let out = f();
  flag.store(false, Ordering::SeqCst);
  out
}

fn reply(ctx: &Context, msg: &Addrd<Message>, code: Code) {
  let rst = template::reset(code, msg.data().token, msg.data().id);
  if let Err(e) = net::send(&*ctx.sock, Addrd(rst, msg.addr())) {
    log::warn!("reply {} to {} failed: {}", code, msg.addr(), e);
  }
}
