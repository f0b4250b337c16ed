use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use newt_msg::{Code, Id, Message, Token, TryFromBytes, Type, MAX_DATAGRAM_SIZE};
use rand::Rng;

use crate::block::Assembler;
use crate::config::Config;
use crate::ident::{ExchangeId, WorkId};
use crate::net::{self, Addrd, SharedSocket};
use crate::resource::ResourceRegistry;
use crate::template;
use crate::time::{SharedClock, SystemClock};
use crate::transaction::TransactionPool;
use crate::worker::{Job, Worker};
use crate::Error;

/// The collaborators a handler may touch, bundled so resources receive
/// them explicitly instead of reaching for process globals.
#[derive(Clone, Debug)]
pub struct Context {
  /// Runtime configuration
  pub cfg: Config,
  /// The endpoint's socket; send-safe from any thread
  pub sock: SharedSocket,
  /// In-flight transaction tracking
  pub pool: Arc<TransactionPool>,
  /// Block reassembly state, shared across workers
  pub assembler: Arc<Assembler>,
  /// The endpoint's clock
  pub clock: SharedClock,
}

/// A CoAP endpoint: one UDP socket, the transaction pool driving
/// retransmission, a growable worker set, and the dispatch state machine
/// between them.
///
/// Acts symmetrically as client and server. Background activities run on
/// dedicated threads once [`Endpoint::start`] is called:
///
/// 1. the receiver pulls datagrams off the socket;
/// 2. the dispatcher decodes, validates, acknowledges and assigns work;
/// 3. the transaction driver sweeps the pool about once a second;
/// 4. the reaper retires workers idle for over a minute.
pub struct Endpoint {
  ctx: Context,
  registry: Arc<ResourceRegistry>,
  dedup: Arc<Mutex<HashMap<WorkId, u64>>>,
  workers: Mutex<Vec<Worker>>,
  running: Arc<AtomicBool>,
  handles: Mutex<Vec<JoinHandle<()>>>,
  seq: AtomicU64,
  parked: Mutex<()>,
  unpark: Condvar,
}

impl std::fmt::Debug for Endpoint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Endpoint")
     .field("registry", &self.registry)
     .field("running", &self.running.load(Ordering::SeqCst))
     .finish()
  }
}

impl Endpoint {
  /// Create an endpoint over `sock` with a [`SystemClock`]
  pub fn new(cfg: Config, sock: SharedSocket, registry: ResourceRegistry) -> Arc<Endpoint> {
    Self::with_clock(cfg, sock, registry, Arc::new(SystemClock::new()))
  }

  /// Create an endpoint with an explicit clock (tests drive a fake one)
  pub fn with_clock(cfg: Config,
                    sock: SharedSocket,
                    registry: ResourceRegistry,
                    clock: SharedClock)
                    -> Arc<Endpoint> {
    let pool = Arc::new(TransactionPool::new(cfg, clock.clone()));
    let assembler = Arc::new(Assembler::new(clock.clone()));

    let ctx = Context { cfg,
                        sock,
                        pool,
                        assembler,
                        clock };

    Arc::new(Endpoint { ctx,
                        registry: Arc::new(registry),
                        dedup: Arc::new(Mutex::new(HashMap::new())),
                        workers: Mutex::new(Vec::new()),
                        running: Arc::new(AtomicBool::new(true)),
                        handles: Mutex::new(Vec::new()),
                        seq: AtomicU64::new(rand::thread_rng().gen::<u32>() as u64),
                        parked: Mutex::new(()),
                        unpark: Condvar::new() })
  }

  /// The collaborator bundle handlers receive
  pub fn context(&self) -> Context {
    self.ctx.clone()
  }

  /// The endpoint's transaction pool
  pub fn pool(&self) -> &Arc<TransactionPool> {
    &self.ctx.pool
  }

  /// The endpoint's block assembler
  pub fn assembler(&self) -> &Arc<Assembler> {
    &self.ctx.assembler
  }

  /// Launch the background threads
  pub fn start(self: &Arc<Self>) {
    let (tx, rx) = mpsc::channel::<Addrd<Vec<u8>>>();

    let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());

    handles.push(self.named_thread("newt-recv", {
                       let ep = self.clone();
                       move || ep.receive_loop(tx)
                     }));
    handles.push(self.named_thread("newt-dispatch", {
                       let ep = self.clone();
                       move || ep.dispatch_loop(rx)
                     }));
    handles.push(self.named_thread("newt-driver", {
                       let ep = self.clone();
                       move || ep.driver_loop()
                     }));
    handles.push(self.named_thread("newt-reaper", {
                       let ep = self.clone();
                       move || ep.reaper_loop()
                     }));
  }

  fn named_thread(&self, name: &str, f: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    std::thread::Builder::new().name(name.into())
                               .spawn(f)
                               .expect("endpoint thread spawn")
  }

  /// Stop every background thread and worker, then return.
  ///
  /// Wakes all pool waiters first so nothing stays parked.
  pub fn shutdown(&self) {
    self.running.store(false, Ordering::SeqCst);
    self.unpark.notify_all();
    self.ctx.pool.close();

    let handles: Vec<_> = self.handles
                              .lock()
                              .unwrap_or_else(|e| e.into_inner())
                              .drain(..)
                              .collect();
    for handle in handles {
      handle.join().ok();
    }

    let workers: Vec<_> = self.workers
                              .lock()
                              .unwrap_or_else(|e| e.into_inner())
                              .drain(..)
                              .collect();
    for worker in workers {
      worker.stop();
    }
  }

  /// Whether [`Endpoint::shutdown`] has been called
  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  /// Sleep that shutdown can interrupt
  fn park(&self, dur: Duration) {
    let guard = self.parked.lock().unwrap_or_else(|e| e.into_inner());
    if self.is_running() {
      let _ = self.unpark.wait_timeout(guard, dur);
    }
  }

  fn receive_loop(&self, tx: Sender<Addrd<Vec<u8>>>) {
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    while self.is_running() {
      match self.ctx.sock.recv(&mut buf) {
        | Ok(Some(Addrd(n, peer))) => {
          tx.send(Addrd(buf[..n].to_vec(), peer)).ok();
        },
        | Ok(None) => {},
        | Err(e) => {
          log::warn!("receive failed: {}", e);
          self.park(Duration::from_millis(50));
        },
      }
    }
  }

  fn dispatch_loop(&self, rx: Receiver<Addrd<Vec<u8>>>) {
    while self.is_running() {
      match rx.recv_timeout(Duration::from_millis(200)) {
        | Ok(datagram) => self.dispatch(datagram),
        | Err(RecvTimeoutError::Timeout) => {},
        | Err(RecvTimeoutError::Disconnected) => break,
      }
    }
  }

  fn driver_loop(&self) {
    while self.is_running() {
      self.ctx.pool.step_all(&*self.ctx.sock);
      self.park(self.ctx.cfg.driver_period);
    }
  }

  fn reaper_loop(&self) {
    while self.is_running() {
      self.park(self.ctx.cfg.reaper_period);
      self.reap_workers();
    }
  }

  /// Decode, validate and act on one inbound datagram.
  ///
  /// Every ACK this emits goes on the wire *before* any worker sees the
  /// message.
  pub fn dispatch(&self, datagram: Addrd<Vec<u8>>) {
    let peer = datagram.addr();

    let msg = match Message::try_from_bytes(datagram.data()) {
      | Ok(msg) => Addrd(msg, peer),
      | Err(e) => {
        log::debug!("undecodable datagram from {}: {:?}", peer, e);
        self.reply_format_error(Token::default(), Id(0), peer);
        return;
      },
    };

    if !msg.data().well_formed() {
      log::debug!("invalid coap format from {}: {:?}", peer, msg.data());
      self.reply_format_error(msg.data().token, msg.data().id, peer);
      return;
    }

    match msg.data().ty {
      | Type::Con => self.dispatch_con(msg),
      | Type::Non => self.submit_net(msg),
      | Type::Ack => self.ctx.pool.finish(&msg),
      | Type::Reset => {
        let ex = ExchangeId::of(&msg);
        log::warn!("peer {} reset exchange {:?} with {}", peer, ex.token, msg.data().code);
        self.ctx.pool.fail_overall(ex);
      },
    }
  }

  fn dispatch_con(&self, msg: Addrd<Message>) {
    if self.ctx.pool.is_overall_failed(ExchangeId::of(&msg)) {
      return;
    }

    let ack = match (msg.data().code.is_method(), msg.data().code) {
      | (true, _) => template::empty_ack(&msg),
      | (_, Code::CONTENT) => template::continue_ack(&msg),
      | _ => Addrd(msg.data().ack(), msg.addr()),
    };
    if let Err(e) = net::send(&*self.ctx.sock, ack) {
      log::warn!("ack to {} failed: {}", msg.addr(), e);
    }

    // an inbound block also settles the request transaction that caused
    // it, covering the case where the peer's first ack was lost
    if msg.data().code == Code::CONTENT {
      if let Some(parent) = msg.data().parent_id() {
        self.ctx.pool.finish_key(WorkId { peer: msg.addr(),
                                          token: msg.data().token,
                                          id: parent,
                                          block: Some(0) });
      }
    }

    self.submit_net(msg);
  }

  fn submit_net(&self, msg: Addrd<Message>) {
    let key = WorkId::of(&msg);

    {
      let mut dedup = self.dedup.lock().unwrap_or_else(|e| e.into_inner());
      if dedup.contains_key(&key) {
        log::debug!("duplicate {:?} dropped", key);
        return;
      }
      dedup.insert(key, self.ctx.clock.now_millis());
    }

    self.submit_to_worker(Job::Net(msg));
  }

  fn submit_to_worker(&self, job: Job) {
    let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());

    let best = workers.iter()
                      .filter(|w| !w.is_blocking() && w.queue_depth() < self.ctx.cfg.worker_queue_cap)
                      .min_by_key(|w| w.queue_depth());

    match best {
      | Some(worker) => worker.submit(job),
      | None => {
        let worker = Worker::spawn(self.ctx.clone(), self.registry.clone(), self.dedup.clone());
        worker.submit(job);
        workers.push(worker);
      },
    }
  }

  fn reap_workers(&self) {
    let now = self.ctx.clock.now_millis();
    let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());

    let mut i = 0;
    while i < workers.len() {
      if workers.len() <= 1 {
        break;
      }

      let w = &workers[i];
      if w.queue_depth() == 0
         && !w.is_blocking()
         && w.idle_for(now) > self.ctx.cfg.worker_idle_eviction
      {
        workers.remove(i).stop();
      } else {
        i += 1;
      }
    }
  }

  /// Number of live workers
  pub fn worker_count(&self) -> usize {
    self.workers.lock().unwrap_or_else(|e| e.into_inner()).len()
  }

  /// Send an application-originated confirmable request.
  ///
  /// Stamps a fresh token (big-endian minimal width off a random-seeded
  /// sequence), starts the transaction, and — when `internal_work` is set
  /// — hands the message to a dedicated worker's `handle_internal` (used
  /// by uploads, which must read local files and split them).
  ///
  /// Returns the stamped message so the caller can
  /// [`wait_overall`](TransactionPool::wait_overall) on its exchange.
  pub fn submit_internal(&self,
                         mut msg: Message,
                         peer: std::net::SocketAddr,
                         internal_work: bool)
                         -> Result<Addrd<Message>, Error> {
    msg.token = self.next_token();
    let msg = Addrd(msg, peer);

    self.ctx.pool.add(&*self.ctx.sock, msg.clone(), Id(0))?;

    if internal_work {
      self.dedup
          .lock()
          .unwrap_or_else(|e| e.into_inner())
          .insert(WorkId::of(&msg), self.ctx.clock.now_millis());

      let worker = Worker::spawn(self.ctx.clone(), self.registry.clone(), self.dedup.clone());
      worker.submit(Job::Internal(msg.clone()));
      self.workers
          .lock()
          .unwrap_or_else(|e| e.into_inner())
          .push(worker);
    }

    Ok(msg)
  }

  fn next_token(&self) -> Token {
    Token::from_seq(self.seq.fetch_add(1, Ordering::SeqCst))
  }

  fn reply_format_error(&self, token: Token, id: Id, peer: std::net::SocketAddr) {
    let rst = template::reset(Code::INTERNAL_SERVER_ERROR, token, id);
    if let Err(e) = net::send(&*self.ctx.sock, Addrd(rst, peer)) {
      log::warn!("format-error reply to {} failed: {}", peer, e);
    }
  }
}

impl Drop for Endpoint {
  fn drop(&mut self) {
    self.running.store(false, Ordering::SeqCst);
  }
}
