use std::sync::{mpsc, Arc};

use anyhow::Context as _;
use clap::Parser;
use newt::config::Config;
use newt::endpoint::Endpoint;
use newt::net;
use newt::resource::ResourceRegistry;
use newt_drive::paths;
use newt_drive::resource::DriveResource;
use simple_logger::SimpleLogger;

/// Share-drive server: serves one directory tree over CoAP
#[derive(Parser, Debug)]
#[command(name = "newt-drive-server", version)]
struct Args {
  /// Address to listen on
  #[arg(long = "server_address", default_value = "127.0.0.1")]
  server_address: String,

  /// Port to listen on
  #[arg(long = "server_port", default_value_t = 5683)]
  server_port: u16,
}

fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  SimpleLogger::new().with_level(log::LevelFilter::Info)
                     .env()
                     .init()?;

  let cfg = Config::default();

  let root = paths::server_root("share_drive");
  std::fs::create_dir_all(&root).with_context(|| format!("creating {}", root.display()))?;

  let sock = net::bind((args.server_address.as_str(), args.server_port), cfg.recv_timeout)
    .with_context(|| {
      format!("binding {}:{}", args.server_address, args.server_port)
    })?;
  log::info!("share drive at {} listening on {}",
             root.display(),
             sock.local_addr()?);

  let resource = Arc::new(DriveResource::new("share_drive", &root));
  let mut registry = ResourceRegistry::new();
  registry.add(resource.clone());
  registry.set_default(resource);

  let endpoint = Endpoint::new(cfg, Arc::new(sock), registry);
  endpoint.start();

  let (stop_tx, stop_rx) = mpsc::channel::<()>();
  ctrlc::set_handler(move || {
    stop_tx.send(()).ok();
  }).context("installing the interrupt handler")?;

  stop_rx.recv().ok();
  log::info!("interrupted, draining workers");
  endpoint.shutdown();

  Ok(())
}
