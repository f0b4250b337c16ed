use std::io::{self, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use newt::config::Config;
use newt::endpoint::Endpoint;
use newt::net;
use newt::resource::ResourceRegistry;
use newt_drive::client::DriveClient;
use newt_drive::client_resource::ClientResource;
use newt_drive::paths;
use simple_logger::SimpleLogger;

/// Interactive share-drive client
#[derive(Parser, Debug)]
#[command(name = "newt-drive-client", version)]
struct Args {
  /// Server address
  #[arg(long = "server_address", short = 's', default_value = "127.0.0.1")]
  server_address: String,

  /// Server port
  #[arg(long = "server_port", default_value_t = 5683)]
  server_port: u16,

  /// Address to bind the client socket to
  #[arg(long = "client_address", default_value = "127.0.0.2")]
  client_address: String,

  /// Port to bind the client socket to
  #[arg(long = "client_port", default_value_t = 5683)]
  client_port: u16,
}

fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  SimpleLogger::new().with_level(log::LevelFilter::Warn)
                     .env()
                     .init()?;

  let cfg = Config::default();

  let downloads = paths::client_downloads_root();
  std::fs::create_dir_all(&downloads).with_context(|| {
                                       format!("creating {}", downloads.display())
                                     })?;

  let server: SocketAddr = (args.server_address.as_str(), args.server_port)
    .to_socket_addrs()
    .context("resolving the server address")?
    .next()
    .context("the server address resolved to nothing")?;

  let sock = net::bind((args.client_address.as_str(), args.client_port), cfg.recv_timeout)
    .with_context(|| {
      format!("binding {}:{}", args.client_address, args.client_port)
    })?;

  let resource = Arc::new(ClientResource::new("downloads", &downloads));
  let mut registry = ResourceRegistry::new();
  registry.add(resource.clone());
  registry.set_default(resource);

  let endpoint = Endpoint::new(cfg, Arc::new(sock), registry);
  endpoint.start();

  let client = DriveClient::new(endpoint.clone(), server);

  println!("== coap share drive ==  server {}", server);

  loop {
    if let Err(e) = client.refresh_catalog() {
      println!("catalogue sync failed: {}", e);
    }

    println!();
    println!("  1) Download   2) Upload   3) Rename");
    println!("  4) Move       5) Delete   6) Exit");

    match prompt("select an operation")?.as_str() {
      | "1" => download(&client)?,
      | "2" => upload(&client)?,
      | "3" => rename(&client)?,
      | "4" => relocate(&client)?,
      | "5" => delete(&client)?,
      | "6" | "q" | "exit" => break,
      | other => println!("unknown choice {:?}", other),
    }
  }

  endpoint.shutdown();
  Ok(())
}

fn download(client: &DriveClient) -> anyhow::Result<()> {
  let content = client.content();
  if content.is_empty() {
    println!("> there is nothing to be downloaded");
    return Ok(());
  }
  list("remote content", &content);

  let name = prompt("file to download")?;
  if name.is_empty() {
    return Ok(());
  }

  let to = prompt("save under (empty for the downloads folder)")?;
  let save_dir = (!to.is_empty()).then(|| paths::expand(&to));

  client.download(&name, save_dir)?;
  println!("> download finished");
  Ok(())
}

fn upload(client: &DriveClient) -> anyhow::Result<()> {
  let local = prompt("local file or folder to upload")?;
  if local.is_empty() {
    return Ok(());
  }

  list("remote folders", &client.folders());
  let mut remote = prompt("remote folder (empty for the drive root)")?;
  if remote.is_empty() {
    remote = "/".into();
  }

  client.upload(&local, &remote)?;
  println!("> upload finished");
  Ok(())
}

fn rename(client: &DriveClient) -> anyhow::Result<()> {
  let content = client.content();
  if content.is_empty() {
    println!("> there is nothing to be renamed");
    return Ok(());
  }
  list("remote content", &content);

  let name = prompt("path to rename")?;
  let new_name = prompt("new name")?;
  if name.is_empty() || new_name.is_empty() {
    return Ok(());
  }

  client.rename(&name, &new_name)?;
  println!("> rename requested");
  Ok(())
}

fn relocate(client: &DriveClient) -> anyhow::Result<()> {
  let content = client.content();
  if content.is_empty() {
    println!("> there is nothing to be moved");
    return Ok(());
  }
  list("remote content", &content);

  let name = prompt("path to move")?;
  let to = prompt("new location")?;
  if name.is_empty() {
    return Ok(());
  }

  client.relocate(&name, &to)?;
  println!("> move requested");
  Ok(())
}

fn delete(client: &DriveClient) -> anyhow::Result<()> {
  let content = client.content();
  if content.is_empty() {
    println!("> there is nothing to be deleted");
    return Ok(());
  }
  list("remote content", &content);

  let name = prompt("path to delete")?;
  if name.is_empty() {
    return Ok(());
  }

  client.delete(&name)?;
  println!("> delete requested");
  Ok(())
}

fn list(label: &str, entries: &[String]) {
  println!("{}:", label);
  for entry in entries {
    println!("  {}", entry);
  }
}

fn prompt(label: &str) -> io::Result<String> {
  print!("{}: ", label);
  io::stdout().flush()?;

  let mut line = String::new();
  io::stdin().read_line(&mut line)?;
  Ok(line.trim().to_string())
}
