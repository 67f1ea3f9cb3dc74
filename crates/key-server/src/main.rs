use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use key_pool::KeyPool;
use key_server::configuration::ServerConfig;
use key_server::metric::Metrics;
use key_server::server::Server;

#[derive(Parser, Debug)]
#[command(name = "key-server", about = "Serve a pool of leasable keys over HTTP")]
struct Args {
    /// YAML config file; built-in defaults are used when omitted.
    #[arg(short, long, env = "KEY_SERVER_CONFIG")]
    config: Option<PathBuf>,
}

fn main() {
    // Enable basic logging; set RUST_LOG=info for visibility.
    env_logger::init();

    let args = Args::parse();

    let server_conf = match &args.config {
        Some(path) => ServerConfig::load(path).expect("Failed to load server config"),
        None => ServerConfig::default(),
    };

    let mut server = Server::new(None).expect("Failed to create server");
    let pool = Arc::new(KeyPool::new(server_conf.pool_config()));

    server
        .bootstrap(&server_conf, pool, Arc::new(Metrics::default()))
        .expect("Failed to bootstrap server");

    server.run_forever();
}
