use std::sync::Arc;

use key_pool::KeyPool;
use pingora::prelude::*;
use pingora::server::RunArgs;
use pingora::server::Server as PingoraServer;
use pingora::server::configuration::Opt;
use pingora::services::background::GenBackgroundService;
use pingora::services::listening::Service;

use crate::api::KeyApi;
use crate::configuration::ServerConfig;
use crate::metric::Metrics;
use crate::sweeper::KeySweeper;

pub struct Server {
    server: PingoraServer,
}

impl Server {
    pub fn new(opt: Option<Opt>) -> Result<Self> {
        let server = PingoraServer::new(opt)?;
        Ok(Server { server })
    }

    /// Wire the pool into the server: pre-generate the configured keys, start
    /// the sweeper and expose the HTTP API on `server_conf.listen`.
    pub fn bootstrap(
        &mut self,
        server_conf: &ServerConfig,
        pool: Arc<KeyPool>,
        metrics: Arc<Metrics>,
    ) -> Result<()> {
        self.server.bootstrap();

        server_conf.validate().map_err(|e| {
            Error::explain(
                ErrorType::InternalError,
                format!("invalid server config: {e}"),
            )
        })?;

        let free = pool
            .generate(server_conf.pool.size, server_conf.pool.key_length)
            .map_err(|e| {
                Error::explain(
                    ErrorType::InternalError,
                    format!("failed to generate initial keys: {e}"),
                )
            })?;
        log::info!(
            "Key pool ready with {} free keys (dead ttl {}s, blocked ttl {}s)",
            free.len(),
            server_conf.ttl.dead_secs,
            server_conf.ttl.blocked_secs
        );

        // Background service for expiry sweeps
        let sweeper = KeySweeper::new(pool.clone(), server_conf.sweep_interval());
        let background = GenBackgroundService::new("key sweeper".to_string(), Arc::new(sweeper));
        self.server.add_service(background);

        let mut api_service = Service::new(
            "key api".to_string(),
            KeyApi::new(pool, server_conf.pool.clone(), metrics),
        );
        api_service.add_tcp(&server_conf.listen);
        self.server.add_service(api_service);

        log::info!("Key API listening on {}", server_conf.listen);
        Ok(())
    }

    pub fn run_forever(self) {
        self.server.run_forever();
    }

    pub fn run(self, args: RunArgs) {
        self.server.run(args);
    }
}
