//! `GitServer`: process-wide state, listener lifecycle, and observer
//! registration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpServer};

use crate::auth::Authenticator;
use crate::config::ServerOptions;
use crate::error::ServerError;
use crate::events::{EventBus, GitInfo, TagInfo};
use crate::router;

/// Shared, immutable-after-`listen` state handed to every request: the options
/// record and the HTTP listener never change once the server is running.
pub struct GitServerState {
    pub root: PathBuf,
    pub options: ServerOptions,
    pub authenticator: Option<Authenticator>,
    pub events: Arc<EventBus>,
}

/// The public entry point: construct idle, register listeners, then
/// `listen(port)`.
pub struct GitServer {
    root: PathBuf,
    options: ServerOptions,
    authenticator: Option<Authenticator>,
    events: EventBus,
    handle: Option<ServerHandle>,
    local_addr: Option<SocketAddr>,
}

impl GitServer {
    pub fn new(root: impl Into<PathBuf>, options: ServerOptions) -> Self {
        GitServer {
            root: root.into(),
            options,
            authenticator: None,
            events: EventBus::new(),
            handle: None,
            local_addr: None,
        }
    }

    pub fn set_authenticator(&mut self, authenticator: Authenticator) {
        self.authenticator = Some(authenticator);
    }

    pub fn on_info(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.events.on_info(listener);
    }

    pub fn on_fetch(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.events.on_fetch(listener);
    }

    pub fn on_push(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.events.on_push(listener);
    }

    pub fn on_head(&mut self, listener: impl Fn(GitInfo) + Send + Sync + 'static) {
        self.events.on_head(listener);
    }

    pub fn on_tag(&mut self, listener: impl Fn(TagInfo) + Send + Sync + 'static) {
        self.events.on_tag(listener);
    }

    pub fn on_error(&mut self, listener: impl Fn(String) + Send + Sync + 'static) {
        self.events.on_error(listener);
    }

    /// Bind and start accepting connections. `port = 0` requests an
    /// OS-assigned port. Resolves once the listener is actually bound.
    pub async fn listen(&mut self, bind: &str, port: u16) -> Result<SocketAddr, ServerError> {
        let state = web::Data::new(GitServerState {
            root: self.root.clone(),
            options: self.options.clone(),
            authenticator: self.authenticator.clone(),
            events: Arc::new(self.events.clone()),
        });

        let http_server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .default_service(web::route().to(router::dispatch))
        })
        .bind((bind, port))
        .map_err(|e| ServerError::Internal(format!("failed to bind {bind}:{port}: {e}")))?;

        let local_addr = *http_server
            .addrs()
            .first()
            .ok_or_else(|| ServerError::Internal("server bound no addresses".into()))?;
        log::info!("git server listening on {local_addr}");

        let server = http_server.run();
        self.handle = Some(server.handle());
        self.local_addr = Some(local_addr);
        tokio::spawn(server);

        Ok(local_addr)
    }

    pub fn address(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop accepting new connections and drain in-flight requests. Calling
    /// this on a never-listened server emits `error`, since it is almost
    /// certainly a caller mistake rather than a normal shutdown.
    pub async fn close(&mut self) {
        match self.handle.take() {
            Some(handle) => {
                log::info!("git server closing");
                handle.stop(true).await;
                self.local_addr = None;
            }
            None => {
                self.events
                    .emit_error("close() called on a server that was never listening");
            }
        }
    }
}
