use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::info;

use super::listener::HeartRateRegistry;
use super::routes::create_router;
use super::state::ListenerState;
use crate::error::{CollectorError, Result};

/// Local HTTP endpoint receiving sensor events
pub struct CollectorServer {
    listener: TcpListener,
    router: Router,
}

impl CollectorServer {
    /// Bind the listener. Events are forwarded to whatever `registry` holds.
    pub async fn bind(addr: impl ToSocketAddrs, registry: HeartRateRegistry) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CollectorError::io("bind collector server", e))?;

        Ok(Self {
            listener,
            router: create_router(ListenerState::new(registry)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| CollectorError::io("read collector server address", e))
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!("Collector server started on {}", addr);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| CollectorError::io("serve collector requests", e))?;

        info!("Collector server stopped");
        Ok(())
    }
}
