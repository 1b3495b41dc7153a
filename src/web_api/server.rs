//! Restartable HTTP server handle
//!
//! The quiescence controller stops and restarts the whole listener around
//! the capture window, so the server is a handle that can be started and
//! stopped repeatedly, not a run-once future. Both directions are
//! idempotent. The router is installed once at boot, after the application
//! state (which itself holds this handle) has been assembled.

use crate::error::{Error, Result};
use crate::seqcap::quiesce::ServerControl;
use async_trait::async_trait;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::task::JoinHandle;

pub struct HttpServer {
    addr: SocketAddr,
    router: Mutex<Option<Router>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl HttpServer {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            router: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Install the router serving every start. Called once at boot.
    pub fn install(&self, router: Router) {
        *self.router.lock().unwrap() = Some(router);
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }
}

#[async_trait]
impl ServerControl for HttpServer {
    async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Ok(());
        }

        let router = self
            .router
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Internal("http server started before install".to_string()))?;

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, "http server listening");

        *task = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "http server exited");
            }
        }));
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::info!("http server stopped");
        }
        Ok(())
    }
}
