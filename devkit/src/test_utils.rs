/*!
Test Harness pour l'API du kernel

Démarre le vrai router sur 127.0.0.1:0 (avec l'adresse du pair, requise
par le PUT implicite) et expose des helpers HTTP renvoyant
`(StatusCode, serde_json::Value)`.
*/

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use warden_kernel::http::{self, AppState};
use warden_kernel::store::{EntityKind, MemoryStoreHandler, StoreHandlerManager};

/// Harness de test : un kernel HTTP complet par test
pub struct TestHarness {
    pub store: Arc<StoreHandlerManager>,
    pub addr: SocketAddr,
    client: Client,
    server: JoinHandle<()>,
}

impl TestHarness {
    /// Kernel sur un unique store mémoire, sans container manager
    pub async fn new() -> Result<Self> {
        let store = StoreHandlerManager::builder()
            .handler(MemoryStoreHandler::new("memory"), &EntityKind::ALL)
            .build();
        Self::start(Arc::new(store)).await
    }

    pub async fn start(store: Arc<StoreHandlerManager>) -> Result<Self> {
        init_logging();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = http::build_router(AppState::new(store.clone()));

        let server = tokio::spawn(async move {
            if let Err(e) = http::serve(listener, app).await {
                tracing::error!(error = %e, "[devkit] test server stopped");
            }
        });
        tracing::debug!(%addr, "[devkit] test server started");

        Ok(Self {
            store,
            addr,
            client: Client::new(),
            server,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        Self::read(self.client.get(self.url(path)).send().await?).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        Self::read(self.client.put(self.url(path)).json(body).send().await?).await
    }

    /// PUT avec un corps brut (vide, JSON cassé...)
    pub async fn put_raw(&self, path: &str, body: &str) -> Result<(StatusCode, Value)> {
        let response = self
            .client
            .put(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(StatusCode, Value)> {
        Self::read(self.client.delete(self.url(path)).send().await?).await
    }

    async fn read(response: reqwest::Response) -> Result<(StatusCode, Value)> {
        let status = response.status();
        let text = response.text().await.context("failed to read response body")?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok((status, body))
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Logging des tests, idempotent ; `RUST_LOG` pour plus de détail
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warden_kernel=debug")),
        )
        .with_test_writer()
        .try_init();
}
