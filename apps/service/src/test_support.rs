//! Shared helpers for unit tests.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::database::DatabaseImpl;
use crate::monitoring::checker::{Checker, ProbeError};
use crate::pool::{LibsqlPool, open_local};

/// Migrated pool over a throwaway file. Keep the `TempDir` alive for the test.
pub async fn create_test_pool() -> Result<(LibsqlPool, TempDir)> {
    let temp_dir = tempdir()?;
    let pool = open_local(temp_dir.path().join("test.db")).await?;

    let conn = pool.get().await?;
    crate::database::initialize_database(&conn).await?;

    Ok((pool, temp_dir))
}

pub async fn create_test_database() -> Result<(Arc<DatabaseImpl>, TempDir)> {
    let (pool, temp_dir) = create_test_pool().await?;
    Ok((Arc::new(DatabaseImpl::new_from_pool(pool)), temp_dir))
}

/// Serve `status` with an empty body to every connection; returns the base URL.
pub async fn serve_status(status: u16) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status} Test\r\nlocation: /elsewhere\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}/")
}

/// A local URL nothing is listening on.
pub async fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

/// What a [`StubChecker`] does for one URL
#[derive(Clone)]
pub enum Scripted {
    Status(u16),
    Fail(ProbeError),
    Hang,
    Panic,
    /// Respond with 200 after a delay
    Slow(Duration),
}

/// Checker with scripted per-URL behaviour. Unknown URLs are refused.
#[derive(Default)]
pub struct StubChecker {
    script: HashMap<String, Scripted>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
}

impl StubChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, behaviour: Scripted) -> Self {
        self.script.insert(url.to_string(), behaviour);
        self
    }
}

#[async_trait::async_trait]
impl Checker for StubChecker {
    async fn check(&self, url: &str) -> Result<u16, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let behaviour = self
            .script
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Scripted::Fail(ProbeError::Connect("connection refused".to_string()))
            });

        let result = match behaviour {
            Scripted::Status(code) => Ok(code),
            Scripted::Fail(error) => Err(error),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(200)
            }
            Scripted::Panic => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("stub checker panicked for {url}");
            }
            Scripted::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(200)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
