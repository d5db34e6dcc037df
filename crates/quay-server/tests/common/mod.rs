//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Response, redirect};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use quay_server::{Server, ServerConfig};
use quay_session::SessionConfig;

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client that does not follow redirects or keep cookies.
    pub client: Client,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with default session settings.
    pub async fn start() -> Result<Self> {
        Self::start_with(SessionConfig::default()).await
    }

    /// Start a new test server with the given session settings.
    pub async fn start_with(session: SessionConfig) -> Result<Self> {
        let addr = find_available_port().await?;

        let config = ServerConfig::new(session)
            .with_bind_address(addr)
            .with_request_logging(false);

        let server = Server::new(config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()?;
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// GET request builder, optionally carrying a `Cookie` header.
    pub fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::RequestBuilder {
        with_cookie(self.client.get(format!("{}{}", self.base_url(), path)), cookie)
    }

    /// POST request builder, optionally carrying a `Cookie` header.
    pub fn post(&self, path: &str, cookie: Option<&str>) -> reqwest::RequestBuilder {
        with_cookie(self.client.post(format!("{}{}", self.base_url(), path)), cookie)
    }
}

fn with_cookie(builder: reqwest::RequestBuilder, cookie: Option<&str>) -> reqwest::RequestBuilder {
    match cookie {
        Some(cookie) => builder.header(reqwest::header::COOKIE, cookie),
        None => builder,
    }
}

/// The raw `Set-Cookie` headers of a response.
pub fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .collect()
}

/// The `name=value` pair of the single `Set-Cookie` header, if any.
pub fn session_cookie(response: &Response) -> Option<String> {
    let cookies = set_cookies(response);
    assert!(cookies.len() <= 1, "expected at most one Set-Cookie, got {cookies:?}");
    cookies
        .first()
        .and_then(|c| c.split(';').next())
        .map(|pair| pair.to_string())
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let result = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match result {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
