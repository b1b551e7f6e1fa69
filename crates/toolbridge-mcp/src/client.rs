//! MCP client over the streamable HTTP transport.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::{
    model::{PaginatedRequestParam, Tool},
    service::{RunningService, ServiceError},
    transport::{
        streamable_http_client::StreamableHttpClientTransportConfig, StreamableHttpClientTransport,
    },
    RoleClient, ServiceExt,
};
use tracing::{debug, info};

use toolbridge_core::{Error, ToolSession, ToolSource, UpstreamTool};

type McpClient = RunningService<RoleClient, ()>;

/// Upper bound on `tools/list` pages followed in one listing.
pub const MAX_TOOL_PAGES: usize = 64;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens MCP sessions against a single HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpToolSource {
    http: reqwest::Client,
    url: String,
}

impl HttpToolSource {
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::Transport(format!("build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ToolSource for HttpToolSource {
    async fn create_session(&self) -> Result<Arc<dyn ToolSession>, Error> {
        let config = StreamableHttpClientTransportConfig::with_uri(self.url.as_str());
        let transport = StreamableHttpClientTransport::with_client(self.http.clone(), config);

        let client = ()
            .serve(transport)
            .await
            .map_err(|e| Error::Transport(format!("initialize {}: {e}", self.url)))?;

        info!(
            url = %self.url,
            server = client.peer_info().map_or("unknown", |info| info.server_info.name.as_str()),
            "MCP session initialized"
        );

        Ok(Arc::new(HttpSession {
            url: self.url.clone(),
            client,
            closed: AtomicBool::new(false),
        }))
    }
}

/// One initialized MCP session.
pub struct HttpSession {
    url: String,
    client: McpClient,
    closed: AtomicBool,
}

impl HttpSession {
    async fn list_page(&self, cursor: Option<String>) -> Result<(Vec<Tool>, Option<String>), Error> {
        let request = self
            .client
            .peer()
            .list_tools(Some(PaginatedRequestParam { cursor }));

        match tokio::time::timeout(REQUEST_TIMEOUT, request).await {
            Ok(Ok(page)) => Ok((page.tools, page.next_cursor)),
            Ok(Err(err)) => Err(self.classify(err)),
            Err(_) => Err(Error::Transport(format!(
                "{} tools/list timed out after {}s",
                self.url,
                REQUEST_TIMEOUT.as_secs()
            ))),
        }
    }

    /// A transport that can no longer carry requests means the session is
    /// gone; the server's own error replies are not.
    fn classify(&self, err: ServiceError) -> Error {
        if matches!(err, ServiceError::TransportClosed | ServiceError::TransportSend(_)) {
            self.closed.store(true, Ordering::Relaxed);
            return Error::SessionClosed(format!("{}: {err}", self.url));
        }
        match err {
            ServiceError::McpError(e) => {
                Error::Upstream(format!("tools/list: {} (code {})", e.message, e.code.0))
            }
            other => Error::Transport(format!("{}: {other}", self.url)),
        }
    }
}

#[async_trait]
impl ToolSession for HttpSession {
    async fn list_tools(&self) -> Result<Vec<UpstreamTool>, Error> {
        let mut tools = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = None;

        for page in 1..=MAX_TOOL_PAGES {
            let (batch, next) = self.list_page(cursor.take()).await?;
            debug!(url = %self.url, page, tools = batch.len(), "Fetched tools/list page");
            for tool in batch {
                tools.push(upstream_tool(tool)?);
            }

            match next {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.clone()) {
                        return Err(Error::Upstream(format!(
                            "tools/list cursor cycle at '{next}'"
                        )));
                    }
                    cursor = Some(next);
                }
                _ => return Ok(tools),
            }
        }

        Err(Error::Upstream(format!(
            "tools/list did not finish within {MAX_TOOL_PAGES} pages"
        )))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

fn upstream_tool(tool: Tool) -> Result<UpstreamTool, Error> {
    serde_json::to_value(&tool)
        .and_then(serde_json::from_value)
        .map_err(|e| Error::Upstream(format!("malformed tool '{}': {e}", tool.name)))
}
