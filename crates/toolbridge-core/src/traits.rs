use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::types::{SelectionContext, ToolDescriptor, UpstreamTool};

/// Where tools come from: anything that can open a session to an MCP server.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// Open a new session. Fails with [`Error::SessionClosed`] when the
    /// underlying resource was closed while the session was being set up.
    async fn create_session(&self) -> Result<Arc<dyn ToolSession>, Error>;
}

/// An open session with an upstream tool server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// List every tool the upstream exposes.
    async fn list_tools(&self) -> Result<Vec<UpstreamTool>, Error>;

    /// Whether the session is known to be unusable.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Context-aware tool visibility check.
pub trait ToolPredicate: Send + Sync {
    fn accepts(&self, tool: &ToolDescriptor, context: Option<&SelectionContext>) -> bool;
}

impl<F> ToolPredicate for F
where
    F: Fn(&ToolDescriptor, Option<&SelectionContext>) -> bool + Send + Sync,
{
    fn accepts(&self, tool: &ToolDescriptor, context: Option<&SelectionContext>) -> bool {
        self(tool, context)
    }
}
