use std::collections::BTreeMap;
use std::sync::Arc;

use toolbridge_core::{Error, ToolSetId, TrimBudget};
use toolbridge_mcp::{ToolCache, ToolSetSession};

/// A configured toolset and where its tools come from.
pub struct Toolset {
    pub upstream: String,
    pub session: ToolSetSession,
}

/// Shared application state with injected dependencies.
#[derive(Clone)]
pub struct AppState {
    pub toolsets: Arc<BTreeMap<ToolSetId, Toolset>>,
    pub cache: Arc<ToolCache>,
    pub trim_budget: TrimBudget,
}

impl AppState {
    /// Index toolsets by id. Fails if two share an id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] on a duplicate toolset id.
    pub fn new(
        toolsets: Vec<Toolset>,
        cache: Arc<ToolCache>,
        trim_budget: TrimBudget,
    ) -> Result<Self, Error> {
        let mut by_id = BTreeMap::new();
        for toolset in toolsets {
            let id = toolset.session.id().clone();
            if by_id.insert(id.clone(), toolset).is_some() {
                return Err(Error::InvalidInput(format!("duplicate toolset '{id}'")));
            }
        }

        Ok(Self {
            toolsets: Arc::new(by_id),
            cache,
            trim_budget,
        })
    }

    /// Look up a toolset by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolsetNotFound`] if no toolset has that id.
    pub fn toolset(&self, id: &ToolSetId) -> Result<&Toolset, Error> {
        self.toolsets
            .get(id)
            .ok_or_else(|| Error::ToolsetNotFound(id.clone()))
    }
}
