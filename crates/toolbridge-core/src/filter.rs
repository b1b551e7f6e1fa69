use std::collections::BTreeSet;
use std::sync::Arc;

use crate::traits::ToolPredicate;
use crate::types::{SelectionContext, ToolDescriptor};

/// Which discovered tools a toolset exposes.
#[derive(Clone, Default)]
pub enum ToolFilter {
    /// Every upstream tool is visible.
    #[default]
    All,
    /// Only tools with one of these names.
    Names(BTreeSet<String>),
    /// Decided per tool against the caller's context.
    Predicate(Arc<dyn ToolPredicate>),
}

impl ToolFilter {
    #[must_use]
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn predicate(predicate: impl ToolPredicate + 'static) -> Self {
        Self::Predicate(Arc::new(predicate))
    }

    #[must_use]
    pub fn accepts(&self, tool: &ToolDescriptor, context: Option<&SelectionContext>) -> bool {
        match self {
            Self::All => true,
            Self::Names(names) => names.contains(&tool.name),
            Self::Predicate(predicate) => predicate.accepts(tool, context),
        }
    }
}

impl std::fmt::Debug for ToolFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Names(names) => f.debug_tuple("Names").field(names).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
