pub mod error;
pub mod filter;
pub mod history;
pub mod policy;
pub mod schema;
pub mod traits;
pub mod types;

pub use error::Error;
pub use filter::ToolFilter;
pub use history::{trim_history, TrimBudget, CONTEXT_SENTINEL};
pub use policy::CompatibilityPolicy;
pub use schema::{normalize_schema, SchemaNode};
pub use traits::{ToolPredicate, ToolSession, ToolSource};
pub use types::{
    Part, Role, SelectionContext, ToolDescriptor, ToolSetId, Turn, UpstreamTool,
};
