use serde::{Deserialize, Serialize};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// First model version whose backend accepts union-typed parameters.
const UNION_SUPPORT_VERSION: f64 = 2.5;

/// Decides whether tool schemas must be normalized before they reach the
/// model backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityPolicy {
    pub model: String,
    /// Requests go through the managed cloud backend (Vertex AI).
    pub use_vertex_ai: bool,
}

impl Default for CompatibilityPolicy {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            use_vertex_ai: false,
        }
    }
}

impl CompatibilityPolicy {
    #[must_use]
    pub fn new(model: impl Into<String>, use_vertex_ai: bool) -> Self {
        Self {
            model: model.into(),
            use_vertex_ai,
        }
    }

    /// Whether union-typed parameters have to be collapsed.
    ///
    /// An identifier whose version cannot be read counts as an old model.
    #[must_use]
    pub fn normalization_required(&self) -> bool {
        let required = self.use_vertex_ai
            || model_version(&self.model).is_none_or(|v| v < UNION_SUPPORT_VERSION);

        tracing::debug!(
            model = %self.model,
            use_vertex_ai = self.use_vertex_ai,
            required,
            "Evaluated schema compatibility"
        );
        required
    }
}

/// Version number from an identifier shaped like `family-<version>-variant`.
fn model_version(model: &str) -> Option<f64> {
    model
        .split('-')
        .nth(1)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
