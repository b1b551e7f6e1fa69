use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{OnceCell, RwLock};

use toolbridge_core::{Error, ToolDescriptor, ToolSetId};

/// The resolved tool list of one toolset.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub tools: Arc<[ToolDescriptor]>,
    pub discovered_at: DateTime<Utc>,
}

/// Resolved tool lists keyed by toolset.
///
/// Entries are written once and never expire. Discovery for an identifier
/// is single-flight: concurrent callers wait for the first one's result, and
/// a failed discovery leaves the slot empty for the next caller.
#[derive(Default)]
pub struct ToolCache {
    slots: RwLock<HashMap<ToolSetId, Arc<OnceCell<CacheEntry>>>>,
}

impl ToolCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached entry for `id`, if discovery has completed.
    pub async fn get(&self, id: &ToolSetId) -> Option<CacheEntry> {
        let slots = self.slots.read().await;
        slots.get(id).and_then(|slot| slot.get().cloned())
    }

    /// Return the entry for `id`, running `discover` to fill it on a miss.
    ///
    /// # Errors
    ///
    /// Returns whatever `discover` fails with. Nothing is cached in that case.
    pub async fn get_or_discover<F, Fut>(&self, id: &ToolSetId, discover: F) -> Result<CacheEntry, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ToolDescriptor>, Error>>,
    {
        let slot = self.slot(id).await;
        if let Some(entry) = slot.get() {
            tracing::debug!(toolset = %id, tools = entry.tools.len(), "Tool cache hit");
            return Ok(entry.clone());
        }

        slot.get_or_try_init(|| async {
            let tools = discover().await?;
            Ok::<_, Error>(CacheEntry {
                tools: tools.into(),
                discovered_at: Utc::now(),
            })
        })
        .await
        .cloned()
    }

    /// All completed entries, ordered by toolset.
    pub async fn entries(&self) -> Vec<(ToolSetId, CacheEntry)> {
        let slots = self.slots.read().await;
        let mut entries: Vec<_> = slots
            .iter()
            .filter_map(|(id, slot)| slot.get().map(|entry| (id.clone(), entry.clone())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    async fn slot(&self, id: &ToolSetId) -> Arc<OnceCell<CacheEntry>> {
        if let Some(slot) = self.slots.read().await.get(id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(id.clone()).or_default())
    }
}
