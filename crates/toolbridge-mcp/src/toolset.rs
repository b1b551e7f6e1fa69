use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use toolbridge_core::{
    normalize_schema, CompatibilityPolicy, Error, SelectionContext, ToolDescriptor, ToolFilter,
    ToolSession, ToolSetId, ToolSource,
};

use crate::cache::ToolCache;
use crate::retry::RetryPolicy;

/// Serves the tool list of one toolset to the agent runtime.
///
/// Holds the upstream session and fills the shared [`ToolCache`] on the
/// first successful discovery. After that the cached list is returned as is,
/// whatever the caller's context.
pub struct ToolSetSession {
    id: ToolSetId,
    source: Arc<dyn ToolSource>,
    cache: Arc<ToolCache>,
    filter: ToolFilter,
    policy: CompatibilityPolicy,
    retry: RetryPolicy,
    session: Mutex<Option<Arc<dyn ToolSession>>>,
}

impl ToolSetSession {
    pub fn new(id: impl Into<ToolSetId>, source: Arc<dyn ToolSource>, cache: Arc<ToolCache>) -> Self {
        Self {
            id: id.into(),
            source,
            cache,
            filter: ToolFilter::All,
            policy: CompatibilityPolicy::default(),
            retry: RetryPolicy::default(),
            session: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ToolFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CompatibilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn id(&self) -> &ToolSetId {
        &self.id
    }

    pub fn filter(&self) -> &ToolFilter {
        &self.filter
    }

    /// Tools visible through this toolset.
    ///
    /// # Errors
    ///
    /// Surfaces session acquisition failures (after one retry on a closed
    /// session) and discovery failures. Failed discoveries are not cached.
    pub async fn get_tools(
        &self,
        context: Option<&SelectionContext>,
    ) -> Result<Arc<[ToolDescriptor]>, Error> {
        let session = self
            .retry
            .run("create session", || self.acquire_session())
            .await?;

        let entry = self
            .cache
            .get_or_discover(&self.id, || self.discover(session, context))
            .await?;
        Ok(entry.tools)
    }

    /// Drop the held upstream session. The next call opens a new one.
    pub async fn close(&self) {
        self.session.lock().await.take();
    }

    async fn acquire_session(&self) -> Result<Arc<dyn ToolSession>, Error> {
        let mut current = self.session.lock().await;
        if let Some(session) = current.as_ref().filter(|s| !s.is_closed()) {
            return Ok(Arc::clone(session));
        }

        let session = self.source.create_session().await?;
        *current = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn discover(
        &self,
        session: Arc<dyn ToolSession>,
        context: Option<&SelectionContext>,
    ) -> Result<Vec<ToolDescriptor>, Error> {
        let upstream = match session.list_tools().await {
            Ok(tools) => tools,
            Err(err) => {
                if err.is_session_closed() {
                    self.close().await;
                }
                return Err(err);
            }
        };
        let discovered = upstream.len();

        let mut tools = Vec::with_capacity(discovered);
        for tool in upstream {
            let tool = ToolDescriptor::try_from(tool)?;
            if self.filter.accepts(&tool, context) {
                tools.push(tool);
            }
        }

        let normalized = self.policy.normalization_required();
        if normalized {
            for tool in &mut tools {
                normalize_schema(&mut tool.input_schema);
            }
        }

        info!(
            toolset = %self.id,
            discovered,
            exposed = tools.len(),
            normalized,
            "Discovered tools"
        );
        Ok(tools)
    }
}

impl std::fmt::Debug for ToolSetSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSetSession")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("policy", &self.policy)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use toolbridge_core::UpstreamTool;

    use super::*;

    /// In-memory upstream with scripted failures.
    #[derive(Default)]
    struct MockSource {
        tools: Vec<UpstreamTool>,
        create_failures: std::sync::Mutex<VecDeque<Error>>,
        list_failures: Arc<std::sync::Mutex<VecDeque<Error>>>,
        list_delay: Option<Duration>,
        creates: AtomicUsize,
        lists: Arc<AtomicUsize>,
    }

    impl MockSource {
        fn with_tools(tools: Vec<UpstreamTool>) -> Self {
            Self {
                tools,
                ..Self::default()
            }
        }

        fn fail_create(self, err: Error) -> Self {
            self.create_failures.lock().unwrap().push_back(err);
            self
        }

        fn fail_list(self, err: Error) -> Self {
            self.list_failures.lock().unwrap().push_back(err);
            self
        }

        fn creates(&self) -> usize {
            self.creates.load(Ordering::SeqCst)
        }

        fn lists(&self) -> usize {
            self.lists.load(Ordering::SeqCst)
        }
    }

    struct MockSession {
        tools: Vec<UpstreamTool>,
        failures: Arc<std::sync::Mutex<VecDeque<Error>>>,
        delay: Option<Duration>,
        lists: Arc<AtomicUsize>,
        closed: AtomicBool,
    }

    #[async_trait]
    impl ToolSource for MockSource {
        async fn create_session(&self) -> Result<Arc<dyn ToolSession>, Error> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(Arc::new(MockSession {
                tools: self.tools.clone(),
                failures: Arc::clone(&self.list_failures),
                delay: self.list_delay,
                lists: Arc::clone(&self.lists),
                closed: AtomicBool::new(false),
            }))
        }
    }

    #[async_trait]
    impl ToolSession for MockSession {
        async fn list_tools(&self) -> Result<Vec<UpstreamTool>, Error> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                if err.is_session_closed() {
                    self.closed.store(true, Ordering::SeqCst);
                }
                return Err(err);
            }
            Ok(self.tools.clone())
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    fn upstream_tools() -> Vec<UpstreamTool> {
        vec![
            UpstreamTool {
                name: "list_users".to_string(),
                description: Some("List users".to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "emails": {
                            "anyOf": [
                                {"type": "array", "items": {"type": "string"}},
                                {"type": "null"}
                            ]
                        }
                    }
                }),
            },
            UpstreamTool {
                name: "delete_user".to_string(),
                description: None,
                input_schema: json!({
                    "type": "object",
                    "properties": {"id": {"type": "string"}},
                    "required": ["id"]
                }),
            },
        ]
    }

    fn toolset(source: &Arc<MockSource>, cache: &Arc<ToolCache>) -> ToolSetSession {
        ToolSetSession::new("crm", Arc::clone(source) as Arc<dyn ToolSource>, Arc::clone(cache))
    }

    fn names(tools: &[ToolDescriptor]) -> Vec<&str> {
        tools.iter().map(|t| t.name.as_str()).collect()
    }

    fn read_only_filter() -> ToolFilter {
        ToolFilter::predicate(|tool: &ToolDescriptor, ctx: Option<&SelectionContext>| {
            let read_only = ctx
                .and_then(|c| c.state.get("read_only"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            !read_only || tool.name.starts_with("list_")
        })
    }

    fn context(read_only: bool) -> SelectionContext {
        let mut ctx = SelectionContext::default();
        ctx.state.insert("read_only".into(), json!(read_only));
        ctx
    }

    #[tokio::test]
    async fn cache_wins_over_later_contexts() {
        let source = Arc::new(MockSource::with_tools(upstream_tools()));
        let cache = Arc::new(ToolCache::new());
        let toolset = toolset(&source, &cache).with_filter(read_only_filter());

        let first = toolset.get_tools(Some(&context(true))).await.unwrap();
        let second = toolset.get_tools(Some(&context(false))).await.unwrap();

        assert_eq!(names(&first), ["list_users"]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.lists(), 1);
        assert_eq!(source.creates(), 1);
    }

    #[tokio::test]
    async fn normalizes_when_policy_requires() {
        let source = Arc::new(MockSource::with_tools(upstream_tools()));
        let cache = Arc::new(ToolCache::new());
        let toolset = toolset(&source, &cache)
            .with_policy(CompatibilityPolicy::new("gemini-2.0-flash", false));

        let tools = toolset.get_tools(None).await.unwrap();
        let schema = serde_json::Value::from(tools[0].input_schema.clone());
        assert_eq!(schema["properties"]["emails"], json!({"type": "string"}));
    }

    #[tokio::test]
    async fn keeps_unions_for_capable_models() {
        let source = Arc::new(MockSource::with_tools(upstream_tools()));
        let cache = Arc::new(ToolCache::new());
        let toolset = toolset(&source, &cache)
            .with_policy(CompatibilityPolicy::new("gemini-2.6-flash", false));

        let tools = toolset.get_tools(None).await.unwrap();
        assert!(tools[0].input_schema.has_union_property());
    }

    #[tokio::test]
    async fn name_filter_limits_tools() {
        let source = Arc::new(MockSource::with_tools(upstream_tools()));
        let cache = Arc::new(ToolCache::new());
        let toolset = toolset(&source, &cache).with_filter(ToolFilter::names(["delete_user"]));

        let tools = toolset.get_tools(None).await.unwrap();
        assert_eq!(names(&tools), ["delete_user"]);
        assert_eq!(tools[0].description, "");
    }

    #[tokio::test]
    async fn retries_once_on_closed_session() {
        let source = Arc::new(
            MockSource::with_tools(upstream_tools())
                .fail_create(Error::SessionClosed("closed during connect".into())),
        );
        let cache = Arc::new(ToolCache::new());

        let tools = toolset(&source, &cache).get_tools(None).await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(source.creates(), 2);
    }

    #[tokio::test]
    async fn second_closed_session_is_surfaced() {
        let source = Arc::new(
            MockSource::with_tools(upstream_tools())
                .fail_create(Error::SessionClosed("first".into()))
                .fail_create(Error::SessionClosed("second".into())),
        );
        let cache = Arc::new(ToolCache::new());

        let err = toolset(&source, &cache).get_tools(None).await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed(ref msg) if msg == "second"));
        assert_eq!(source.creates(), 2);
        assert!(cache.get(&ToolSetId::from("crm")).await.is_none());
    }

    #[tokio::test]
    async fn transport_failures_are_not_retried() {
        let source = Arc::new(
            MockSource::with_tools(upstream_tools())
                .fail_create(Error::Transport("connection refused".into())),
        );
        let cache = Arc::new(ToolCache::new());

        let err = toolset(&source, &cache).get_tools(None).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(source.creates(), 1);
    }

    #[tokio::test]
    async fn failed_discovery_is_retried_on_next_call() {
        let source = Arc::new(
            MockSource::with_tools(upstream_tools()).fail_list(Error::Upstream("busy".into())),
        );
        let cache = Arc::new(ToolCache::new());
        let toolset = toolset(&source, &cache);

        assert!(matches!(toolset.get_tools(None).await, Err(Error::Upstream(_))));
        assert!(cache.get(toolset.id()).await.is_none());

        let tools = toolset.get_tools(None).await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(source.lists(), 2);
        assert_eq!(source.creates(), 1);
    }

    #[tokio::test]
    async fn closed_session_during_discovery_reconnects_next_time() {
        let source = Arc::new(
            MockSource::with_tools(upstream_tools())
                .fail_list(Error::SessionClosed("expired".into())),
        );
        let cache = Arc::new(ToolCache::new());
        let toolset = toolset(&source, &cache);

        assert!(toolset.get_tools(None).await.unwrap_err().is_session_closed());
        toolset.get_tools(None).await.unwrap();
        assert_eq!(source.creates(), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_discovery() {
        let source = Arc::new(MockSource {
            list_delay: Some(Duration::from_millis(25)),
            ..MockSource::with_tools(upstream_tools())
        });
        let cache = Arc::new(ToolCache::new());
        let toolset = toolset(&source, &cache);

        let (a, b) = tokio::join!(toolset.get_tools(None), toolset.get_tools(None));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(source.lists(), 1);
        assert_eq!(source.creates(), 1);
    }

    #[tokio::test]
    async fn toolsets_sharing_a_cache_are_independent() {
        let source = Arc::new(MockSource::with_tools(upstream_tools()));
        let cache = Arc::new(ToolCache::new());
        let all = toolset(&source, &cache);
        let admin = ToolSetSession::new("admin", Arc::clone(&source) as Arc<dyn ToolSource>, Arc::clone(&cache))
            .with_filter(ToolFilter::names(["delete_user"]));

        assert_eq!(all.get_tools(None).await.unwrap().len(), 2);
        assert_eq!(admin.get_tools(None).await.unwrap().len(), 1);
        assert_eq!(cache.entries().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_upstream_schema_is_surfaced() {
        let source = Arc::new(MockSource::with_tools(vec![UpstreamTool {
            name: "broken".to_string(),
            description: None,
            input_schema: json!("not a schema"),
        }]));
        let cache = Arc::new(ToolCache::new());

        let err = toolset(&source, &cache).get_tools(None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }
}
