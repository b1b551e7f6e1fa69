use std::collections::BTreeMap;
use std::sync::Arc;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use toolbridge_core::policy::DEFAULT_MODEL;
use toolbridge_core::{CompatibilityPolicy, Error, ToolFilter, ToolSetId, TrimBudget};
use toolbridge_mcp::{HttpToolSource, RetryPolicy, ToolCache, ToolSetSession};

use crate::app_state::{AppState, Toolset};

/// Server configuration, from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "toolbridge-server",
    about = "Serve upstream MCP tools to an LLM agent runtime"
)]
pub struct ServerConfig {
    #[arg(long, env = "TOOLBRIDGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "TOOLBRIDGE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Upstream MCP endpoint as NAME=URL. Repeatable.
    #[arg(
        long = "toolset",
        env = "TOOLBRIDGE_TOOLSETS",
        value_delimiter = ',',
        value_parser = parse_toolset
    )]
    pub toolsets: Vec<ToolsetConfig>,

    /// Restrict a toolset to named tools, as NAME=tool_a,tool_b. Repeatable.
    #[arg(
        long = "allow-tools",
        env = "TOOLBRIDGE_ALLOW_TOOLS",
        value_delimiter = ';',
        value_parser = parse_allow_list
    )]
    pub allow_tools: Vec<AllowList>,

    /// Model the agent runtime talks to.
    #[arg(long, env = "MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Requests go through Vertex AI.
    #[arg(
        long,
        env = "GOOGLE_GENAI_USE_VERTEXAI",
        action = ArgAction::Set,
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    pub use_vertex_ai: bool,

    /// Extra attempts at opening an upstream session after it was closed
    /// underneath a request.
    #[arg(long, env = "TOOLBRIDGE_SESSION_RETRIES", default_value_t = 1)]
    pub session_retries: u32,

    /// Previous user turns kept in each request; -1 disables trimming.
    #[arg(
        long,
        env = "MAX_PREVIOUS_USER_INTERACTIONS",
        default_value = "-1",
        allow_hyphen_values = true
    )]
    pub max_previous_user_turns: TrimBudget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsetConfig {
    pub name: ToolSetId,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    pub toolset: ToolSetId,
    pub tools: Vec<String>,
}

fn split_pair(value: &str, what: &str) -> Result<(String, String), String> {
    let (name, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME={what}, got '{value}'"))?;
    let name = name.trim();
    let rest = rest.trim();
    if name.is_empty() || rest.is_empty() {
        return Err(format!("expected NAME={what}, got '{value}'"));
    }
    Ok((name.to_string(), rest.to_string()))
}

fn parse_toolset(value: &str) -> Result<ToolsetConfig, String> {
    let (name, url) = split_pair(value, "URL")?;
    Ok(ToolsetConfig {
        name: ToolSetId(name),
        url,
    })
}

fn parse_allow_list(value: &str) -> Result<AllowList, String> {
    let (toolset, tools) = split_pair(value, "tool,...")?;
    Ok(AllowList {
        toolset: ToolSetId(toolset),
        tools: tools
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

impl ServerConfig {
    #[must_use]
    pub fn policy(&self) -> CompatibilityPolicy {
        CompatibilityPolicy::new(self.model.clone(), self.use_vertex_ai)
    }

    /// Build one HTTP-backed toolset per configured upstream, all sharing a
    /// fresh cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when an allow-list names an unknown
    /// toolset or two toolsets share a name, and [`Error::Transport`] when an
    /// HTTP client cannot be built.
    pub fn build_state(&self) -> Result<AppState, Error> {
        let mut filters: BTreeMap<&ToolSetId, Vec<String>> = BTreeMap::new();
        for allow in &self.allow_tools {
            if !self.toolsets.iter().any(|t| t.name == allow.toolset) {
                return Err(Error::InvalidInput(format!(
                    "allow-list for unknown toolset '{}'",
                    allow.toolset
                )));
            }
            filters
                .entry(&allow.toolset)
                .or_default()
                .extend(allow.tools.iter().cloned());
        }

        let cache = Arc::new(ToolCache::new());
        let policy = self.policy();
        let toolsets = self
            .toolsets
            .iter()
            .map(|cfg| {
                let filter = filters
                    .get(&cfg.name)
                    .map_or(ToolFilter::All, |names| ToolFilter::names(names.iter().cloned()));
                let source = HttpToolSource::new(cfg.url.clone())?;
                Ok(Toolset {
                    upstream: cfg.url.clone(),
                    session: ToolSetSession::new(cfg.name.clone(), Arc::new(source), Arc::clone(&cache))
                        .with_filter(filter)
                        .with_policy(policy.clone())
                        .with_retry(RetryPolicy::on_closed_session(self.session_retries)),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        AppState::new(toolsets, cache, self.max_previous_user_turns)
    }
}
