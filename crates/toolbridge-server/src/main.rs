use clap::Parser;
use tracing_subscriber::EnvFilter;

use toolbridge_server::config::ServerConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::parse();
    let state = config.build_state().expect("Invalid toolset configuration");

    if state.toolsets.is_empty() {
        tracing::warn!("No toolsets configured; pass --toolset NAME=URL");
    }
    for (id, toolset) in state.toolsets.iter() {
        tracing::info!(toolset = %id, upstream = %toolset.upstream, "Registered toolset");
    }
    tracing::info!(
        model = %config.model,
        use_vertex_ai = config.use_vertex_ai,
        max_previous_user_turns = i64::from(config.max_previous_user_turns),
        session_retries = config.session_retries,
        "Model configuration"
    );

    let app = toolbridge_server::router::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Toolbridge server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
