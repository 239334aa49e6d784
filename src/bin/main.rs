//! OAuth-protected MCP tool gateway.
//!
//! Serves a small demo tool catalog behind bearer token verification, with
//! per-caller catalog filtering and scope enforcement on invocation. The
//! identity provider is configured through `OAUTH_*` environment variables.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use mcp_oauth_gate::oauth::{OAuthLayer, ProtectedResourceMetadata, metadata_router};
use mcp_oauth_gate::{
    BoxError, CallerContext, ScopeAuthorizer, ScopeRegistry, ToolDescriptor, TokenVerifier,
    VerifierConfig,
};

#[derive(Parser, Debug)]
#[command(name = "mcp-oauth-gate")]
#[command(about = "OAuth-protected MCP tool gateway", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "MCP_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Authorization server advertised in the protected resource metadata.
    /// Defaults to OAUTH_ISSUER.
    #[arg(long, env = "MCP_AUTHORIZATION_SERVER", value_delimiter = ',')]
    authorization_server: Vec<String>,

    /// Documentation URL advertised in the protected resource metadata
    #[arg(long, env = "MCP_RESOURCE_DOCUMENTATION")]
    resource_documentation: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Clone)]
struct AppState {
    authorizer: ScopeAuthorizer,
    catalog: Arc<Vec<ToolDescriptor>>,
    metadata_url: Arc<str>,
}

/// Demo tools and the scopes each one needs.
const TOOLS: &[(&str, &str, &[&str])] = &[
    ("ping", "Check the server is alive", &[]),
    ("notes_list_notes", "List notes", &["notes:read"]),
    ("notes_get_note", "Read one note", &["notes:read"]),
    ("notes_create_note", "Create a note", &["notes:write"]),
    (
        "notes_move_note",
        "Move a note to another folder",
        &["notes:read", "notes:write"],
    ),
    ("calendar_list_events", "List calendar events", &["calendar:read"]),
    ("calendar_create_event", "Create a calendar event", &["calendar:write"]),
];

fn build_catalog(registry: &ScopeRegistry) -> Vec<ToolDescriptor> {
    TOOLS
        .iter()
        .map(|(name, description, scopes)| {
            registry.declare_requirement(*name, scopes.iter().copied());
            ToolDescriptor::new(*name)
                .description(*description)
                .required_scopes(registry.get_requirement(name))
        })
        .collect()
}

async fn list_tools(State(state): State<AppState>, caller: CallerContext) -> Json<Vec<ToolDescriptor>> {
    let tools: Vec<ToolDescriptor> = state.catalog.iter().cloned().collect();
    Json(state.authorizer.filter_catalog(tools, caller.token()))
}

async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    caller: CallerContext,
) -> Response {
    if !state.catalog.iter().any(|t| t.name == name) {
        return (StatusCode::NOT_FOUND, format!("unknown tool: {}", name)).into_response();
    }

    if let Err(e) = state.authorizer.enforce_tool(&name, caller.token()) {
        return e.to_response(Some(&*state.metadata_url));
    }

    tracing::info!(tool = %name, subject = caller.subject().unwrap_or("anonymous"), "Tool invoked");
    Json(serde_json::json!({
        "tool": name,
        "subject": caller.subject(),
        "isError": false
    }))
    .into_response()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("mcp_oauth_gate={}", args.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = VerifierConfig::from_env()?;
    let verifier = Arc::new(TokenVerifier::from_config(&config)?);

    let registry = Arc::new(ScopeRegistry::new());
    let catalog = build_catalog(&registry);

    let authorization_servers: Vec<String> = if args.authorization_server.is_empty() {
        config.issuer.iter().cloned().collect()
    } else {
        args.authorization_server.clone()
    };
    let mut metadata =
        ProtectedResourceMetadata::from_catalog(config.resource.clone(), authorization_servers, &registry);
    if let Some(url) = args.resource_documentation {
        metadata = metadata.resource_documentation(url);
    }

    let state = AppState {
        authorizer: ScopeAuthorizer::new(registry.clone()),
        catalog: Arc::new(catalog),
        metadata_url: Arc::from(metadata.metadata_url()),
    };

    let app: Router = Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/{name}", post(call_tool))
        .with_state(state)
        .layer(OAuthLayer::new(verifier.clone(), metadata.clone()))
        .route("/health", get(|| async { "ok" }))
        .merge(metadata_router(metadata));

    tracing::info!(
        bind = %args.bind,
        resource = %config.resource,
        tools = registry.len(),
        strategies = ?verifier.strategy_names(),
        "Starting mcp-oauth-gate"
    );

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    verifier.close();
    tracing::info!("Shut down");
    Ok(())
}
