//! taskrelay agent
//!
//! Loads the relay configuration, starts every configured capability provider and serves the
//! engine workflows over HTTP.
//!
//! Usage:
//!   taskrelay-agent --config taskrelay.toml [--bind 0.0.0.0:34430]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use taskrelay::{
    load_config, AdminInstruction, BroadcastNotifier, Engine, HttpNotifier, HttpPersistence,
    InMemoryPersistence, ModelOracle, NotificationChannel, OpenAiCompatibleOracle,
    PersistenceService, PlanRequest, RelayConfig, ServerRegistry, TaskRequest,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "taskrelay-agent")]
#[command(about = "Plan/task relay between a chat room, a language model and capability providers")]
struct Args {
    /// Path to the relay configuration file (TOML format)
    #[arg(long, env = "TASKRELAY_CONFIG", default_value = "taskrelay.toml")]
    config: String,

    /// Address to serve on; overrides `[server].bind`
    #[arg(long, env = "TASKRELAY_BIND")]
    bind: Option<String>,

    /// Oracle API key; overrides `[llm].api_key`
    #[arg(long, env = "TASKRELAY_LLM_API_KEY")]
    llm_api_key: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(key) = &self.llm_api_key {
            config.llm.api_key = Some(key.clone());
        }
    }
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskrelay=info,taskrelay_agent=info".into()),
        )
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let mut config = load_config(&args.config)?;
    args.apply(&mut config);
    info!("Loaded relay configuration from: {}", args.config);

    let engine = Arc::new(build_engine(&config).await?);
    let app = router(AppState {
        engine: engine.clone(),
    });

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("taskrelay agent listening on http://{}", config.server.bind);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.registry().shutdown().await;
    info!("taskrelay agent stopped");
    Ok(())
}

async fn build_engine(config: &RelayConfig) -> anyhow::Result<Engine> {
    let registry =
        Arc::new(ServerRegistry::new().with_handshake_timeout(config.engine.handshake_timeout()));
    let failures = registry.register_all(&config.providers).await;
    info!(
        registered = config.providers.len() - failures.len(),
        failed = failures.len(),
        "providers started"
    );

    let oracle: Arc<dyn ModelOracle> = Arc::new(OpenAiCompatibleOracle::new(config.llm.clone())?);

    let persistence: Arc<dyn PersistenceService> = if config.persistence.base_url.is_empty() {
        warn!("no persistence base_url configured, keeping plans in memory");
        Arc::new(InMemoryPersistence::new())
    } else {
        Arc::new(HttpPersistence::new(&config.persistence)?)
    };

    let notifier: Arc<dyn NotificationChannel> = match &config.notifications.url {
        Some(url) => Arc::new(HttpNotifier::new(url.clone())?),
        None => Arc::new(BroadcastNotifier::default()),
    };

    Ok(Engine::new(config, registry, oracle, persistence, notifier))
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/servers", get(handle_servers))
        .route("/plan", post(handle_create_plan))
        .route("/plan/:id/reconcile", post(handle_reconcile))
        .route("/task/plan", post(handle_plan_task))
        .route("/task/execute", post(handle_execute_task))
        .route("/admin/message", post(handle_admin_message))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
        return;
    }
    info!("Ctrl+C received, shutting down...");
}

fn accepted(operation: &str) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "operation": operation })),
    )
}

async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "server": "taskrelay-agent" }))
}

#[derive(Debug, Deserialize, Default)]
struct ServersQuery {
    #[serde(default)]
    refresh: bool,
}

async fn handle_servers(
    State(state): State<AppState>,
    Query(query): Query<ServersQuery>,
) -> impl IntoResponse {
    Json(state.engine.servers(query.refresh).await)
}

async fn handle_create_plan(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> impl IntoResponse {
    tokio::spawn(async move {
        state.engine.create_plan(&request).await;
    });
    accepted("create_plan")
}

async fn handle_plan_task(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> impl IntoResponse {
    tokio::spawn(async move {
        state.engine.plan_task(&request.plan, &request.task).await;
    });
    accepted("plan_task")
}

async fn handle_execute_task(
    State(state): State<AppState>,
    Json(request): Json<TaskRequest>,
) -> impl IntoResponse {
    tokio::spawn(async move {
        state.engine.execute_task(&request.plan, &request.task).await;
    });
    accepted("execute_task")
}

async fn handle_admin_message(
    State(state): State<AppState>,
    Json(instruction): Json<AdminInstruction>,
) -> impl IntoResponse {
    tokio::spawn(async move {
        state.engine.process_admin_message(&instruction).await;
    });
    accepted("admin_message")
}

async fn handle_reconcile(
    State(state): State<AppState>,
    Path(plan_id): Path<String>,
) -> impl IntoResponse {
    let update = state.engine.reconcile_plan(&plan_id).await;
    Json(json!({ "plan_id": plan_id, "update": update }))
}
