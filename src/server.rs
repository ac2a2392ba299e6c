//!
//! coursegate HTTP server
//! ----------------------
//! This module defines the Axum-based HTTP API over accounts and courses.
//!
//! Responsibilities:
//! - Authentication middleware: every protected route passes through
//!   `require_auth`, which runs the authentication gate and binds the caller into a
//!   `RequestContext` request extension.
//! - Account registration and lookup (`/api/users`).
//! - Course listing, creation, update and deletion (`/api/courses`), with the
//!   ownership guard in front of every mutation.
//! - Startup: store opening, optional demo seeding, banner logs.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::AppResult;
use crate::identity::{AuthOutcome, AuthenticationGate, RequestContext};
use crate::security::SecretHasher;
use crate::storage::{CourseFields, MemoryStore, NewPrincipal, SharedStore};

pub mod accounts;
pub mod courses;
pub mod validation;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub gate: AuthenticationGate,
    /// Hasher for secrets supplied at registration.
    pub hasher: Arc<SecretHasher>,
}

impl AppState {
    pub fn new(store: SharedStore, hasher: SecretHasher) -> Self {
        let gate = AuthenticationGate::with_argon2(store.clone());
        Self { store, gate, hasher: Arc::new(hasher) }
    }
}

fn new_request_id() -> String {
    let mut bytes = [0u8; 8];
    let _ = getrandom::getrandom(&mut bytes);
    let mut id = String::with_capacity(16);
    use std::fmt::Write as _;
    for b in &bytes { let _ = write!(&mut id, "{:02x}", b); }
    id
}

/// Authentication gate as middleware. On success the resolved principal is bound
/// into a fresh `RequestContext`; on any rejection the request ends here with 401.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> AppResult<Response> {
    let request_id = new_request_id();
    let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned);
    match state.gate.authenticate(header.as_deref()).await? {
        AuthOutcome::Authenticated(principal) => {
            debug!(target: "coursegate::auth", request_id = %request_id, principal_id = principal.id, "authenticated");
            req.extensions_mut().insert(RequestContext::authenticated(principal, request_id));
            Ok(next.run(req).await)
        }
        AuthOutcome::Rejected(reason) => {
            reason.log(&request_id);
            Err(reason.into())
        }
    }
}

async fn welcome() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the REST API project!" }))
}

async fn route_not_found() -> Response {
    (axum::http::StatusCode::NOT_FOUND, Json(json!({ "message": "Route Not Found" }))).into_response()
}

/// Build the full router. Public and protected routes are kept in separate routers
/// so the auth layer only wraps the protected ones.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(welcome))
        .route("/api/users", post(accounts::create_account))
        .route("/api/courses", get(courses::list_courses))
        .route("/api/courses/{id}", get(courses::get_course));

    let protected = Router::new()
        .route("/api/users", get(accounts::current_account))
        .route("/api/courses", post(courses::create_course))
        .route("/api/courses/{id}", put(courses::update_course).delete(courses::delete_course))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public.merge(protected).fallback(route_not_found).with_state(state)
}

/// Create the demo account and two courses when the store has no accounts yet.
pub async fn seed_demo_data(state: &AppState) -> anyhow::Result<bool> {
    if state.store.count_principals().await? > 0 { return Ok(false); }
    let hash = state.hasher.hash("joepassword")?;
    let joe = state.store.create_principal(NewPrincipal {
        first_name: "Joe".into(),
        last_name: "Smith".into(),
        email_address: "joe@smith.com".into(),
        password_hash: hash,
    }).await?;
    state.store.create_course(CourseFields {
        title: "Build a Basic Bookcase".into(),
        description: "High-end furniture projects are great to dream about, but start with a basic bookcase.".into(),
        estimated_time: Some("12 hours".into()),
        materials_needed: Some("* 1/2 x 3/4 inch parting strip\n* 1 x 2 common pine".into()),
    }, joe.id).await?;
    state.store.create_course(CourseFields {
        title: "Learn How to Program".into(),
        description: "In this course, you'll learn how to write code like a pro!".into(),
        estimated_time: Some("6 hours".into()),
        materials_needed: Some("* Notebook computer running Mac OS X or Windows\n* Text editor".into()),
    }, joe.id).await?;
    warn!(target: "startup", "seeded demo account joe@smith.com with a well-known password; do not use in production");
    Ok(true)
}

/// Open the configured store and build handler state.
pub fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let store: SharedStore = match &config.data_dir {
        Some(dir) => Arc::new(
            MemoryStore::open(dir).with_context(|| format!("While opening store under data_dir: {}", dir.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };
    let hasher = SecretHasher::with_params(config.hash_memory_kib, config.hash_iterations)
        .context("Invalid Argon2 cost parameters")?;
    Ok(AppState::new(store, hasher))
}

/// Serve `state` on an already bound listener until the listener fails.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "coursegate starting: host={}, http_port={}, data_dir={:?}, hash_memory_kib={}, hash_iterations={}, seed_demo={}",
        config.host, config.http_port, config.data_dir, config.hash_memory_kib, config.hash_iterations, config.seed_demo
    );
    let state = build_state(&config)?;
    if config.seed_demo && seed_demo_data(&state).await? {
        info!(target: "startup", "demo data created");
    }

    let addr: SocketAddr = config.bind_addr().parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_addr()))?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}
