pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AccessConfig;
use crate::services::{
    AccessStore, AccountProvisioner, AuditRecorder, Authorizer, BulkRolePropagator,
    CatalogService, DefaultGrantAssigner, DefaultGrantPolicy, GrantService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub store: Arc<dyn AccessStore>,
    pub authorizer: Authorizer,
    pub catalog: CatalogService,
    pub grants: GrantService,
    pub propagator: BulkRolePropagator,
    pub defaults: DefaultGrantAssigner,
    pub accounts: AccountProvisioner,
    pub audit: AuditRecorder,
}

impl AppState {
    /// Wire every engine component over one store.
    pub fn new(
        config: AccessConfig,
        store: Arc<dyn AccessStore>,
        policy: DefaultGrantPolicy,
    ) -> Self {
        let audit = AuditRecorder::new(store.clone());
        let defaults =
            DefaultGrantAssigner::new(store.clone(), audit.clone(), Arc::new(policy));

        Self {
            authorizer: Authorizer::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            grants: GrantService::new(store.clone()),
            propagator: BulkRolePropagator::new(
                store.clone(),
                audit.clone(),
                config.engine.bulk_update_concurrency,
            ),
            accounts: AccountProvisioner::new(store.clone(), defaults.clone()),
            defaults,
            audit,
            store,
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                        None
                    }
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-request-id"),
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        // Catalog
        .route(
            "/modules",
            get(handlers::catalog::list_modules).post(handlers::catalog::create_module),
        )
        .route(
            "/modules/:module_id",
            get(handlers::catalog::get_module)
                .patch(handlers::catalog::update_module)
                .delete(handlers::catalog::delete_module),
        )
        .route(
            "/modules/:module_id/submodules",
            get(handlers::catalog::list_submodules).post(handlers::catalog::create_submodule),
        )
        .route(
            "/submodules/:submodule_id",
            get(handlers::catalog::get_submodule)
                .patch(handlers::catalog::update_submodule)
                .delete(handlers::catalog::delete_submodule),
        )
        .route(
            "/permissions",
            get(handlers::permissions::list_permissions)
                .post(handlers::permissions::create_permission),
        )
        .route(
            "/permissions/bulk-update",
            post(handlers::permissions::bulk_update),
        )
        .route(
            "/permissions/:permission_id",
            get(handlers::permissions::get_permission)
                .patch(handlers::permissions::update_permission)
                .delete(handlers::permissions::delete_permission),
        )
        // Grants and accounts
        .route("/users", post(handlers::users::create_user))
        .route(
            "/users/:user_id/permissions",
            get(handlers::grants::list_user_grants),
        )
        .route(
            "/users/:user_id/permissions/:permission_id",
            put(handlers::grants::set_grant).delete(handlers::grants::revoke_grant),
        )
        // Decisions and audit
        .route("/me/permissions", get(handlers::authz::my_permissions))
        .route("/authz/check", post(handlers::authz::check))
        .route("/audit-logs", get(handlers::audit::list_audit_logs))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    user_id = tracing::field::Empty,
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Service health check
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": "up"
        }
    })))
}
