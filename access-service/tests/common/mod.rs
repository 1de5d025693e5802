//! Test helpers for access-service integration tests.
//!
//! Builds the engine over `InMemoryStore` and seeds the administrative
//! portal catalog, so tests run without a database.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{AccessConfig, DatabaseConfig, EngineConfig, Environment, SecurityConfig},
    models::{
        Action, ActionSet, CreateModule, CreatePermission, GrantChange, Module, Permission,
        RequestContext, Role, UserAccount,
    },
    services::{AccessStore, DefaultGrantPolicy, InMemoryStore},
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub fn test_config() -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "access-service-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        engine: EngineConfig {
            bulk_update_concurrency: 4,
            default_grant_policy_path: None,
        },
    }
}

/// Catalog of the administrative portal: one module per feature area, each
/// with a single `<area>.access` permission.
pub struct Portal {
    pub actor: Uuid,
    pub modules: HashMap<String, Module>,
    pub permissions: HashMap<String, Permission>,
}

impl Portal {
    pub fn permission(&self, code: &str) -> &Permission {
        &self.permissions[code]
    }

    pub fn id(&self, code: &str) -> Uuid {
        self.permission(code).permission_id
    }

    pub fn module(&self, slug: &str) -> &Module {
        &self.modules[slug]
    }
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(DefaultGrantPolicy::standard())
    }

    pub fn with_policy(policy: DefaultGrantPolicy) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let shared: Arc<dyn AccessStore> = store.clone();
        let state = AppState::new(test_config(), shared, policy);
        Self { store, state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Register a user with the given role and no grants.
    pub async fn user(&self, role: Role) -> Uuid {
        let suffix = Uuid::new_v4().simple().to_string();
        let user = UserAccount::new(
            format!("{}@example.org", &suffix[..12]),
            format!("Test {}", role),
            role,
        );
        let user_id = user.user_id;
        self.store.seed_user(user).await;
        user_id
    }

    /// Write a grant directly, bypassing the grant service and its audit.
    pub async fn grant(&self, user_id: Uuid, permission_id: Uuid, actions: &[Action]) {
        let change = GrantChange::set(
            user_id,
            permission_id,
            actions.iter().copied().collect(),
            Uuid::nil(),
        );
        self.store
            .apply_grant_change(&change, None)
            .await
            .expect("grant write");
    }

    pub async fn actions_of(&self, user_id: Uuid, permission_id: Uuid) -> Option<ActionSet> {
        self.store
            .find_grant(user_id, permission_id)
            .await
            .expect("grant lookup")
            .map(|g| g.actions)
    }

    /// Create the portal catalog through the catalog service.
    pub async fn portal(&self) -> Portal {
        use Action::*;

        let actor = self.user(Role::SuperAdmin).await;
        let ctx = RequestContext::system();
        let documents = [Create, Read, Update, Delete, Export];

        let areas: Vec<(&str, &str, ActionSet)> = vec![
            ("dashboard", "dashboard.access", ActionSet::from([Read, Export])),
            ("settings", "settings.access", ActionSet::from([Read, Update])),
            ("articles", "articles.access", ActionSet::from(documents)),
            ("documents", "documents.access", ActionSet::from(documents)),
            ("constancias", "constancias.access", ActionSet::from(documents)),
            ("resoluciones", "resoluciones.access", ActionSet::from(documents)),
            ("modules", "modules.access", ActionSet::from([Create, Read, Update, Delete])),
            ("permissions", "permissions.access", ActionSet::from([Create, Read, Update, Delete])),
            ("users", "users.access", ActionSet::from([Create, Read, Update, Delete])),
            ("audit", "audit.access", ActionSet::from([Read, Export])),
            ("system", "system.admin", ActionSet::full()),
        ];

        let mut modules = HashMap::new();
        let mut permissions = HashMap::new();
        for (index, (slug, code, supported)) in areas.into_iter().enumerate() {
            let module = self
                .state
                .catalog
                .create_module(
                    actor,
                    CreateModule {
                        name: slug.to_string(),
                        slug: slug.to_string(),
                        description: None,
                        is_active: None,
                        sort_order: Some(index as i32),
                    },
                    &ctx,
                )
                .await
                .expect("create module");

            let permission = self
                .state
                .catalog
                .create_permission(
                    actor,
                    CreatePermission {
                        name: format!("{} access", slug),
                        code: code.to_string(),
                        description: None,
                        module_id: module.module_id,
                        submodule_id: None,
                        supported_actions: supported,
                    },
                    &ctx,
                )
                .await
                .expect("create permission");

            modules.insert(slug.to_string(), module);
            permissions.insert(code.to_string(), permission);
        }

        Portal {
            actor,
            modules,
            permissions,
        }
    }
}

/// Send one request through the router as `user` and decode the JSON body.
/// Empty bodies decode to `Value::Null`.
pub async fn send(
    router: Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("X-User-ID", user);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
