mod common;

use access_service::models::{
    Action, ActionSet, CreateModule, CreatePermission, RequestContext, Role, UpdateModule,
};
use common::TestApp;
use service_core::error::AppError;
use uuid::Uuid;

fn module_input(slug: &str) -> CreateModule {
    CreateModule {
        name: format!("{} module", slug),
        slug: slug.to_string(),
        description: Some("Portal area".to_string()),
        is_active: None,
        sort_order: None,
    }
}

fn permission_input(code: &str, module_id: Uuid, submodule_id: Option<Uuid>) -> CreatePermission {
    CreatePermission {
        name: code.to_string(),
        code: code.to_string(),
        description: None,
        module_id,
        submodule_id,
        supported_actions: ActionSet::from([Action::Read, Action::Update]),
    }
}

#[tokio::test]
async fn deletion_order_is_permission_then_submodule_then_module() {
    let app = TestApp::new();
    let actor = app.user(Role::SuperAdmin).await;
    let ctx = RequestContext::system();
    let catalog = &app.state.catalog;

    let module = catalog
        .create_module(actor, module_input("reports"), &ctx)
        .await
        .unwrap();
    let submodule = catalog
        .create_submodule(actor, module.module_id, module_input("monthly"), &ctx)
        .await
        .unwrap();
    let permission = catalog
        .create_permission(
            actor,
            permission_input(
                "reports.monthly.access",
                module.module_id,
                Some(submodule.submodule_id),
            ),
            &ctx,
        )
        .await
        .unwrap();

    let blocked = catalog.delete_module(actor, module.module_id, &ctx).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));
    let blocked = catalog
        .delete_submodule(actor, submodule.submodule_id, &ctx)
        .await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    catalog
        .delete_permission(actor, permission.permission_id, &ctx)
        .await
        .unwrap();
    let blocked = catalog.delete_module(actor, module.module_id, &ctx).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    catalog
        .delete_submodule(actor, submodule.submodule_id, &ctx)
        .await
        .unwrap();
    catalog
        .delete_module(actor, module.module_id, &ctx)
        .await
        .unwrap();

    assert!(matches!(
        catalog.get_module(module.module_id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn submodule_slugs_are_scoped_to_their_module() {
    let app = TestApp::new();
    let actor = app.user(Role::SuperAdmin).await;
    let ctx = RequestContext::system();
    let catalog = &app.state.catalog;

    let articles = catalog
        .create_module(actor, module_input("articles"), &ctx)
        .await
        .unwrap();
    let documents = catalog
        .create_module(actor, module_input("documents"), &ctx)
        .await
        .unwrap();

    catalog
        .create_submodule(actor, articles.module_id, module_input("drafts"), &ctx)
        .await
        .unwrap();
    catalog
        .create_submodule(actor, documents.module_id, module_input("drafts"), &ctx)
        .await
        .unwrap();

    let duplicate = catalog
        .create_submodule(actor, articles.module_id, module_input("drafts"), &ctx)
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let duplicate_module = catalog
        .create_module(actor, module_input("articles"), &ctx)
        .await;
    assert!(matches!(duplicate_module, Err(AppError::Conflict(_))));

    let renamed = catalog
        .update_module(
            actor,
            documents.module_id,
            UpdateModule {
                slug: Some("articles".to_string()),
                ..Default::default()
            },
            &ctx,
        )
        .await;
    assert!(matches!(renamed, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn invalid_slugs_and_codes_are_rejected() {
    let app = TestApp::new();
    let actor = app.user(Role::SuperAdmin).await;
    let ctx = RequestContext::system();
    let catalog = &app.state.catalog;

    let bad_slug = catalog
        .create_module(actor, module_input("Not A Slug"), &ctx)
        .await;
    assert!(matches!(bad_slug, Err(AppError::ValidationError(_))));

    let module = catalog
        .create_module(actor, module_input("settings"), &ctx)
        .await
        .unwrap();
    let bad_code = catalog
        .create_permission(actor, permission_input("settings", module.module_id, None), &ctx)
        .await;
    assert!(matches!(bad_code, Err(AppError::ValidationError(_))));

    let mut no_actions = permission_input("settings.access", module.module_id, None);
    no_actions.supported_actions = ActionSet::empty();
    let result = catalog.create_permission(actor, no_actions, &ctx).await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn permission_codes_are_globally_unique() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let ctx = RequestContext::system();

    let result = app
        .state
        .catalog
        .create_permission(
            portal.actor,
            permission_input("users.access", portal.module("settings").module_id, None),
            &ctx,
        )
        .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn submodule_must_belong_to_the_permission_module() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let ctx = RequestContext::system();
    let catalog = &app.state.catalog;

    let drafts = catalog
        .create_submodule(
            portal.actor,
            portal.module("articles").module_id,
            module_input("drafts"),
            &ctx,
        )
        .await
        .unwrap();

    let result = catalog
        .create_permission(
            portal.actor,
            permission_input(
                "documents.drafts",
                portal.module("documents").module_id,
                Some(drafts.submodule_id),
            ),
            &ctx,
        )
        .await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn deleting_a_permission_removes_its_grants() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let articles = portal.id("articles.access");
    let dashboard = portal.id("dashboard.access");
    let first = app.user(Role::Moderator).await;
    let second = app.user(Role::User).await;
    app.grant(first, articles, &[Action::Read]).await;
    app.grant(second, articles, &[Action::Update]).await;
    app.grant(second, dashboard, &[Action::Read]).await;

    app.state
        .catalog
        .delete_permission(portal.actor, articles, &RequestContext::system())
        .await
        .unwrap();

    let grants = app.store.grants().await;
    assert!(grants.iter().all(|g| g.permission_id != articles));
    assert_eq!(app.actions_of(second, dashboard).await, Some(ActionSet::from([Action::Read])));
    assert!(
        !app.state
            .authorizer
            .has_permission(first, "articles.access", Some(Action::Read))
            .await
    );
}

#[tokio::test]
async fn listings_are_filtered_and_ordered() {
    let app = TestApp::new();
    let portal = app.portal().await;
    let catalog = &app.state.catalog;

    let modules = catalog.list_modules().await.unwrap();
    assert_eq!(modules.len(), portal.modules.len());
    assert_eq!(modules[0].slug, "dashboard");
    assert!(modules.windows(2).all(|w| w[0].sort_order <= w[1].sort_order));

    let only_audit = catalog
        .list_permissions(access_service::models::PermissionFilter {
            module_id: Some(portal.module("audit").module_id),
            submodule_id: None,
        })
        .await
        .unwrap();
    assert_eq!(only_audit.len(), 1);
    assert_eq!(only_audit[0].code, "audit.access");

    let missing = catalog.list_submodules(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}
