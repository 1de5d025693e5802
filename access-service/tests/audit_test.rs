mod common;

use access_service::models::{Action, ActionSet, AuditLogFilter, RequestContext, Role};
use access_service::services::BulkChange;
use common::TestApp;
use service_core::error::AppError;

fn filter() -> AuditLogFilter {
    AuditLogFilter {
        limit: AuditLogFilter::DEFAULT_LIMIT,
        ..Default::default()
    }
}

/// Run one of each kind of mutation so the trail has something to show.
async fn busy_app() -> (TestApp, common::Portal, uuid::Uuid) {
    let app = TestApp::new();
    let portal = app.portal().await;
    let moderator = app.user(Role::Moderator).await;
    let ctx = RequestContext {
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("audit-test".to_string()),
    };

    app.state
        .grants
        .set_grant(
            portal.actor,
            moderator,
            portal.id("articles.access"),
            ActionSet::from([Action::Read]),
            &ctx,
        )
        .await
        .unwrap();
    app.state
        .grants
        .revoke_grant(portal.actor, moderator, portal.id("articles.access"), &ctx)
        .await
        .unwrap();
    app.state
        .propagator
        .apply_bulk_changes(
            vec![BulkChange {
                role: Role::Moderator,
                permission_id: portal.id("documents.access"),
                actions: ActionSet::from([Action::Read]),
            }],
            portal.actor,
            &ctx,
        )
        .await
        .unwrap();
    app.state
        .defaults
        .seed_defaults(moderator, Role::Moderator, &[], portal.actor, &ctx)
        .await
        .unwrap();

    (app, portal, moderator)
}

#[tokio::test]
async fn every_entry_has_an_actor_and_a_snapshot() {
    let (app, _, _) = busy_app().await;

    let logs = app.store.audit_logs().await;
    assert!(!logs.is_empty());
    for entry in &logs {
        assert!(!entry.actor_user_id.is_nil(), "{}", entry.action_code);
        let has_snapshot = entry.changes.get("before").is_some_and(|v| !v.is_null())
            || entry.changes.get("after").is_some_and(|v| !v.is_null());
        assert!(has_snapshot, "{} has no snapshot", entry.action_code);
    }

    for code in [
        "modules.create",
        "permissions.create",
        "user_permissions.set",
        "user_permissions.revoke",
        "permissions.bulk_update",
        "permissions.seed_defaults",
    ] {
        assert!(logs.iter().any(|e| e.action_code == code), "missing {}", code);
    }
}

#[tokio::test]
async fn grant_entries_carry_request_provenance() {
    let (app, _, moderator) = busy_app().await;

    let page = app
        .state
        .audit
        .list(AuditLogFilter {
            action_code: Some("user_permissions.set".to_string()),
            ..filter()
        })
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    let entry = &page.entries[0];
    assert_eq!(entry.entity_id, Some(moderator));
    assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.7"));
    assert_eq!(entry.user_agent.as_deref(), Some("audit-test"));
    assert!(entry.changes["before"].is_null());
    assert_eq!(entry.changes["after"]["actions"], serde_json::json!(["READ"]));
}

#[tokio::test]
async fn filters_and_paging() {
    let (app, portal, moderator) = busy_app().await;
    let audit = &app.state.audit;

    let by_entity = audit
        .list(AuditLogFilter {
            entity_type: Some("user_permission".to_string()),
            entity_id: Some(moderator),
            ..filter()
        })
        .await
        .unwrap();
    assert_eq!(by_entity.total, 2);
    assert!(by_entity
        .entries
        .iter()
        .all(|e| e.entity_id == Some(moderator)));

    let by_actor = audit
        .list(AuditLogFilter {
            actor_user_id: Some(portal.actor),
            ..filter()
        })
        .await
        .unwrap();
    let all = app.store.audit_logs().await;
    assert_eq!(by_actor.total as usize, all.len());

    let page = audit
        .list(AuditLogFilter {
            actor_user_id: Some(portal.actor),
            limit: 2,
            offset: 1,
            ..filter()
        })
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 2);
    assert_eq!(page.total, by_actor.total);
    assert_eq!(page.entries[0], by_actor.entries[1]);

    assert!(by_actor
        .entries
        .windows(2)
        .all(|w| w[0].created_utc >= w[1].created_utc));
}

#[tokio::test]
async fn invalid_filters_are_rejected() {
    let app = TestApp::new();
    let audit = &app.state.audit;

    let zero = audit
        .list(AuditLogFilter {
            limit: 0,
            ..Default::default()
        })
        .await;
    assert!(matches!(zero, Err(AppError::ValidationError(_))));

    let huge = audit
        .list(AuditLogFilter {
            limit: AuditLogFilter::MAX_LIMIT + 1,
            ..Default::default()
        })
        .await;
    assert!(matches!(huge, Err(AppError::ValidationError(_))));

    let now = chrono::Utc::now();
    let inverted = audit
        .list(AuditLogFilter {
            from_utc: Some(now),
            to_utc: Some(now - chrono::Duration::hours(1)),
            ..filter()
        })
        .await;
    assert!(matches!(inverted, Err(AppError::ValidationError(_))));
}
