use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use retropodo::config::Config;
use retropodo::db::{RequestContext, Store};
use retropodo::entities::{auth_events, sessions};
use retropodo::services::{
    AuthError, AuthService, LinkLogMailer, SeaOrmAuthService, SessionManager,
};

async fn spawn_store() -> Store {
    Store::new("sqlite::memory:")
        .await
        .expect("Failed to create store")
}

fn manager(store: &Store) -> SessionManager {
    SessionManager::new(store.clone(), 1440)
}

async fn session_row(store: &Store, key: &str) -> Option<sessions::Model> {
    sessions::Entity::find()
        .filter(sessions::Column::SessionKey.eq(key))
        .one(&store.conn)
        .await
        .unwrap()
}

#[tokio::test]
async fn establish_binds_identity_under_a_fresh_key() {
    let store = spawn_store().await;
    let sessions = manager(&store);

    let session = sessions
        .establish(None, 7, "jean@example.com", "user")
        .await
        .unwrap();

    assert_eq!(session.key.len(), 64);
    assert_eq!(session.user_id, 7);
    assert_eq!(session.role, "user");
    assert_eq!(session.active_cabinet_id, None);

    let current = sessions.current_user(&session.key).await.unwrap().unwrap();
    assert_eq!(current.user_id, 7);
    assert_eq!(current.email, "jean@example.com");
}

#[tokio::test]
async fn establish_invalidates_the_prior_key() {
    let store = spawn_store().await;
    let sessions = manager(&store);

    let old = sessions
        .establish(None, 7, "jean@example.com", "user")
        .await
        .unwrap();
    let new = sessions
        .establish(Some(&old.key), 7, "jean@example.com", "user")
        .await
        .unwrap();

    assert_ne!(old.key, new.key);
    assert!(sessions.current_user(&old.key).await.unwrap().is_none());
    assert!(sessions.current_user(&new.key).await.unwrap().is_some());
    assert_eq!(
        sessions::Entity::find().count(&store.conn).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn destroy_is_unconditional_and_idempotent() {
    let store = spawn_store().await;
    let sessions = manager(&store);

    let session = sessions
        .establish(None, 7, "jean@example.com", "user")
        .await
        .unwrap();

    sessions.destroy(&session.key).await.unwrap();
    assert!(sessions.current_user(&session.key).await.unwrap().is_none());

    // Again, and for a key that never existed.
    sessions.destroy(&session.key).await.unwrap();
    sessions.destroy("no-such-key").await.unwrap();
}

#[tokio::test]
async fn expired_sessions_read_as_absent_and_are_removed() {
    let store = spawn_store().await;
    let sessions = manager(&store);

    let session = sessions
        .establish(None, 7, "jean@example.com", "user")
        .await
        .unwrap();

    sessions::Entity::update_many()
        .col_expr(
            sessions::Column::ExpiresAt,
            Expr::value(Utc::now() - Duration::minutes(1)),
        )
        .filter(sessions::Column::SessionKey.eq(&session.key))
        .exec(&store.conn)
        .await
        .unwrap();

    assert!(sessions.current_user(&session.key).await.unwrap().is_none());
    assert!(session_row(&store, &session.key).await.is_none());
}

#[tokio::test]
async fn lookup_slides_the_expiry_forward() {
    let store = spawn_store().await;
    let sessions = manager(&store);

    let session = sessions
        .establish(None, 7, "jean@example.com", "user")
        .await
        .unwrap();

    // Pull the expiry close, then confirm a lookup pushes it back out.
    sessions::Entity::update_many()
        .col_expr(
            sessions::Column::ExpiresAt,
            Expr::value(Utc::now() + Duration::minutes(1)),
        )
        .filter(sessions::Column::SessionKey.eq(&session.key))
        .exec(&store.conn)
        .await
        .unwrap();

    sessions.current_user(&session.key).await.unwrap().unwrap();

    let row = session_row(&store, &session.key).await.unwrap();
    assert!(row.expires_at > Utc::now() + Duration::minutes(1000));
}

#[tokio::test]
async fn require_authenticated_gates_unknown_keys() {
    let store = spawn_store().await;
    let sessions = manager(&store);

    let err = sessions.require_authenticated("no-such-key").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized));

    let session = sessions
        .establish(None, 7, "jean@example.com", "user")
        .await
        .unwrap();
    let identity = sessions.require_authenticated(&session.key).await.unwrap();
    assert_eq!(identity.user_id, 7);

    assert_eq!(sessions.current_user_id(&session.key).await.unwrap(), Some(7));
    assert_eq!(sessions.current_user_id("no-such-key").await.unwrap(), None);
}

#[tokio::test]
async fn active_cabinet_slot_is_readable_and_writable() {
    let store = spawn_store().await;
    let sessions = manager(&store);

    let session = sessions
        .establish(None, 7, "jean@example.com", "user")
        .await
        .unwrap();

    assert_eq!(sessions.active_cabinet_id(&session.key).await.unwrap(), None);

    sessions
        .set_active_cabinet(&session.key, Some(3))
        .await
        .unwrap();
    assert_eq!(
        sessions.active_cabinet_id(&session.key).await.unwrap(),
        Some(3)
    );

    sessions.set_active_cabinet(&session.key, None).await.unwrap();
    assert_eq!(sessions.active_cabinet_id(&session.key).await.unwrap(), None);
}

#[tokio::test]
async fn logout_audits_live_sessions_then_destroys() {
    let store = spawn_store().await;
    let sessions = manager(&store);
    let config = Config::default();
    let service = SeaOrmAuthService::new(
        store.clone(),
        &config,
        Arc::new(LinkLogMailer::new(&config.general.app_url)),
    );

    let session = sessions
        .establish(None, 7, "Jean@Example.com", "user")
        .await
        .unwrap();

    service
        .logout(&session.key, &RequestContext::anonymous())
        .await
        .unwrap();

    assert!(sessions.current_user(&session.key).await.unwrap().is_none());

    let events = auth_events::Entity::find().all(&store.conn).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "logout");
    assert_eq!(events[0].user_id, Some(7));
    assert_eq!(events[0].email_normalized.as_deref(), Some("jean@example.com"));

    // Logging out a dead key is a no-op, not an error, and not audited.
    service
        .logout(&session.key, &RequestContext::anonymous())
        .await
        .unwrap();
    assert_eq!(
        auth_events::Entity::find().count(&store.conn).await.unwrap(),
        1
    );
}
