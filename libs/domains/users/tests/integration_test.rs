//! Integration tests for the users domain
//!
//! These tests use real PostgreSQL via testcontainers to ensure:
//! - Every lifecycle mutation is paired with exactly one audit entry
//! - A failed audit write rolls the mutation back, and a failed delete leaves no entry
//! - Pagination is stable and clamped
//! - Bearer tokens are issued, resolved and revoked individually

use domain_users::*;
use serde_json::json;
use test_utils::{TestDataBuilder, TestDatabase, assertions::*};

fn service(db: &TestDatabase) -> UserService {
    UserService::new(
        db.connection(),
        CredentialHasher::with_params(1024, 1, 1).unwrap(),
    )
}

fn new_user(name: &str, email: &str, role: Option<Role>) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        password: Some("password123".to_string()),
        role,
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_user_writes_one_redacted_audit_entry() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let builder = TestDataBuilder::from_test_name("create_audit");
    let email = builder.email("alice");

    let user = users
        .create_user(new_user("Alice", &email, None), None)
        .await
        .unwrap();

    assert_eq!(user.role, Role::User);
    let hash = assert_some(user.password_hash.clone(), "password hash");
    assert!(hash.starts_with("$argon2"));
    assert!(users.hasher().verify("password123", &hash));

    let entries = users
        .audit()
        .entries_for_subject(users.db(), user.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, AuditAction::Create);
    assert_eq!(entry.performed_by, None);
    assert_eq!(entry.old_values, None);
    assert_eq!(
        entry.new_values,
        Some(json!({"id": user.id, "name": "Alice", "email": email}))
    );
    assert!(!serde_json::to_string(entry).unwrap().contains("password"));
}

#[tokio::test]
async fn test_create_user_normalizes_email_and_rejects_duplicates() {
    let db = TestDatabase::new().await;
    let users = service(&db);

    let user = users
        .create_user(new_user("Carol", "  Carol@Example.TEST ", None), None)
        .await
        .unwrap();
    assert_eq!(user.email, "carol@example.test");

    let err = assert_err(
        users
            .create_user(new_user("Carol 2", "carol@example.test", None), None)
            .await,
        "duplicate email",
    );
    assert!(matches!(err, UserError::DuplicateEmail(_)));

    let entries = users
        .audit()
        .list(users.db(), AuditFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1, "the rejected create must not be audited");
}

#[tokio::test]
async fn test_update_user_logs_before_and_after() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let admin = users
        .create_user(new_user("Admin", "admin@example.test", Some(Role::Admin)), None)
        .await
        .unwrap();
    let bob = users
        .create_user(new_user("Bob", "bob@example.test", None), Some(admin.id))
        .await
        .unwrap();

    let updated = users
        .update_user(
            &bob,
            UserChanges {
                email: Some("new@example.test".to_string()),
                ..Default::default()
            },
            Some(admin.id),
        )
        .await
        .unwrap();

    assert_eq!(updated.email, "new@example.test");
    assert_eq!(updated.name, "Bob");
    assert!(updated.updated_at >= bob.updated_at);

    let updates = users
        .audit()
        .list(
            users.db(),
            AuditFilter {
                subject_user_id: Some(bob.id),
                action: Some(AuditAction::Update),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].performed_by, Some(admin.id));
    assert_eq!(
        updates[0].old_values,
        Some(json!({"name": "Bob", "email": "bob@example.test", "role": "user"}))
    );
    assert_eq!(
        updates[0].new_values,
        Some(json!({"name": "Bob", "email": "new@example.test", "role": "user"}))
    );
}

#[tokio::test]
async fn test_update_user_rehashes_password() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let dave = users
        .create_user(new_user("Dave", "dave@example.test", None), None)
        .await
        .unwrap();

    let updated = users
        .update_user(
            &dave,
            UserChanges {
                password: Some("a-new-password".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

    let hash = assert_some(updated.password_hash, "password hash");
    assert!(users.hasher().verify("a-new-password", &hash));
    assert!(!users.hasher().verify("password123", &hash));
}

#[tokio::test]
async fn test_update_user_rejects_email_of_another_user() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    users
        .create_user(new_user("Erin", "erin@example.test", None), None)
        .await
        .unwrap();
    let frank = users
        .create_user(new_user("Frank", "frank@example.test", None), None)
        .await
        .unwrap();

    let err = assert_err(
        users
            .update_user(
                &frank,
                UserChanges {
                    email: Some("ERIN@example.test".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await,
        "email of another user",
    );
    assert!(matches!(err, UserError::DuplicateEmail(_)));

    let reloaded = users.get_user_by_id(frank.id).await.unwrap();
    assert_eq!(reloaded.email, "frank@example.test");
}

#[tokio::test]
async fn test_failed_audit_write_rolls_back_update() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let bob = users
        .create_user(new_user("Bob", "bob@example.test", None), None)
        .await
        .unwrap();

    db.execute(
        "ALTER TABLE user_audit_logs ADD CONSTRAINT reject_updates CHECK (action <> 'update')",
    )
    .await;

    let err = assert_err(
        users
            .update_user(
                &bob,
                UserChanges {
                    email: Some("new@example.test".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await,
        "audit write should fail",
    );
    assert!(matches!(err, UserError::Persistence(_)));

    let reloaded = users.get_user_by_id(bob.id).await.unwrap();
    assert_eq!(reloaded.email, "bob@example.test");
    assert_eq!(reloaded, bob);
}

#[tokio::test]
async fn test_failed_audit_write_rolls_back_create() {
    let db = TestDatabase::new().await;
    let users = service(&db);

    db.execute(
        "ALTER TABLE user_audit_logs ADD CONSTRAINT reject_creates CHECK (action <> 'create')",
    )
    .await;

    let err = assert_err(
        users
            .create_user(new_user("Carol", "carol@example.test", None), None)
            .await,
        "audit write should fail",
    );
    assert!(matches!(err, UserError::Persistence(_)));

    assert!(
        users
            .find_user_by_email("carol@example.test")
            .await
            .unwrap()
            .is_none(),
        "inserted row should be rolled back"
    );
    let page = users.get_paginated_users(15, 1, 100).await.unwrap();
    assert_eq!(page.total, 0);
    let entries = users
        .audit()
        .list(users.db(), AuditFilter::default())
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_failed_delete_leaves_no_audit_entry() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let dave = users
        .create_user(new_user("Dave", "dave@example.test", None), None)
        .await
        .unwrap();

    // A referencing row without a cascade makes the DELETE itself fail
    db.execute("CREATE TABLE user_pins (user_id BIGINT NOT NULL REFERENCES users(id))")
        .await;
    db.execute(&format!("INSERT INTO user_pins (user_id) VALUES ({})", dave.id))
        .await;

    let err = assert_err(users.delete_user(&dave, None).await, "delete should fail");
    assert!(matches!(err, UserError::Persistence(_)));

    assert_eq!(users.get_user_by_id(dave.id).await.unwrap(), dave);
    let entries = users
        .audit()
        .entries_for_subject(users.db(), dave.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Create);
}

#[tokio::test]
async fn test_delete_user_keeps_history_with_null_subject() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let admin = users
        .create_user(new_user("Admin", "admin@example.test", Some(Role::Admin)), None)
        .await
        .unwrap();
    let gina = users
        .create_user(new_user("Gina", "gina@example.test", None), Some(admin.id))
        .await
        .unwrap();

    assert!(users.delete_user(&gina, Some(admin.id)).await.unwrap());
    assert!(matches!(
        users.get_user_by_id(gina.id).await,
        Err(UserError::NotFound(_))
    ));

    // The subject reference is nulled, so look the entries up by actor.
    let by_admin = users
        .audit()
        .list(
            users.db(),
            AuditFilter {
                performed_by: Some(admin.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let deletes: Vec<_> = by_admin
        .iter()
        .filter(|e| e.action == AuditAction::Delete)
        .collect();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].subject_user_id, None);
    assert_eq!(
        deletes[0].old_values,
        Some(json!({"id": gina.id, "name": "Gina", "email": "gina@example.test"}))
    );
    assert_eq!(deletes[0].new_values, None);
    assert!(by_admin.iter().all(|e| e.subject_user_id.is_none()));

    // Deleting again reports the row as already gone and logs nothing.
    assert!(!users.delete_user(&gina, Some(admin.id)).await.unwrap());
    let total = users
        .audit()
        .list(users.db(), AuditFilter::default())
        .await
        .unwrap();
    assert_eq!(total.len(), 3);
}

#[tokio::test]
async fn test_get_user_by_id_is_idempotent() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let hank = users
        .create_user(new_user("Hank", "hank@example.test", None), None)
        .await
        .unwrap();

    let first = users.get_user_by_id(hank.id).await.unwrap();
    let second = users.get_user_by_id(hank.id).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_pagination_newest_first_and_clamped() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    let builder = TestDataBuilder::from_test_name("pagination");

    let mut ids = Vec::new();
    for i in 0..25 {
        let user = users
            .create_user(
                NewUser {
                    name: builder.name("user", &i.to_string()),
                    email: builder.email(&format!("user{}", i)),
                    password: None,
                    role: None,
                },
                None,
            )
            .await
            .unwrap();
        ids.push(user.id);
    }
    ids.reverse();

    let page = users.get_paginated_users(10, 2, 100).await.unwrap();
    assert_eq!(page.total, 25);
    assert_eq!(page.per_page, 10);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.last_page(), 3);
    assert_eq!(page.from(), Some(11));
    assert_eq!(page.to(), Some(20));
    let page_ids: Vec<i64> = page.users.iter().map(|u| u.id).collect();
    assert_eq!(page_ids, ids[10..20].to_vec());

    let clamped = users.get_paginated_users(500, 1, 100).await.unwrap();
    assert_eq!(clamped.per_page, 100);
    assert_eq!(clamped.users.len(), 25);

    let small_max = users.get_paginated_users(500, 1, 5).await.unwrap();
    assert_eq!(small_max.users.len(), 5);

    let past_end = users.get_paginated_users(10, 9, 100).await.unwrap();
    assert!(past_end.users.is_empty());
    assert_eq!(past_end.from(), None);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_register_then_login() {
    let db = TestDatabase::new().await;
    let auth = AuthService::new(service(&db));

    let (alice, token) = auth
        .register(
            "Alice".to_string(),
            "alice@x.com".to_string(),
            "password123".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(alice.role, Role::User);
    assert!(token.plain_text.starts_with(&format!("{}|", token.token_id)));

    let (logged_in, _) = auth
        .login("alice@x.com", "password123".to_string())
        .await
        .unwrap();
    assert_eq!(logged_in.id, alice.id);

    let err = assert_err(
        auth.login("alice@x.com", "wrong".to_string()).await,
        "wrong password",
    );
    assert!(matches!(err, UserError::InvalidCredentials));

    let err = assert_err(
        auth.login("nobody@x.com", "password123".to_string()).await,
        "unknown email",
    );
    assert!(matches!(err, UserError::InvalidCredentials));

    // Self-registration has no actor.
    let entries = auth
        .users()
        .audit()
        .entries_for_subject(auth.users().db(), alice.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].performed_by, None);
}

#[tokio::test]
async fn test_current_user_and_logout_revokes_only_presented_token() {
    let db = TestDatabase::new().await;
    let auth = AuthService::new(service(&db));

    let (ivy, first) = auth
        .register(
            "Ivy".to_string(),
            "ivy@example.test".to_string(),
            "password123".to_string(),
        )
        .await
        .unwrap();
    let (_, second) = auth
        .login("ivy@example.test", "password123".to_string())
        .await
        .unwrap();

    assert_eq!(auth.current_user(&first.plain_text).await.unwrap().id, ivy.id);

    let principal = auth.authenticate(&first.plain_text).await.unwrap();
    assert_eq!(principal.token_id, first.token_id);
    auth.logout(&principal).await.unwrap();

    assert!(matches!(
        auth.current_user(&first.plain_text).await,
        Err(UserError::Unauthenticated)
    ));
    assert_eq!(auth.current_user(&second.plain_text).await.unwrap().id, ivy.id);
}

#[tokio::test]
async fn test_tampered_and_foreign_tokens_are_rejected() {
    let db = TestDatabase::new().await;
    let auth = AuthService::new(service(&db));

    let (_, token) = auth
        .register(
            "Jack".to_string(),
            "jack@example.test".to_string(),
            "password123".to_string(),
        )
        .await
        .unwrap();
    let (_, secret) = token.plain_text.split_once('|').unwrap();

    // The bare secret resolves by digest.
    assert!(auth.current_user(secret).await.is_ok());

    let wrong_id = format!("{}|{}", token.token_id + 1000, secret);
    assert!(matches!(
        auth.current_user(&wrong_id).await,
        Err(UserError::Unauthenticated)
    ));
    let tampered = format!("{}|{}x", token.token_id, secret);
    assert!(matches!(
        auth.current_user(&tampered).await,
        Err(UserError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_revoke_all_and_cascade_on_delete() {
    let db = TestDatabase::new().await;
    let auth = AuthService::new(service(&db));

    let (kim, first) = auth
        .register(
            "Kim".to_string(),
            "kim@example.test".to_string(),
            "password123".to_string(),
        )
        .await
        .unwrap();
    auth.login("kim@example.test", "password123".to_string())
        .await
        .unwrap();

    assert_eq!(auth.logout_everywhere(kim.id).await.unwrap(), 2);
    assert!(auth.current_user(&first.plain_text).await.is_err());

    let (_, fresh) = auth
        .login("kim@example.test", "password123".to_string())
        .await
        .unwrap();
    assert!(auth.users().delete_user(&kim, None).await.unwrap());
    assert!(matches!(
        auth.current_user(&fresh.plain_text).await,
        Err(UserError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_account_without_password_cannot_log_in() {
    let db = TestDatabase::new().await;
    let users = service(&db);
    users
        .create_user(
            NewUser {
                name: "Lee".to_string(),
                email: "lee@example.test".to_string(),
                password: None,
                role: None,
            },
            None,
        )
        .await
        .unwrap();

    let auth = AuthService::new(users);
    assert!(matches!(
        auth.login("lee@example.test", "".to_string()).await,
        Err(UserError::InvalidCredentials)
    ));
}
