//! Integration tests against a real Postgres instance (§8 scenarios),
//! following the teacher's `db_tests.rs` pattern: `TEST_DATABASE_URL` +
//! per-test `TRUNCATE` cleanup, `#[tokio::test]` end to end through the
//! actual consumer/store stack rather than mocks.

use chrono::Utc;
use coves_appview::consumers;
use coves_appview::firehose::{CommitEvent, Operation};
use coves_appview::store::{self, communities, users, DbConfig, DbPool};
use serde_json::json;
use std::time::Duration;

async fn setup_test_db() -> DbPool {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/coves_test".to_string());

    let config = DbConfig {
        database_url,
        max_connections: 10,
        min_connections: 2,
        acquire_timeout: Duration::from_secs(30),
        idle_timeout: Duration::from_secs(600),
    };

    store::init_db(config).await.expect("failed to initialize test database")
}

async fn cleanup(pool: &DbPool) {
    sqlx::query(
        "TRUNCATE TABLE posts, comments, votes, communities, users, aggregators, \
         aggregator_authorizations, aggregator_post_ledger, firehose_checkpoints CASCADE",
    )
    .execute(pool)
    .await
    .expect("failed to clean up test data");
}

async fn seed_user(pool: &DbPool, did: &str) {
    users::create(pool, did, &format!("{did}.test"), "https://pds.example.com").await.expect("seed user");
}

async fn seed_community(pool: &DbPool, did: &str) {
    communities::create(
        pool,
        communities::NewCommunity {
            did,
            handle: &format!("c-{did}.coves.test"),
            name: did,
            display_name: did,
            owner_did: "did:plc:owner",
            created_by_did: "did:plc:owner",
            hosted_by_did: did,
            pds_url: "https://pds.example.com",
            pds_email: "community@example.com",
            pds_password_sealed: "sealed",
            pds_access_token_sealed: "sealed",
            pds_refresh_token_sealed: "sealed",
            record_uri: &format!("at://{did}/social.coves.community.profile/self"),
            record_cid: "bafyprofile",
        },
    )
    .await
    .expect("seed community");
}

fn post_event(author: &str, community: &str, rkey: &str, cid: &str, op: Operation) -> CommitEvent {
    CommitEvent {
        repo_did: author.to_string(),
        rev: "1".into(),
        operation: op,
        collection: "social.coves.post".into(),
        rkey: rkey.into(),
        cid: Some(cid.into()),
        record: Some(json!({
            "community": community,
            "title": "hello",
            "content": "world",
            "createdAt": Utc::now().to_rfc3339(),
        })),
    }
}

fn comment_event(
    author: &str,
    rkey: &str,
    cid: &str,
    root: (&str, &str),
    parent: (&str, &str),
    op: Operation,
) -> CommitEvent {
    CommitEvent {
        repo_did: author.to_string(),
        rev: "1".into(),
        operation: op,
        collection: "social.coves.comment".into(),
        rkey: rkey.into(),
        cid: Some(cid.into()),
        record: Some(json!({
            "content": "a reply",
            "root": { "uri": root.0, "cid": root.1 },
            "parent": { "uri": parent.0, "cid": parent.1 },
            "createdAt": Utc::now().to_rfc3339(),
        })),
    }
}

#[tokio::test]
async fn out_of_order_comment_threading_reconciles() {
    let pool = setup_test_db().await;
    cleanup(&pool).await;

    seed_user(&pool, "did:plc:author").await;
    seed_user(&pool, "did:plc:commenter1").await;
    seed_user(&pool, "did:plc:commenter2").await;
    seed_community(&pool, "did:plc:community1").await;

    let post_uri = "at://did:plc:author/social.coves.post/p1";

    // The reply to the root comment arrives before the root comment itself.
    let grandchild = comment_event(
        "did:plc:commenter2",
        "c2",
        "bafyc2",
        (post_uri, "bafypost"),
        ("at://did:plc:commenter1/social.coves.comment/c1", "bafyc1"),
        Operation::Create,
    );
    let outcome = consumers::dispatch(&pool, &grandchild).await.expect("grandchild dispatch");
    assert_eq!(outcome, consumers::ConsumeOutcome::Indexed);

    // Post, then the root comment itself — it should pick up the
    // already-indexed child via forward reconciliation.
    let post = post_event("did:plc:author", "did:plc:community1", "p1", "bafypost", Operation::Create);
    consumers::dispatch(&pool, &post).await.expect("post dispatch");

    let root_comment = comment_event(
        "did:plc:commenter1",
        "c1",
        "bafyc1",
        (post_uri, "bafypost"),
        (post_uri, "bafypost"),
        Operation::Create,
    );
    let outcome = consumers::dispatch(&pool, &root_comment).await.expect("root comment dispatch");
    assert_eq!(outcome, consumers::ConsumeOutcome::Indexed);

    let root = store::comments::get_by_uri(&pool, "at://did:plc:commenter1/social.coves.comment/c1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.reply_count, 1, "root comment should see its already-indexed child");

    let post_row = store::posts::get_by_uri(&pool, post_uri).await.unwrap().unwrap();
    assert_eq!(post_row.comment_count, 1, "post should count only its direct child");
}

#[tokio::test]
async fn comment_resurrection_may_rebind_threading_refs() {
    let pool = setup_test_db().await;
    cleanup(&pool).await;

    seed_user(&pool, "did:plc:author").await;
    seed_user(&pool, "did:plc:commenter").await;
    seed_community(&pool, "did:plc:community1").await;

    let post_a = "at://did:plc:author/social.coves.post/a";
    let post_b = "at://did:plc:author/social.coves.post/b";
    consumers::dispatch(&pool, &post_event("did:plc:author", "did:plc:community1", "a", "bafya", Operation::Create))
        .await
        .unwrap();
    consumers::dispatch(&pool, &post_event("did:plc:author", "did:plc:community1", "b", "bafyb", Operation::Create))
        .await
        .unwrap();

    let uri = "at://did:plc:commenter/social.coves.comment/c1";
    let create = comment_event("did:plc:commenter", "c1", "bafy1", (post_a, "bafya"), (post_a, "bafya"), Operation::Create);
    consumers::dispatch(&pool, &create).await.unwrap();

    let delete = CommitEvent { operation: Operation::Delete, record: None, cid: None, ..create.clone() };
    let outcome = consumers::dispatch(&pool, &delete).await.unwrap();
    assert_eq!(outcome, consumers::ConsumeOutcome::Deleted);

    // Recreate at the same rkey, bound to a different post entirely.
    let recreate = comment_event("did:plc:commenter", "c1", "bafy2", (post_b, "bafyb"), (post_b, "bafyb"), Operation::Create);
    let outcome = consumers::dispatch(&pool, &recreate).await.unwrap();
    assert_eq!(outcome, consumers::ConsumeOutcome::Resurrected);

    let row = store::comments::get_by_uri(&pool, uri).await.unwrap().unwrap();
    assert_eq!(row.root_uri, post_b, "resurrection may rebind root/parent to a different thread");
    assert!(row.is_live());
}

#[tokio::test]
async fn threading_refs_are_immutable_on_update() {
    let pool = setup_test_db().await;
    cleanup(&pool).await;

    seed_user(&pool, "did:plc:author").await;
    seed_user(&pool, "did:plc:commenter").await;
    seed_community(&pool, "did:plc:community1").await;

    let post_a = "at://did:plc:author/social.coves.post/a";
    let post_b = "at://did:plc:author/social.coves.post/b";
    consumers::dispatch(&pool, &post_event("did:plc:author", "did:plc:community1", "a", "bafya", Operation::Create))
        .await
        .unwrap();
    consumers::dispatch(&pool, &post_event("did:plc:author", "did:plc:community1", "b", "bafyb", Operation::Create))
        .await
        .unwrap();

    let create = comment_event("did:plc:commenter", "c1", "bafy1", (post_a, "bafya"), (post_a, "bafya"), Operation::Create);
    consumers::dispatch(&pool, &create).await.unwrap();

    // Same live rkey, different parent ref — rejected, not silently applied.
    let update = comment_event("did:plc:commenter", "c1", "bafy2", (post_b, "bafyb"), (post_b, "bafyb"), Operation::Update);
    let result = consumers::dispatch(&pool, &update).await;
    assert!(matches!(result, Err(consumers::ConsumeError::ThreadingImmutable)));
}

#[tokio::test]
async fn aggregator_post_rate_limit_rejects_the_tenth_post_within_the_window() {
    let pool = setup_test_db().await;
    cleanup(&pool).await;

    seed_user(&pool, "did:plc:aggregator1").await;
    seed_community(&pool, "did:plc:community1").await;

    sqlx::query(
        "INSERT INTO aggregators (did, display_name, description, config_schema, maintainer_did, \
         source_url, record_uri, record_cid, communities_using, posts_created, created_at, indexed_at) \
         VALUES ($1, 'Agg', NULL, '{}', 'did:plc:maintainer', NULL, $2, 'bafyagg', 0, 0, now(), now())",
    )
    .bind("did:plc:aggregator1")
    .bind("at://did:plc:aggregator1/social.coves.aggregator.profile/self")
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO aggregator_authorizations (aggregator_did, community_did, enabled, config, \
         created_by, disabled_by, disabled_at, record_uri, record_cid, created_at, indexed_at) \
         VALUES ($1, $2, true, '{}', 'did:plc:owner', NULL, NULL, $3, 'bafyauth', now(), now())",
    )
    .bind("did:plc:aggregator1")
    .bind("did:plc:community1")
    .bind("at://did:plc:community1/social.coves.community.aggregatorAuthorization/did:plc:aggregator1")
    .execute(&pool)
    .await
    .unwrap();

    for i in 0..10 {
        let event = post_event(
            "did:plc:aggregator1",
            "did:plc:community1",
            &format!("p{i}"),
            &format!("bafy{i}"),
            Operation::Create,
        );
        let outcome = consumers::dispatch(&pool, &event).await;
        assert!(outcome.is_ok(), "post {i} should be accepted within the rate limit window");
    }

    let eleventh = post_event("did:plc:aggregator1", "did:plc:community1", "p10", "bafy10", Operation::Create);
    let result = consumers::dispatch(&pool, &eleventh).await;
    assert!(matches!(result, Err(consumers::ConsumeError::RateLimited)));
}

#[tokio::test]
async fn community_creation_rejects_duplicate_name() {
    let pool = setup_test_db().await;
    cleanup(&pool).await;

    seed_community(&pool, "did:plc:community1").await;

    let duplicate = communities::create(
        &pool,
        communities::NewCommunity {
            did: "did:plc:community2",
            handle: "c-did:plc:community1.coves.test",
            name: "did:plc:community1",
            display_name: "dup",
            owner_did: "did:plc:owner",
            created_by_did: "did:plc:owner",
            hosted_by_did: "did:plc:community2",
            pds_url: "https://pds.example.com",
            pds_email: "dup@example.com",
            pds_password_sealed: "sealed",
            pds_access_token_sealed: "sealed",
            pds_refresh_token_sealed: "sealed",
            record_uri: "at://did:plc:community2/social.coves.community.profile/self",
            record_cid: "bafydup",
        },
    )
    .await;

    assert!(duplicate.is_err(), "name is UNIQUE — a second community can't claim it");
}
