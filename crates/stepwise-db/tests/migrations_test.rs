//! Migration and pool tests against a real PostgreSQL server.

use chrono::Utc;
use serde_json::json;
use sqlx::Row;

use stepwise_db::config::DbConfig;
use stepwise_db::models::{PlanCounts, PlanSource};
use stepwise_db::pool;
use stepwise_db::queries::plans;
use stepwise_test_utils::TestDb;

#[tokio::test]
async fn migrations_create_plans_table() {
    let db = TestDb::create().await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' AND tablename NOT LIKE '\\_sqlx%' \
         ORDER BY tablename",
    )
    .fetch_all(&db.pool)
    .await
    .expect("should list tables");

    let names: Vec<&str> = rows.iter().map(|(n,)| n.as_str()).collect();
    assert_eq!(names, vec!["plans"]);

    db.teardown().await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = TestDb::create().await;

    // TestDb::create already ran them once.
    pool::run_migrations(&db.pool)
        .await
        .expect("second migration run should succeed");

    let row = sqlx::query("SELECT COUNT(*) AS cnt FROM plans")
        .fetch_one(&db.pool)
        .await
        .expect("count should succeed");
    let count: i64 = row.get("cnt");
    assert_eq!(count, 0);

    db.teardown().await;
}

#[tokio::test]
async fn count_plans_splits_by_source() {
    let db = TestDb::create().await;

    let empty = plans::count_plans(&db.pool)
        .await
        .expect("count_plans should succeed");
    assert_eq!(empty, PlanCounts::default());

    let body = json!({ "title": "T", "tasks": [] });
    for source in [PlanSource::Generated, PlanSource::Synthesized, PlanSource::Synthesized] {
        plans::insert_plan(&db.pool, "goal", &body, source, Utc::now())
            .await
            .expect("insert should succeed");
    }

    let counts = plans::count_plans(&db.pool).await.unwrap();
    assert_eq!(counts.generated, 1);
    assert_eq!(counts.synthesized, 2);
    assert_eq!(counts.total(), 3);

    db.teardown().await;
}

#[tokio::test]
async fn ensure_database_exists_is_a_no_op_for_existing_database() {
    let db = TestDb::create().await;

    let config = DbConfig::new(stepwise_test_utils::url_for(
        stepwise_test_utils::pg_url().await,
        &db.name,
    ));
    let created = pool::ensure_database_exists(&config)
        .await
        .expect("ensure_database_exists should succeed");
    assert!(!created);

    db.teardown().await;
}

#[tokio::test]
async fn source_column_rejects_unknown_values() {
    let db = TestDb::create().await;

    let result = sqlx::query(
        "INSERT INTO plans (goal, plan, source) VALUES ('g', '{}'::jsonb, 'mocked')",
    )
    .execute(&db.pool)
    .await;
    assert!(result.is_err(), "check constraint should reject 'mocked'");

    db.teardown().await;
}
