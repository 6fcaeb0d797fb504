//! Runs against a real database when `TEST_DATABASE_URL` is set, otherwise
//! every test returns early.

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, id_of, json_body, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn crud_round_trip_against_postgres() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    let created = app
        .create(
            "/jobs",
            &json!({ "title": "Nurse", "employer": "ClinicX", "salary": 50000 }),
        )
        .await?;
    let id = id_of(&created);
    assert!(created["created_at"].is_string());

    let updated = json_body(
        app.put_json(&format!("/jobs/{id}"), &json!({ "title": "Head Nurse" }))
            .await?,
    )
    .await?;
    assert_eq!(updated["title"], "Head Nurse");
    assert_eq!(updated["employer"], Value::Null);

    let missing = json_body(app.put_json("/jobs/999999", &json!({ "title": "x" })).await?).await?;
    assert_eq!(missing, Value::Null);

    let response = app.post_json("/jobs", &json!({ "employer": "ClinicX" })).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = app.delete(&format!("/jobs/{id}")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(app.get("/jobs").await?).await?, json!([]));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn conversation_summaries_against_postgres() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let Some(app) = TestApp::postgres().await? else {
        return Ok(());
    };

    let candidate = id_of(&app.create("/candidates", &json!({ "name": "Ada" })).await?);
    let busy = id_of(
        &app.create("/conversations", &json!({ "candidate_id": candidate }))
            .await?,
    );
    let silent = id_of(
        &app.create("/conversations", &json!({ "candidate_id": candidate }))
            .await?,
    );
    app.post_json(
        &format!("/messages/conversation/{busy}"),
        &json!({ "message": "hello" }),
    )
    .await?;

    let listed = json_body(app.get("/conversations").await?).await?;
    let listed = listed.as_array().expect("array body");
    let ids: Vec<i64> = listed.iter().map(id_of).collect();
    assert_eq!(ids, vec![busy, silent]);
    assert_eq!(listed[0]["last_message"], "hello");
    assert_eq!(listed[0]["message_count"], 1);

    let account = app
        .create(
            "/hr-accounts",
            &json!({ "email": "hr@example.com", "password": "s3cret" }),
        )
        .await?;
    assert!(account.get("password").is_none());

    app.cleanup().await?;
    Ok(())
}
