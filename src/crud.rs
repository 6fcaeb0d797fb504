//! The controller every entity shares: one request, one statement, one JSON
//! response. Route factories close over a static [`EntitySchema`] so each
//! resource is wired without per-entity handler code.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put, MethodRouter},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    auth::password,
    error::{AppError, AppResult},
    models::Record,
    schema::{EntitySchema, Relation},
    state::AppState,
};

pub async fn list(state: &AppState, schema: &'static EntitySchema) -> AppResult<Json<Vec<Value>>> {
    let rows = state
        .store
        .list(schema)
        .await
        .map_err(|err| AppError::server(format!("failed to list {}", schema.plural), err))?;
    Ok(Json(present_all(schema, rows)))
}

pub async fn list_related(
    state: &AppState,
    schema: &'static EntitySchema,
    relation: &'static Relation,
    parent_id: i64,
) -> AppResult<Json<Vec<Value>>> {
    let rows = state
        .store
        .list_related(schema, relation, parent_id)
        .await
        .map_err(|err| AppError::server(format!("failed to list {}", schema.plural), err))?;
    Ok(Json(present_all(schema, rows)))
}

pub async fn create(
    state: &AppState,
    schema: &'static EntitySchema,
    body: Record,
) -> AppResult<Json<Value>> {
    let fields = prepare_fields(schema, &body).await?;
    insert(state, schema, fields).await
}

/// Inserts an already prepared column set.
pub async fn insert(
    state: &AppState,
    schema: &'static EntitySchema,
    fields: Record,
) -> AppResult<Json<Value>> {
    let row = state
        .store
        .insert(schema, fields)
        .await
        .map_err(|err| AppError::server(format!("failed to create {}", schema.label), err))?;
    Ok(Json(schema.present(row)))
}

/// Full overwrite. A missing id yields `null` with status 200 rather than 404.
pub async fn update(
    state: &AppState,
    schema: &'static EntitySchema,
    id: i64,
    body: Record,
) -> AppResult<Json<Option<Value>>> {
    let fields = prepare_fields(schema, &body).await?;
    let row = state
        .store
        .update(schema, id, fields)
        .await
        .map_err(|err| AppError::server(format!("failed to update {}", schema.label), err))?;
    if row.is_none() {
        tracing::debug!(table = schema.table, id, "update matched no row");
    }
    Ok(Json(row.map(|row| schema.present(row))))
}

/// Succeeds whether or not the row existed.
pub async fn remove(state: &AppState, schema: &'static EntitySchema, id: i64) -> AppResult<Json<Value>> {
    let deleted = state
        .store
        .delete(schema, id)
        .await
        .map_err(|err| AppError::server(format!("failed to delete {}", schema.label), err))?;
    tracing::debug!(table = schema.table, id, deleted, "delete executed");
    Ok(deleted_message(schema))
}

pub fn deleted_message(schema: &EntitySchema) -> Json<Value> {
    Json(json!({ "message": format!("{} deleted successfully", schema.title()) }))
}

fn present_all(schema: &EntitySchema, rows: Vec<Record>) -> Vec<Value> {
    rows.into_iter().map(|row| schema.present(row)).collect()
}

async fn prepare_fields(schema: &EntitySchema, body: &Record) -> AppResult<Record> {
    let mut fields = schema.writable_fields(body);
    for (column, value) in fields.iter_mut() {
        if !schema.is_secret(column) {
            continue;
        }
        match value {
            Value::Null => {}
            Value::String(plain) => {
                *plain = password::hash(std::mem::take(plain))
                    .await
                    .map_err(|err| AppError::server(format!("failed to save {}", schema.label), err))?;
            }
            _ => return Err(AppError::bad_request(format!("{column} must be a string"))),
        }
    }
    Ok(fields)
}

pub fn lister(schema: &'static EntitySchema) -> MethodRouter<AppState> {
    get(move |State(state): State<AppState>| async move { list(&state, schema).await })
}

pub fn creator(schema: &'static EntitySchema) -> MethodRouter<AppState> {
    post(
        move |State(state): State<AppState>, Json(body): Json<Record>| async move {
            create(&state, schema, body).await
        },
    )
}

pub fn updater(schema: &'static EntitySchema) -> MethodRouter<AppState> {
    put(
        move |State(state): State<AppState>, Path(id): Path<i64>, Json(body): Json<Record>| async move {
            update(&state, schema, id, body).await
        },
    )
}

pub fn deleter(schema: &'static EntitySchema) -> MethodRouter<AppState> {
    delete(
        move |State(state): State<AppState>, Path(id): Path<i64>| async move {
            remove(&state, schema, id).await
        },
    )
}

pub fn related_lister(
    schema: &'static EntitySchema,
    relation: &'static Relation,
) -> MethodRouter<AppState> {
    get(
        move |State(state): State<AppState>, Path(parent_id): Path<i64>| async move {
            list_related(&state, schema, relation, parent_id).await
        },
    )
}

/// `GET|POST /`, `PUT|DELETE /:id`, and `GET /<segment>/:id` for every
/// relation the schema declares.
pub fn resource_routes(schema: &'static EntitySchema) -> Router<AppState> {
    let router = Router::new()
        .route("/", lister(schema).merge(creator(schema)))
        .route("/:id", updater(schema).merge(deleter(schema)));
    relation_routes(router, schema)
}

pub fn relation_routes(
    router: Router<AppState>,
    schema: &'static EntitySchema,
) -> Router<AppState> {
    schema.relations.iter().copied().fold(router, |router, relation| {
        router.route(
            &format!("/{}/:id", relation.segment),
            related_lister(schema, relation),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{HR_ACCOUNTS, JOBS};

    #[tokio::test]
    async fn prepare_fields_hashes_secrets() {
        let body = json!({ "email": "hr@example.com", "password": "s3cret" });
        let fields = prepare_fields(&HR_ACCOUNTS, body.as_object().unwrap())
            .await
            .unwrap();

        let stored = fields["password"].as_str().unwrap();
        assert_ne!(stored, "s3cret");
        assert!(password::verify_password("s3cret", stored).unwrap());
    }

    #[tokio::test]
    async fn prepare_fields_rejects_non_string_secrets() {
        let body = json!({ "email": "hr@example.com", "password": 1234 });
        let err = prepare_fields(&HR_ACCOUNTS, body.as_object().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn prepare_fields_leaves_plain_columns_alone() {
        let body = json!({ "title": "Nurse", "salary": 50000 });
        let fields = prepare_fields(&JOBS, body.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(fields["title"], json!("Nurse"));
        assert_eq!(fields["salary"], json!(50000));
    }

    #[test]
    fn deleted_message_uses_the_entity_title() {
        assert_eq!(
            deleted_message(&JOBS).0,
            json!({ "message": "Job deleted successfully" })
        );
    }
}
