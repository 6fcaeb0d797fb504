use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::models::{record_id, Record};
use crate::schema::{
    self, Direction, EntitySchema, Relation, CONVERSATIONS, CONVERSATION_MESSAGES,
    CREATED_AT_COLUMN, ID_COLUMN, MESSAGES,
};

use super::{RecordStore, StoreError, StoreResult};

/// Process-local stand-in for [`super::PgStore`]: sequential ids per table,
/// `created_at` stamped on insert, `NOT NULL`, `UNIQUE` and foreign-key
/// checks, and `ON DELETE CASCADE`. Key columns are cast to integers like
/// Postgres does; other values are stored as sent, without column typing.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, Table>>,
}

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: Vec<Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn row_count(&self, schema: &EntitySchema) -> usize {
        let tables = self.tables.lock().await;
        tables.get(schema.table).map_or(0, |table| table.rows.len())
    }
}

// same shape as `to_jsonb(timestamptz)`: `+00:00`, not `Z`
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Reads a key column the way `jsonb_populate_record` casts to `BIGINT`:
/// JSON integers and integer strings both qualify.
fn key_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_keys(schema: &EntitySchema, fields: &mut Record) -> StoreResult<()> {
    for relation in schema.relations {
        let Some(value) = fields.get_mut(relation.column) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let id = key_value(value).ok_or_else(|| {
            StoreError::InvalidValue(format!(
                "invalid input syntax for type bigint: {value} ({}.{})",
                schema.table, relation.column
            ))
        })?;
        *value = json!(id);
    }
    Ok(())
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|value| !value.is_null());
    let b = b.filter(|value| !value.is_null());
    match (a, b) {
        // nulls sort as larger than any value
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_rows(schema: &EntitySchema, rows: &mut [Record]) {
    let column = schema.order.column;
    let direction = schema.order.direction;
    rows.sort_by(|a, b| {
        let ordering = compare_values(a.get(column), b.get(column))
            .then_with(|| compare_values(a.get(ID_COLUMN), b.get(ID_COLUMN)));
        match direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    });
}

fn check_constraints(
    tables: &HashMap<&'static str, Table>,
    schema: &EntitySchema,
    fields: &Record,
    current_id: Option<i64>,
) -> StoreResult<()> {
    for column in schema.required {
        if fields.get(*column).map_or(true, Value::is_null) {
            return Err(StoreError::Constraint(format!(
                "null value in column \"{column}\" of relation \"{}\"",
                schema.table
            )));
        }
    }

    let existing = tables
        .get(schema.table)
        .map(|table| table.rows.as_slice())
        .unwrap_or_default();
    for column in schema.unique {
        let Some(value) = fields.get(*column).filter(|value| !value.is_null()) else {
            continue;
        };
        let duplicate = existing
            .iter()
            .filter(|row| current_id.is_none() || record_id(row) != current_id)
            .any(|row| row.get(*column) == Some(value));
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "duplicate key value violates unique constraint on {}.{column}",
                schema.table
            )));
        }
    }

    for relation in schema.relations {
        let Some(value) = fields.get(relation.column).filter(|value| !value.is_null()) else {
            continue;
        };
        let parent_exists = key_value(value).is_some_and(|parent_id| {
            tables.get(relation.parent).is_some_and(|parent| {
                parent
                    .rows
                    .iter()
                    .any(|row| record_id(row) == Some(parent_id))
            })
        });
        if !parent_exists {
            return Err(StoreError::Constraint(format!(
                "insert or update on table \"{}\" violates foreign key \"{}\" referencing \"{}\"",
                schema.table, relation.column, relation.parent
            )));
        }
    }

    Ok(())
}

fn remove_with_dependents(
    tables: &mut HashMap<&'static str, Table>,
    table: &'static str,
    ids: &[i64],
) -> u64 {
    let Some(rows) = tables.get_mut(table).map(|table| &mut table.rows) else {
        return 0;
    };
    let before = rows.len();
    rows.retain(|row| record_id(row).map_or(true, |id| !ids.contains(&id)));
    let removed = (before - rows.len()) as u64;

    if removed > 0 {
        for child in schema::ALL {
            for relation in child.relations.iter().filter(|relation| relation.parent == table) {
                let child_ids: Vec<i64> = tables
                    .get(child.table)
                    .map(|child_table| {
                        child_table
                            .rows
                            .iter()
                            .filter(|row| {
                                row.get(relation.column)
                                    .and_then(key_value)
                                    .is_some_and(|parent_id| ids.contains(&parent_id))
                            })
                            .filter_map(record_id)
                            .collect()
                    })
                    .unwrap_or_default();
                if !child_ids.is_empty() {
                    remove_with_dependents(tables, child.table, &child_ids);
                }
            }
        }
    }

    removed
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self, schema: &'static EntitySchema) -> StoreResult<Vec<Record>> {
        let tables = self.tables.lock().await;
        let mut rows = tables
            .get(schema.table)
            .map(|table| table.rows.clone())
            .unwrap_or_default();
        sort_rows(schema, &mut rows);
        Ok(rows)
    }

    async fn list_related(
        &self,
        schema: &'static EntitySchema,
        relation: &'static Relation,
        parent_id: i64,
    ) -> StoreResult<Vec<Record>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Record> = tables
            .get(schema.table)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .filter(|row| row.get(relation.column).and_then(key_value) == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        sort_rows(schema, &mut rows);
        Ok(rows)
    }

    async fn find(&self, schema: &'static EntitySchema, id: i64) -> StoreResult<Option<Record>> {
        let tables = self.tables.lock().await;
        Ok(tables.get(schema.table).and_then(|table| {
            table
                .rows
                .iter()
                .find(|row| record_id(row) == Some(id))
                .cloned()
        }))
    }

    async fn insert(
        &self,
        schema: &'static EntitySchema,
        mut fields: Record,
    ) -> StoreResult<Record> {
        coerce_keys(schema, &mut fields)?;
        let mut tables = self.tables.lock().await;
        check_constraints(&tables, schema, &fields, None)?;

        let table = tables.entry(schema.table).or_default();
        table.last_id += 1;

        let mut row = Record::new();
        row.insert(ID_COLUMN.to_string(), json!(table.last_id));
        row.extend(fields);
        row.insert(CREATED_AT_COLUMN.to_string(), json!(now_timestamp()));
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        schema: &'static EntitySchema,
        id: i64,
        mut fields: Record,
    ) -> StoreResult<Option<Record>> {
        let mut tables = self.tables.lock().await;
        let exists = tables
            .get(schema.table)
            .is_some_and(|table| table.rows.iter().any(|row| record_id(row) == Some(id)));
        if !exists {
            return Ok(None);
        }
        coerce_keys(schema, &mut fields)?;
        check_constraints(&tables, schema, &fields, Some(id))?;

        let row = tables
            .get_mut(schema.table)
            .and_then(|table| table.rows.iter_mut().find(|row| record_id(row) == Some(id)));
        Ok(row.map(|row| {
            row.extend(fields);
            row.clone()
        }))
    }

    async fn delete(&self, schema: &'static EntitySchema, id: i64) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        Ok(remove_with_dependents(&mut tables, schema.table, &[id]))
    }

    async fn conversation_summaries(&self) -> StoreResult<Vec<Record>> {
        let tables = self.tables.lock().await;
        let conversations = tables
            .get(CONVERSATIONS.table)
            .map(|table| table.rows.as_slice())
            .unwrap_or_default();
        let messages = tables
            .get(MESSAGES.table)
            .map(|table| table.rows.as_slice())
            .unwrap_or_default();

        let mut summaries: Vec<Record> = conversations
            .iter()
            .map(|conversation| {
                let id = record_id(conversation);
                let thread: Vec<&Record> = messages
                    .iter()
                    .filter(|message| {
                        message
                            .get(CONVERSATION_MESSAGES.column)
                            .and_then(key_value)
                            == id
                    })
                    .collect();
                let latest = thread.iter().copied().max_by(|a, b| {
                    compare_values(a.get(CREATED_AT_COLUMN), b.get(CREATED_AT_COLUMN))
                        .then_with(|| compare_values(a.get(ID_COLUMN), b.get(ID_COLUMN)))
                });

                let field = |name: &str| conversation.get(name).cloned().unwrap_or(Value::Null);
                let summary = json!({
                    "id": field(ID_COLUMN),
                    "candidate_id": field("candidate_id"),
                    "subject": field("subject"),
                    "created_at": field(CREATED_AT_COLUMN),
                    "last_message": latest.and_then(|m| m.get("message").cloned()),
                    "last_message_at": latest.and_then(|m| m.get(CREATED_AT_COLUMN).cloned()),
                    "message_count": thread.len(),
                });
                match summary {
                    Value::Object(map) => map,
                    _ => Record::new(),
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            compare_values(a.get("last_message_at"), b.get("last_message_at"))
                .reverse()
                .then_with(|| compare_values(a.get(ID_COLUMN), b.get(ID_COLUMN)).reverse())
        });
        // NULLS LAST: silent conversations go after every active one
        summaries.sort_by_key(|summary| {
            summary
                .get("last_message_at")
                .map_or(true, Value::is_null)
        });

        Ok(summaries)
    }
}
