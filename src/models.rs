use diesel::{sql_types::Jsonb, QueryableByName};
use serde_json::{Map, Value};

use crate::schema::ID_COLUMN;

/// One row as a flat JSON object, keyed by column name.
pub type Record = Map<String, Value>;

/// Sender role stamped on messages appended through the HR inbox.
pub const HR_SENDER: &str = "hr";

#[derive(Debug, QueryableByName)]
pub struct JsonRow {
    #[diesel(sql_type = Jsonb)]
    pub record: Value,
}

impl JsonRow {
    pub fn into_record(self) -> Option<Record> {
        match self.record {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

pub fn record_id(record: &Record) -> Option<i64> {
    record.get(ID_COLUMN).and_then(Value::as_i64)
}
