use serde_json::Value;

use crate::models::Record;

pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug)]
pub struct SortOrder {
    pub column: &'static str,
    pub direction: Direction,
}

/// A foreign key from one table to its parent, exposed as
/// `GET /<resource>/<segment>/:id`.
#[derive(Debug)]
pub struct Relation {
    pub segment: &'static str,
    pub column: &'static str,
    pub parent: &'static str,
}

/// Everything the generic controller and the stores need to know about one
/// table. `id` and `created_at` are owned by storage and never writable.
#[derive(Debug)]
pub struct EntitySchema {
    pub label: &'static str,
    pub plural: &'static str,
    pub table: &'static str,
    pub resource: &'static str,
    pub columns: &'static [&'static str],
    pub required: &'static [&'static str],
    pub unique: &'static [&'static str],
    /// Hashed before they are written, stripped before rows leave the API.
    pub secrets: &'static [&'static str],
    pub relations: &'static [&'static Relation],
    pub order: SortOrder,
}

impl EntitySchema {
    /// Projects a request body onto the writable columns. Unknown keys are
    /// dropped and missing columns become `null`, so every write overwrites
    /// the full column set.
    pub fn writable_fields(&self, body: &Record) -> Record {
        self.columns
            .iter()
            .map(|column| {
                let value = body.get(*column).cloned().unwrap_or(Value::Null);
                (column.to_string(), value)
            })
            .collect()
    }

    pub fn present(&self, mut row: Record) -> Value {
        for secret in self.secrets {
            row.remove(*secret);
        }
        Value::Object(row)
    }

    pub fn is_secret(&self, column: &str) -> bool {
        self.secrets.iter().any(|secret| *secret == column)
    }

    pub fn title(&self) -> String {
        let mut chars = self.label.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

pub static JOB_APPLICATIONS: Relation = Relation {
    segment: "job",
    column: "job_id",
    parent: "jobs",
};

pub static APPLICATION_INTERVIEWS: Relation = Relation {
    segment: "application",
    column: "application_id",
    parent: "applications",
};

pub static CANDIDATE_CONVERSATIONS: Relation = Relation {
    segment: "candidate",
    column: "candidate_id",
    parent: "candidates",
};

pub static CONVERSATION_MESSAGES: Relation = Relation {
    segment: "conversation",
    column: "conversation_id",
    parent: "conversations",
};

const NEWEST_FIRST: SortOrder = SortOrder {
    column: ID_COLUMN,
    direction: Direction::Desc,
};

pub static JOBS: EntitySchema = EntitySchema {
    label: "job",
    plural: "jobs",
    table: "jobs",
    resource: "/jobs",
    columns: &[
        "title",
        "employer",
        "location",
        "type",
        "status",
        "salary",
        "description",
        "requirements",
    ],
    required: &["title"],
    unique: &[],
    secrets: &[],
    relations: &[],
    order: NEWEST_FIRST,
};

pub static EMPLOYERS: EntitySchema = EntitySchema {
    label: "employer",
    plural: "employers",
    table: "employers",
    resource: "/employers",
    columns: &["name", "email", "phone", "company", "location", "status"],
    required: &["name"],
    unique: &[],
    secrets: &[],
    relations: &[],
    order: NEWEST_FIRST,
};

pub static CANDIDATES: EntitySchema = EntitySchema {
    label: "candidate",
    plural: "candidates",
    table: "candidates",
    resource: "/candidates",
    columns: &["name", "email", "phone", "position", "experience", "status"],
    required: &["name"],
    unique: &[],
    secrets: &[],
    relations: &[],
    order: NEWEST_FIRST,
};

pub static APPLICATIONS: EntitySchema = EntitySchema {
    label: "application",
    plural: "applications",
    table: "applications",
    resource: "/applications",
    columns: &[
        "job_id",
        "candidate_name",
        "email",
        "phone",
        "resume",
        "cover_letter",
        "status",
    ],
    required: &["job_id"],
    unique: &[],
    secrets: &[],
    relations: &[&JOB_APPLICATIONS],
    order: NEWEST_FIRST,
};

pub static INTERVIEWS: EntitySchema = EntitySchema {
    label: "interview",
    plural: "interviews",
    table: "interviews",
    resource: "/interviews",
    columns: &[
        "application_id",
        "candidate_name",
        "interviewer",
        "scheduled_at",
        "mode",
        "location",
        "status",
        "notes",
    ],
    required: &["application_id"],
    unique: &[],
    secrets: &[],
    relations: &[&APPLICATION_INTERVIEWS],
    order: NEWEST_FIRST,
};

pub static CONVERSATIONS: EntitySchema = EntitySchema {
    label: "conversation",
    plural: "conversations",
    table: "conversations",
    resource: "/conversations",
    columns: &["candidate_id", "subject"],
    required: &["candidate_id"],
    unique: &[],
    secrets: &[],
    relations: &[&CANDIDATE_CONVERSATIONS],
    order: NEWEST_FIRST,
};

pub static MESSAGES: EntitySchema = EntitySchema {
    label: "message",
    plural: "messages",
    table: "messages",
    resource: "/messages",
    columns: &["conversation_id", "sender", "message"],
    required: &["conversation_id", "sender", "message"],
    unique: &[],
    secrets: &[],
    relations: &[&CONVERSATION_MESSAGES],
    // threads read top to bottom
    order: SortOrder {
        column: CREATED_AT_COLUMN,
        direction: Direction::Asc,
    },
};

pub static PACKAGES: EntitySchema = EntitySchema {
    label: "package",
    plural: "packages",
    table: "packages",
    resource: "/packages",
    columns: &["name", "price", "duration", "features", "status"],
    required: &["name"],
    unique: &[],
    secrets: &[],
    relations: &[],
    order: NEWEST_FIRST,
};

pub static HR_ACCOUNTS: EntitySchema = EntitySchema {
    label: "HR account",
    plural: "HR accounts",
    table: "hr_accounts",
    resource: "/hr-accounts",
    columns: &["email", "password", "name"],
    required: &["email", "password"],
    unique: &["email"],
    secrets: &["password"],
    relations: &[],
    order: NEWEST_FIRST,
};

pub static ALL: [&EntitySchema; 9] = [
    &JOBS,
    &EMPLOYERS,
    &CANDIDATES,
    &APPLICATIONS,
    &INTERVIEWS,
    &CONVERSATIONS,
    &MESSAGES,
    &PACKAGES,
    &HR_ACCOUNTS,
];

/// Resources served entirely by the generic controller.
pub static STANDARD_RESOURCES: [&EntitySchema; 6] = [
    &JOBS,
    &EMPLOYERS,
    &CANDIDATES,
    &APPLICATIONS,
    &INTERVIEWS,
    &PACKAGES,
];
