//! Relational schema
//!
//! Statements are idempotent and run in order on every connect.

pub const CREATE_ENDPOINTS: &str = r#"
CREATE TABLE IF NOT EXISTS endpoints (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    owner       TEXT NOT NULL,
    created_at  TEXT NOT NULL
)
"#;

pub const CREATE_ALGORITHMS: &str = r#"
CREATE TABLE IF NOT EXISTS algorithms (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL,
    code         TEXT NOT NULL,
    version      TEXT NOT NULL,
    owner        TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    endpoint_id  INTEGER NOT NULL REFERENCES endpoints(id) ON DELETE CASCADE
)
"#;

pub const CREATE_ALGORITHM_STATUS: &str = r#"
CREATE TABLE IF NOT EXISTS algorithm_status (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    status        TEXT NOT NULL DEFAULT 'testing'
                  CHECK (status IN ('testing', 'staging', 'production', 'ab_testing')),
    active        INTEGER NOT NULL DEFAULT 0 CHECK (active IN (0, 1)),
    created_by    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    algorithm_id  INTEGER NOT NULL REFERENCES algorithms(id) ON DELETE CASCADE
)
"#;

pub const CREATE_REQUESTS: &str = r#"
CREATE TABLE IF NOT EXISTS requests (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    input_data     TEXT NOT NULL,
    full_response  TEXT NOT NULL,
    response       TEXT NOT NULL,
    feedback       TEXT,
    algorithm_id   INTEGER NOT NULL REFERENCES algorithms(id) ON DELETE CASCADE,
    created_at     TEXT NOT NULL
)
"#;

/// Tables whose `created_at` column is guarded by an update trigger
pub const TIMESTAMPED_TABLES: [&str; 4] = ["endpoints", "algorithms", "algorithm_status", "requests"];

/// Trigger rejecting any change of `created_at` on `table`
pub fn created_at_guard(table: &str) -> String {
    format!(
        "CREATE TRIGGER IF NOT EXISTS {table}_created_at_immutable \
         BEFORE UPDATE OF created_at ON {table} \
         WHEN NEW.created_at IS NOT OLD.created_at \
         BEGIN SELECT RAISE(ABORT, '{table}.created_at is immutable'); END"
    )
}

/// Every statement of the schema, in dependency order
pub fn statements() -> Vec<String> {
    let mut statements: Vec<String> = [
        CREATE_ENDPOINTS,
        CREATE_ALGORITHMS,
        CREATE_ALGORITHM_STATUS,
        CREATE_REQUESTS,
        "CREATE INDEX IF NOT EXISTS idx_algorithms_endpoint ON algorithms(endpoint_id)",
        "CREATE INDEX IF NOT EXISTS idx_status_algorithm ON algorithm_status(algorithm_id)",
        "CREATE INDEX IF NOT EXISTS idx_requests_algorithm ON requests(algorithm_id)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    statements.extend(TIMESTAMPED_TABLES.iter().map(|table| created_at_guard(table)));
    statements
}
