//! SQLite store
//!
//! Foreign keys are enabled on every connection, so cascading deletes and
//! parent checks are carried out by the database. Writes go through a pool
//! holding a single connection, reads through a separate pool. Every write
//! transaction starts with a write statement so it holds the database write
//! lock from its first step.

use std::str::FromStr;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Executor, Row, Sqlite, Transaction};
use tracing::{debug, info};
use validator::Validate;

use common::models::{
    validate_feedback, Algorithm, AlgorithmStatus, Endpoint, NewAlgorithm, NewEndpoint,
    NewRequest, NewStatus, Request, TableCounts,
};
use common::types::{AlgorithmId, EndpointId, RequestId, StatusId};
use registry_config::DatabaseSettings;

use crate::error::{Result, StorageError};
use crate::schema;
use crate::store::RegistryStore;

const ENDPOINT_COLUMNS: &str = "id, name, owner, created_at";
const ALGORITHM_COLUMNS: &str = "id, name, code, version, owner, created_at, endpoint_id";
const STATUS_COLUMNS: &str = "id, status, active, created_by, created_at, algorithm_id";
const REQUEST_COLUMNS: &str =
    "id, input_data, full_response, response, feedback, algorithm_id, created_at";

const SELECT_ENDPOINT: &str = "SELECT id, name, owner, created_at FROM endpoints WHERE id = ?";
const SELECT_ALGORITHM: &str =
    "SELECT id, name, code, version, owner, created_at, endpoint_id FROM algorithms WHERE id = ?";
const SELECT_STATUS: &str = "SELECT id, status, active, created_by, created_at, algorithm_id \
     FROM algorithm_status WHERE id = ?";
const SELECT_REQUEST: &str = "SELECT id, input_data, full_response, response, feedback, \
     algorithm_id, created_at FROM requests WHERE id = ?";

/// Store backed by SQLite connection pools
pub struct SqliteStore {
    /// Pool for reads
    reader: SqlitePool,

    /// Single-connection pool for writes
    writer: SqlitePool,
}

impl SqliteStore {
    /// Opens the database, creating the file and schema when missing
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self> {
        info!("Opening SQLite store at {}", settings.url);

        let in_memory = is_in_memory(&settings.url);

        let mut connect_options = SqliteConnectOptions::from_str(&settings.url)
            .map_err(|e| StorageError::Configuration(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(settings.connect_timeout());

        if !in_memory {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let writer = SqlitePoolOptions::new()
            .acquire_timeout(settings.connect_timeout())
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options.clone())
            .await?;

        create_schema(&writer).await?;

        // Every connection to `:memory:` is a separate database
        let reader = if in_memory {
            writer.clone()
        } else {
            SqlitePoolOptions::new()
                .acquire_timeout(settings.connect_timeout())
                .max_connections(settings.max_connections)
                .connect_with(connect_options)
                .await?
        };

        Ok(Self { reader, writer })
    }

    /// Get a reference to the write pool
    pub fn pool(&self) -> &SqlitePool {
        &self.writer
    }

    /// Close both pools
    pub async fn close(&self) {
        info!("Closing SQLite store");
        self.reader.close().await;
        self.writer.close().await;
    }

    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.writer.begin().await?)
    }
}

#[async_trait]
impl RegistryStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn create_endpoint(&self, input: NewEndpoint) -> Result<Endpoint> {
        input.validate()?;

        let mut tx = self.begin_write().await?;
        let id = sqlx::query("INSERT INTO endpoints (name, owner, created_at) VALUES (?, ?, ?)")
            .bind(&input.name)
            .bind(&input.owner)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from_sqlx)?
            .last_insert_rowid();

        let endpoint = select_endpoint(&mut *tx, EndpointId(id))
            .await?
            .ok_or_else(|| not_found("Endpoint", id))?;
        tx.commit().await?;

        info!("Created endpoint {} ({})", endpoint.name, endpoint.id);
        Ok(endpoint)
    }

    async fn get_endpoint(&self, id: EndpointId) -> Result<Endpoint> {
        select_endpoint(&self.reader, id)
            .await?
            .ok_or_else(|| not_found("Endpoint", id.0))
    }

    async fn find_endpoint_by_name(&self, name: &str) -> Result<Option<Endpoint>> {
        sqlx::query(&format!(
            "SELECT {} FROM endpoints WHERE name = ? ORDER BY id LIMIT 1",
            ENDPOINT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.reader)
        .await?
        .map(|row| endpoint_from_row(&row))
        .transpose()
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        sqlx::query(&format!("SELECT {} FROM endpoints ORDER BY id", ENDPOINT_COLUMNS))
            .fetch_all(&self.reader)
            .await?
            .iter()
            .map(endpoint_from_row)
            .collect()
    }

    async fn update_endpoint(&self, id: EndpointId, input: NewEndpoint) -> Result<Endpoint> {
        input.validate()?;

        let mut tx = self.begin_write().await?;
        let updated = sqlx::query("UPDATE endpoints SET name = ?, owner = ? WHERE id = ?")
            .bind(&input.name)
            .bind(&input.owner)
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from_sqlx)?
            .rows_affected();

        if updated == 0 {
            return Err(not_found("Endpoint", id.0));
        }

        let endpoint = select_endpoint(&mut *tx, id)
            .await?
            .ok_or_else(|| not_found("Endpoint", id.0))?;
        tx.commit().await?;

        Ok(endpoint)
    }

    async fn delete_endpoint(&self, id: EndpointId) -> Result<TableCounts> {
        let mut tx = self.begin_write().await?;

        let requests = sqlx::query(
            "DELETE FROM requests WHERE algorithm_id IN \
             (SELECT id FROM algorithms WHERE endpoint_id = ?)",
        )
        .bind(id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let statuses = sqlx::query(
            "DELETE FROM algorithm_status WHERE algorithm_id IN \
             (SELECT id FROM algorithms WHERE endpoint_id = ?)",
        )
        .bind(id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let algorithms = sqlx::query("DELETE FROM algorithms WHERE endpoint_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let endpoints = sqlx::query("DELETE FROM endpoints WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if endpoints == 0 {
            return Err(not_found("Endpoint", id.0));
        }

        tx.commit().await?;

        Ok(TableCounts {
            endpoints,
            algorithms,
            statuses,
            requests,
        })
    }

    async fn create_algorithm(&self, input: NewAlgorithm) -> Result<Algorithm> {
        input.validate()?;

        let mut tx = self.begin_write().await?;
        let id = sqlx::query(
            "INSERT INTO algorithms (name, code, version, owner, created_at, endpoint_id) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.code)
        .bind(&input.version)
        .bind(&input.owner)
        .bind(Utc::now())
        .bind(input.endpoint_id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| missing_parent(e, "Endpoint", input.endpoint_id.0))?
        .last_insert_rowid();

        let algorithm = select_algorithm(&mut *tx, AlgorithmId(id))
            .await?
            .ok_or_else(|| not_found("Algorithm", id))?;
        tx.commit().await?;

        info!(
            "Created algorithm {} {} ({}) on endpoint {}",
            algorithm.name, algorithm.version, algorithm.id, algorithm.endpoint_id.0
        );
        Ok(algorithm)
    }

    async fn get_algorithm(&self, id: AlgorithmId) -> Result<Algorithm> {
        select_algorithm(&self.reader, id)
            .await?
            .ok_or_else(|| not_found("Algorithm", id.0))
    }

    async fn list_algorithms(&self, endpoint_id: EndpointId) -> Result<Vec<Algorithm>> {
        sqlx::query(&format!(
            "SELECT {} FROM algorithms WHERE endpoint_id = ? ORDER BY id",
            ALGORITHM_COLUMNS
        ))
        .bind(endpoint_id.0)
        .fetch_all(&self.reader)
        .await?
        .iter()
        .map(algorithm_from_row)
        .collect()
    }

    async fn find_algorithm(
        &self,
        endpoint_id: EndpointId,
        name: &str,
        version: &str,
    ) -> Result<Option<Algorithm>> {
        sqlx::query(&format!(
            "SELECT {} FROM algorithms WHERE endpoint_id = ? AND name = ? AND version = ? \
             ORDER BY id LIMIT 1",
            ALGORITHM_COLUMNS
        ))
        .bind(endpoint_id.0)
        .bind(name)
        .bind(version)
        .fetch_optional(&self.reader)
        .await?
        .map(|row| algorithm_from_row(&row))
        .transpose()
    }

    async fn delete_algorithm(&self, id: AlgorithmId) -> Result<TableCounts> {
        let mut tx = self.begin_write().await?;

        let requests = sqlx::query("DELETE FROM requests WHERE algorithm_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let statuses = sqlx::query("DELETE FROM algorithm_status WHERE algorithm_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let algorithms = sqlx::query("DELETE FROM algorithms WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if algorithms == 0 {
            return Err(not_found("Algorithm", id.0));
        }

        tx.commit().await?;

        Ok(TableCounts {
            endpoints: 0,
            algorithms,
            statuses,
            requests,
        })
    }

    async fn create_status(&self, input: NewStatus) -> Result<AlgorithmStatus> {
        input.validate()?;

        let mut tx = self.begin_write().await?;
        let status = insert_status(&mut tx, &input, input.active).await?;
        tx.commit().await?;

        Ok(status)
    }

    async fn activate_status(&self, input: NewStatus) -> Result<AlgorithmStatus> {
        input.validate()?;

        let mut tx = self.begin_write().await?;
        let deactivated =
            sqlx::query("UPDATE algorithm_status SET active = 0 WHERE algorithm_id = ? AND active = 1")
                .bind(input.algorithm_id.0)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        let status = insert_status(&mut tx, &input, true).await?;
        tx.commit().await?;

        debug!(
            "Activated status {} for algorithm {} ({} deactivated)",
            status.status, status.algorithm_id.0, deactivated
        );
        Ok(status)
    }

    async fn list_statuses(&self, algorithm_id: AlgorithmId) -> Result<Vec<AlgorithmStatus>> {
        sqlx::query(&format!(
            "SELECT {} FROM algorithm_status WHERE algorithm_id = ? ORDER BY created_at, id",
            STATUS_COLUMNS
        ))
        .bind(algorithm_id.0)
        .fetch_all(&self.reader)
        .await?
        .iter()
        .map(status_from_row)
        .collect()
    }

    async fn active_statuses(&self, algorithm_id: AlgorithmId) -> Result<Vec<AlgorithmStatus>> {
        sqlx::query(&format!(
            "SELECT {} FROM algorithm_status WHERE algorithm_id = ? AND active = 1 \
             ORDER BY created_at, id",
            STATUS_COLUMNS
        ))
        .bind(algorithm_id.0)
        .fetch_all(&self.reader)
        .await?
        .iter()
        .map(status_from_row)
        .collect()
    }

    async fn create_request(&self, input: NewRequest) -> Result<Request> {
        input.validate()?;

        let mut tx = self.begin_write().await?;
        let id = sqlx::query(
            "INSERT INTO requests (input_data, full_response, response, feedback, algorithm_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.input_data)
        .bind(&input.full_response)
        .bind(&input.response)
        .bind(&input.feedback)
        .bind(input.algorithm_id.0)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| missing_parent(e, "Algorithm", input.algorithm_id.0))?
        .last_insert_rowid();

        let request = select_request(&mut *tx, RequestId(id))
            .await?
            .ok_or_else(|| not_found("Request", id))?;
        tx.commit().await?;

        Ok(request)
    }

    async fn get_request(&self, id: RequestId) -> Result<Request> {
        select_request(&self.reader, id)
            .await?
            .ok_or_else(|| not_found("Request", id.0))
    }

    async fn list_requests(&self, algorithm_id: AlgorithmId) -> Result<Vec<Request>> {
        sqlx::query(&format!(
            "SELECT {} FROM requests WHERE algorithm_id = ? ORDER BY created_at, id",
            REQUEST_COLUMNS
        ))
        .bind(algorithm_id.0)
        .fetch_all(&self.reader)
        .await?
        .iter()
        .map(request_from_row)
        .collect()
    }

    async fn record_feedback(&self, id: RequestId, feedback: &str) -> Result<Request> {
        validate_feedback(feedback)?;

        let mut tx = self.begin_write().await?;
        let updated = sqlx::query("UPDATE requests SET feedback = ? WHERE id = ?")
            .bind(feedback)
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from_sqlx)?
            .rows_affected();

        if updated == 0 {
            return Err(not_found("Request", id.0));
        }

        let request = select_request(&mut *tx, id)
            .await?
            .ok_or_else(|| not_found("Request", id.0))?;
        tx.commit().await?;

        Ok(request)
    }

    async fn counts(&self) -> Result<TableCounts> {
        let row = sqlx::query(
            "SELECT \
               (SELECT COUNT(*) FROM endpoints) AS endpoints, \
               (SELECT COUNT(*) FROM algorithms) AS algorithms, \
               (SELECT COUNT(*) FROM algorithm_status) AS statuses, \
               (SELECT COUNT(*) FROM requests) AS requests",
        )
        .fetch_one(&self.reader)
        .await?;

        Ok(TableCounts {
            endpoints: row.try_get::<i64, _>("endpoints")? as u64,
            algorithms: row.try_get::<i64, _>("algorithms")? as u64,
            statuses: row.try_get::<i64, _>("statuses")? as u64,
            requests: row.try_get::<i64, _>("requests")? as u64,
        })
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in schema::statements() {
        sqlx::query(&statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    debug!("Schema ready");
    Ok(())
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn not_found(kind: &str, id: i64) -> StorageError {
    StorageError::NotFound(format!("{} not found: {}", kind, id))
}

/// Reports a rejected parent reference as the missing parent row
fn missing_parent(err: sqlx::Error, parent: &str, parent_id: i64) -> StorageError {
    match StorageError::from_sqlx(err) {
        StorageError::ForeignKey(_) => not_found(parent, parent_id),
        other => other,
    }
}

async fn insert_status(
    tx: &mut Transaction<'_, Sqlite>,
    input: &NewStatus,
    active: bool,
) -> Result<AlgorithmStatus> {
    let id = sqlx::query(
        "INSERT INTO algorithm_status (status, active, created_by, created_at, algorithm_id) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(input.status.as_str())
    .bind(active)
    .bind(&input.created_by)
    .bind(Utc::now())
    .bind(input.algorithm_id.0)
    .execute(&mut **tx)
    .await
    .map_err(|e| missing_parent(e, "Algorithm", input.algorithm_id.0))?
    .last_insert_rowid();

    sqlx::query(SELECT_STATUS)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .map(|row| status_from_row(&row))
        .transpose()?
        .ok_or_else(|| not_found("Status", id))
}

async fn select_endpoint<'e, E>(executor: E, id: EndpointId) -> Result<Option<Endpoint>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(SELECT_ENDPOINT)
        .bind(id.0)
        .fetch_optional(executor)
        .await?
        .map(|row| endpoint_from_row(&row))
        .transpose()
}

async fn select_algorithm<'e, E>(executor: E, id: AlgorithmId) -> Result<Option<Algorithm>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(SELECT_ALGORITHM)
        .bind(id.0)
        .fetch_optional(executor)
        .await?
        .map(|row| algorithm_from_row(&row))
        .transpose()
}

async fn select_request<'e, E>(executor: E, id: RequestId) -> Result<Option<Request>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(SELECT_REQUEST)
        .bind(id.0)
        .fetch_optional(executor)
        .await?
        .map(|row| request_from_row(&row))
        .transpose()
}

fn endpoint_from_row(row: &SqliteRow) -> Result<Endpoint> {
    Ok(Endpoint {
        id: EndpointId(row.try_get("id")?),
        name: row.try_get("name")?,
        owner: row.try_get("owner")?,
        created_at: row.try_get("created_at")?,
    })
}

fn algorithm_from_row(row: &SqliteRow) -> Result<Algorithm> {
    Ok(Algorithm {
        id: AlgorithmId(row.try_get("id")?),
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        version: row.try_get("version")?,
        owner: row.try_get("owner")?,
        created_at: row.try_get("created_at")?,
        endpoint_id: EndpointId(row.try_get("endpoint_id")?),
    })
}

fn status_from_row(row: &SqliteRow) -> Result<AlgorithmStatus> {
    let status: String = row.try_get("status")?;
    Ok(AlgorithmStatus {
        id: StatusId(row.try_get("id")?),
        status: status.parse()?,
        active: row.try_get("active")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        algorithm_id: AlgorithmId(row.try_get("algorithm_id")?),
    })
}

fn request_from_row(row: &SqliteRow) -> Result<Request> {
    Ok(Request {
        id: RequestId(row.try_get("id")?),
        input_data: row.try_get("input_data")?,
        full_response: row.try_get("full_response")?,
        response: row.try_get("response")?,
        feedback: row.try_get("feedback")?,
        created_at: row.try_get("created_at")?,
        algorithm_id: AlgorithmId(row.try_get("algorithm_id")?),
    })
}
