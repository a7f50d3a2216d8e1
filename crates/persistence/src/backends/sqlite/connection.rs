//! Record operations on a pooled SQLite connection.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::PooledConnection;
use rusqlite::types::Value as SqlValue;
use rusqlite::{ErrorCode, OptionalExtension, params, params_from_iter};
use serde_json::Value;

use crate::core::{IsolationConnection, OwnerReassignment, RecordOwnership};
use crate::error::{BackendError, RecordError, StorageError, StorageResult, ValidationError};
use crate::tenant::{TenantId, TenantScope};
use crate::types::{Predicate, RecordQuery, StoredRecord};

use super::backend::BACKEND_NAME;
use super::manager::{ScopedConnectionManager, scope_rows};

/// Row visibility under the connection's isolation scope.
///
/// Appended to every read, update and delete so the store itself refuses
/// rows the active scope does not cover. With no scope row set, nothing is
/// visible.
const SCOPE_FILTER: &str = "EXISTS (SELECT 1 FROM temp.isolation_scope s \
     WHERE s.privileged = 1 OR s.tenant_id = records.tenant_id)";

const RECORD_COLUMNS: &str =
    "records.collection, records.id, records.tenant_id, records.version, \
     records.data, records.created_at, records.updated_at";

type RecordRow = (String, String, i64, i64, String, String, String);

fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: BACKEND_NAME.to_string(),
        message,
        source: None,
    })
}

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

/// A pooled SQLite connection with its isolation filter.
pub struct SqliteConnection {
    conn: PooledConnection<ScopedConnectionManager>,
}

impl Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection").finish()
    }
}

impl SqliteConnection {
    pub(crate) fn new(conn: PooledConnection<ScopedConnectionManager>) -> Self {
        Self { conn }
    }

    fn read_scope(&self) -> StorageResult<Option<TenantScope>> {
        let row: Option<(Option<i64>, i64)> = self
            .conn
            .query_row(
                "SELECT tenant_id, privileged FROM temp.isolation_scope LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((_, 1)) => Ok(Some(TenantScope::Privileged)),
            Some((Some(tenant_id), _)) => TenantId::new(tenant_id)
                .map(|id| Some(TenantScope::Tenant(id)))
                .map_err(|e| internal_error(format!("corrupt isolation scope: {}", e))),
            Some((None, _)) => Err(internal_error(
                "corrupt isolation scope: tenant id missing".to_string(),
            )),
        }
    }
}

#[async_trait]
impl IsolationConnection for SqliteConnection {
    fn enable_filter(&mut self, scope: TenantScope) -> StorageResult<()> {
        if let Some(active) = self.read_scope()? {
            return Err(BackendError::StaleSession {
                backend_name: BACKEND_NAME.to_string(),
                active,
            }
            .into());
        }

        let (tenant_id, privileged) = match scope {
            TenantScope::Tenant(id) => (Some(id.as_i64()), 0),
            TenantScope::Privileged => (None, 1),
        };
        self.conn.execute(
            "INSERT INTO temp.isolation_scope (tenant_id, privileged) VALUES (?1, ?2)",
            params![tenant_id, privileged],
        )?;
        Ok(())
    }

    fn disable_filter(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM temp.isolation_scope", [])?;
        let remaining = scope_rows(&self.conn)?;
        if remaining != 0 {
            return Err(internal_error(format!(
                "{} isolation scope row(s) survived teardown",
                remaining
            )));
        }
        Ok(())
    }

    fn active_filter(&self) -> StorageResult<Option<TenantScope>> {
        self.read_scope()
    }

    async fn find(&mut self, query: &RecordQuery) -> StorageResult<Vec<StoredRecord>> {
        let (where_clause, mut values) = build_where(query)?;
        let mut sql = format!(
            "SELECT {} FROM records WHERE {} ORDER BY records.id",
            RECORD_COLUMNS, where_clause
        );
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(SqlValue::Integer(query.limit().map_or(-1, i64::from)));
        values.push(SqlValue::Integer(i64::from(query.offset())));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<RecordRow>, _>>()?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn count(&mut self, query: &RecordQuery) -> StorageResult<u64> {
        let (where_clause, values) = build_where(query)?;
        let sql = format!("SELECT COUNT(*) FROM records WHERE {}", where_clause);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn ownership(
        &mut self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<RecordOwnership>> {
        let row: Option<(i64, i64)> = self
            .conn
            .query_row(
                "SELECT tenant_id, version FROM records WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(tenant_id, version)| {
            let owner = TenantId::new(tenant_id)
                .map_err(|e| internal_error(format!("invalid stored owner: {}", e)))?;
            Ok(RecordOwnership {
                owner,
                version: version as u64,
            })
        })
        .transpose()
    }

    async fn insert(&mut self, record: &StoredRecord) -> StorageResult<()> {
        let data = serde_json::to_string(record.data())
            .map_err(|e| serialization_error(format!("Failed to serialize record: {}", e)))?;

        let result = self.conn.execute(
            "INSERT INTO records (collection, id, tenant_id, version, data, created_at, updated_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
             WHERE EXISTS (SELECT 1 FROM temp.isolation_scope s
                           WHERE s.privileged = 1 OR s.tenant_id = ?3)",
            params![
                record.collection(),
                record.id(),
                record.tenant_id().as_i64(),
                record.version() as i64,
                data,
                record.created_at().to_rfc3339(),
                record.updated_at().to_rfc3339(),
            ],
        );

        match result {
            Ok(0) => Err(filter_rejected("insert")),
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(RecordError::AlreadyExists {
                    collection: record.collection().to_string(),
                    id: record.id().to_string(),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(
        &mut self,
        record: &StoredRecord,
        expected_version: u64,
    ) -> StorageResult<bool> {
        let data = serde_json::to_string(record.data())
            .map_err(|e| serialization_error(format!("Failed to serialize record: {}", e)))?;

        let sql = format!(
            "UPDATE records SET version = ?1, data = ?2, updated_at = ?3
             WHERE collection = ?4 AND id = ?5 AND tenant_id = ?6 AND version = ?7 AND {}",
            SCOPE_FILTER
        );
        let changed = self.conn.execute(
            &sql,
            params![
                record.version() as i64,
                data,
                record.updated_at().to_rfc3339(),
                record.collection(),
                record.id(),
                record.tenant_id().as_i64(),
                expected_version as i64,
            ],
        )?;
        Ok(changed == 1)
    }

    async fn remove(&mut self, collection: &str, id: &str, owner: TenantId) -> StorageResult<bool> {
        let sql = format!(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2 AND tenant_id = ?3 AND {}",
            SCOPE_FILTER
        );
        let removed = self
            .conn
            .execute(&sql, params![collection, id, owner.as_i64()])?;
        Ok(removed == 1)
    }

    async fn reassign(&mut self, change: &OwnerReassignment) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;

        let moved = tx.execute(
            "UPDATE records SET tenant_id = ?1, version = version + 1, updated_at = ?2
             WHERE collection = ?3 AND id = ?4 AND tenant_id = ?5
               AND EXISTS (SELECT 1 FROM temp.isolation_scope s WHERE s.privileged = 1)",
            params![
                change.to.as_i64(),
                change.at.to_rfc3339(),
                change.collection,
                change.id,
                change.from.as_i64(),
            ],
        )?;
        if moved != 1 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO owner_reassignments
                (collection, id, from_tenant, to_tenant, actor, reassigned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                change.collection,
                change.id,
                change.from.as_i64(),
                change.to.as_i64(),
                change.actor,
                change.at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }
}

/// Translates a query into a WHERE clause with positional parameters.
///
/// The scope filter is always the last conjunct.
fn build_where(query: &RecordQuery) -> StorageResult<(String, Vec<SqlValue>)> {
    let mut clauses = vec!["records.collection = ?".to_string()];
    let mut values = vec![SqlValue::Text(query.collection().to_string())];

    for predicate in query.predicates() {
        match predicate {
            Predicate::Id(id) => {
                clauses.push("records.id = ?".to_string());
                values.push(SqlValue::Text(id.clone()));
            }
            Predicate::Owner(owner) => {
                clauses.push("records.tenant_id = ?".to_string());
                values.push(SqlValue::Integer(owner.as_i64()));
            }
            Predicate::FieldEquals { field, value } => {
                if field.is_empty()
                    || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(ValidationError::InvalidField {
                        field: field.clone(),
                    }
                    .into());
                }
                let path = SqlValue::Text(format!("$.{}", field));
                match json_to_sql(value) {
                    Some(bound) => {
                        clauses.push("json_extract(records.data, ?) = ?".to_string());
                        values.push(path);
                        values.push(bound);
                    }
                    None => {
                        clauses.push("json_extract(records.data, ?) IS NULL".to_string());
                        values.push(path);
                    }
                }
            }
        }
    }

    clauses.push(SCOPE_FILTER.to_string());
    Ok((clauses.join(" AND "), values))
}

/// Maps a JSON value to what `json_extract` yields for it.
fn json_to_sql(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real),
        },
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Some(SqlValue::Text(value.to_string())),
    }
}

fn record_from_row(row: RecordRow) -> StorageResult<StoredRecord> {
    let (collection, id, tenant_id, version, data, created_at, updated_at) = row;
    let tenant_id = TenantId::new(tenant_id)
        .map_err(|e| internal_error(format!("invalid stored owner: {}", e)))?;
    let data: Value = serde_json::from_str(&data)
        .map_err(|e| serialization_error(format!("Failed to deserialize record: {}", e)))?;

    Ok(StoredRecord::from_storage(
        collection,
        id,
        tenant_id,
        version as u64,
        data,
        parse_timestamp(&created_at)?,
        parse_timestamp(&updated_at)?,
    ))
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| internal_error(format!("invalid timestamp '{}': {}", value, e)))
}

fn filter_rejected(operation: &str) -> StorageError {
    BackendError::FilterRejected {
        backend_name: BACKEND_NAME.to_string(),
        operation: operation.to_string(),
    }
    .into()
}
