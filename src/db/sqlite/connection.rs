//! SQLite backend and connection.
//!
//! Each resource is a table with an integer primary key and a JSON document
//! column holding the remaining fields. Tables are created on first use.

use std::str::FromStr;

use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};

use super::helpers::{
    DOC_COLUMN, ID_COLUMN, bind_all, build_limit, build_order, build_where, quote_table, row_id,
};
use crate::db::utils::{distinct_values, project_fields};
use crate::db::{
    Backend, Connection, ConnectionConfig, Credentials, DbError, DbResult, Endpoint, FindOptions,
    Record, WriteConcern, is_truthy,
};

/// Relational backend on SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl SqliteBackend {
    pub fn new() -> Self {
        Self
    }
}

fn synchronous_for(write_concern: WriteConcern) -> SqliteSynchronous {
    match write_concern {
        WriteConcern::Unacknowledged => SqliteSynchronous::Off,
        WriteConcern::Acknowledged => SqliteSynchronous::Normal,
        WriteConcern::Journaled => SqliteSynchronous::Full,
    }
}

fn connect_options(config: &ConnectionConfig) -> DbResult<SqliteConnectOptions> {
    let options = match config.endpoint() {
        Endpoint::Url(url) => {
            SqliteConnectOptions::from_str(url).map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?
        }
        Endpoint::Address { database, .. } => SqliteConnectOptions::new().filename(database),
    }
    .create_if_missing(true);

    Ok(match config.write_concern() {
        Some(write_concern) => options.synchronous(synchronous_for(write_concern)),
        None => options,
    })
}

impl Backend for SqliteBackend {
    type Connection = SqliteConnection;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn default_primary_key(&self) -> &'static str {
        ID_COLUMN
    }

    async fn connect(&self, config: &ConnectionConfig) -> DbResult<SqliteConnection> {
        let options = connect_options(config)?;

        // One connection, kept for the life of the pool
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        Ok(SqliteConnection { pool })
    }

    async fn authenticate(
        &self,
        _connection: &SqliteConnection,
        credentials: &Credentials,
    ) -> DbResult<()> {
        Err(DbError::Connection {
            message: format!(
                "sqlite does not support user authentication (user '{}')",
                credentials.user
            ),
        })
    }

    fn to_native_id(&self, raw: &str) -> DbResult<Value> {
        raw.trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| DbError::InvalidIdentifier {
                value: raw.to_string(),
                help: "expected an integer row id".to_string(),
            })
    }
}

/// Open SQLite connection.
#[derive(Debug, Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    /// Direct access to the underlying pool (single connection).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_table(&self, resource: &str) -> DbResult<String> {
        let table = quote_table(resource)?;
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} \
             ({ID_COLUMN} INTEGER PRIMARY KEY AUTOINCREMENT, {DOC_COLUMN} TEXT NOT NULL)"
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::backend("prepare", resource, e))?;
        Ok(table)
    }

    // Document fields without the primary key, serialized for the doc column.
    fn encode_document(
        operation: &'static str,
        resource: &str,
        primary_key: &str,
        mut record: Record,
    ) -> DbResult<(Option<Value>, String)> {
        let id = record.shift_remove(primary_key);
        let doc = serde_json::to_string(&record)
            .map_err(|e| DbError::backend(operation, resource, e))?;
        Ok((id, doc))
    }
}

fn decode_row(row: &SqliteRow, resource: &str, primary_key: &str) -> DbResult<Record> {
    let id: i64 = row
        .try_get(ID_COLUMN)
        .map_err(|e| DbError::backend("decode", resource, e))?;
    let doc: String = row
        .try_get(DOC_COLUMN)
        .map_err(|e| DbError::backend("decode", resource, e))?;
    let fields: Record =
        serde_json::from_str(&doc).map_err(|e| DbError::backend("decode", resource, e))?;

    let mut record = Record::new();
    record.insert(primary_key.to_string(), Value::from(id));
    record.extend(fields);
    Ok(record)
}

impl Connection for SqliteConnection {
    async fn find_one(
        &self,
        resource: &str,
        primary_key: &str,
        query: &Record,
        options: &FindOptions,
    ) -> DbResult<Option<Record>> {
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        let found = self.find_all(resource, primary_key, query, &options).await?;
        Ok(found.into_iter().next())
    }

    async fn find_all(
        &self,
        resource: &str,
        primary_key: &str,
        query: &Record,
        options: &FindOptions,
    ) -> DbResult<Vec<Record>> {
        let table = self.ensure_table(resource).await?;

        let (where_clause, mut binds) = build_where(query, primary_key)?;
        let (order_clause, order_binds) = build_order(options, primary_key);
        let (limit_clause, limit_binds) = build_limit(options);
        binds.extend(order_binds);
        binds.extend(limit_binds);

        let sql = format!(
            "SELECT {}, {} FROM {} {} {} {}",
            ID_COLUMN, DOC_COLUMN, table, where_clause, order_clause, limit_clause
        );
        let rows = bind_all(sqlx::query(&sql), &binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DbError::backend("find", resource, e))?;

        let records = rows
            .iter()
            .map(|row| decode_row(row, resource, primary_key))
            .collect::<DbResult<Vec<Record>>>()?;

        Ok(match &options.fields {
            Some(fields) => records
                .into_iter()
                .map(|r| project_fields(r, fields, primary_key))
                .collect(),
            None => records,
        })
    }

    async fn insert(&self, resource: &str, primary_key: &str, record: Record) -> DbResult<Value> {
        let table = self.ensure_table(resource).await?;
        let (id, doc) = Self::encode_document("insert", resource, primary_key, record)?;
        let explicit_id = match id {
            Some(id) if is_truthy(&id) => Some(row_id(&id)?),
            _ => None,
        };

        let sql = match explicit_id {
            Some(_) => format!(
                "INSERT INTO {} ({}, {}) VALUES (?, ?)",
                table, ID_COLUMN, DOC_COLUMN
            ),
            None => format!("INSERT INTO {} ({}) VALUES (?)", table, DOC_COLUMN),
        };
        let mut statement = sqlx::query(&sql);
        if let Some(id) = explicit_id {
            statement = statement.bind(id);
        }
        let result = statement
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::backend("insert", resource, e))?;

        Ok(Value::from(result.last_insert_rowid()))
    }

    async fn update(
        &self,
        resource: &str,
        primary_key: &str,
        id: &Value,
        record: Record,
    ) -> DbResult<u64> {
        let table = self.ensure_table(resource).await?;
        let id = row_id(id)?;
        let (_, doc) = Self::encode_document("update", resource, primary_key, record)?;

        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            table, DOC_COLUMN, ID_COLUMN
        );
        let result = sqlx::query(&sql)
            .bind(doc)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::backend("update", resource, e))?;

        Ok(result.rows_affected())
    }

    async fn remove(&self, resource: &str, _primary_key: &str, id: &Value) -> DbResult<u64> {
        let table = self.ensure_table(resource).await?;
        let id = row_id(id)?;

        let sql = format!("DELETE FROM {} WHERE {} = ?", table, ID_COLUMN);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::backend("remove", resource, e))?;

        Ok(result.rows_affected())
    }

    async fn distinct(
        &self,
        resource: &str,
        primary_key: &str,
        field: &str,
        query: &Record,
    ) -> DbResult<Vec<Value>> {
        let records = self
            .find_all(resource, primary_key, query, &FindOptions::default())
            .await?;
        Ok(distinct_values(&records, field))
    }
}
