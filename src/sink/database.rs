/// Direct Postgres upload
///
/// Inserts weekly records over a plain database connection, one
/// transaction per batch, so a failed batch leaves no partial rows behind.
///
/// Target table shape:
///
/// ```sql
/// CREATE TABLE weekly_demand (
///     id       BIGINT PRIMARY KEY,
///     crop_id  BIGINT NOT NULL,
///     week_no  INTEGER NOT NULL,
///     demand   DOUBLE PRECISION NOT NULL
/// );
/// ```

use postgres::{Client, NoTls};

use super::upload::UploadError;
use super::{BatchSink, SinkError};
use crate::model::WeeklyRecord;

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

pub struct PostgresSink {
    client: Client,
}

impl PostgresSink {
    pub fn connect(database_url: &str) -> Result<Self, UploadError> {
        let client = Client::connect(database_url, NoTls)
            .map_err(|e| UploadError::Client(format!("database connection failed: {}", e)))?;
        Ok(Self { client })
    }
}

impl BatchSink for PostgresSink {
    fn insert_batch(&mut self, table: &str, rows: &[WeeklyRecord]) -> Result<(), SinkError> {
        let sql = insert_statement(table)?;

        let mut tx = self.client.transaction().map_err(db_error)?;
        let stmt = tx.prepare(&sql).map_err(db_error)?;

        for row in rows {
            let id = row.id as i64;
            let week_no = row.week_no as i32;
            tx.execute(&stmt, &[&id, &row.crop_id, &week_no, &row.demand])
                .map_err(db_error)?;
        }

        tx.commit().map_err(db_error)
    }
}

/// Builds the INSERT for `table`, which may be schema-qualified
/// (`schema.table`). Anything but ASCII identifiers is rejected.
pub fn insert_statement(table: &str) -> Result<String, SinkError> {
    if !is_valid_table_name(table) {
        return Err(SinkError::InvalidTable(table.to_string()));
    }
    Ok(format!(
        "INSERT INTO {} (id, crop_id, week_no, demand) VALUES ($1, $2, $3, $4)",
        table
    ))
}

fn is_valid_table_name(table: &str) -> bool {
    let parts: Vec<&str> = table.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn db_error(err: postgres::Error) -> SinkError {
    SinkError::Database(err.to_string())
}
