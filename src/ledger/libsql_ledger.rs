//! libSQL ledger backend — async `Ledger` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::channels::{Media, MediaKind};
use crate::error::DatabaseError;
use crate::moderation::model::{NewSubmission, RowId, Submission, SubmissionId, SubmissionStatus};

use super::{Column, Ledger, migrations};

/// libSQL ledger backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlLedger {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlLedger {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let ledger = Self::from_database(db)?;
        migrations::run_migrations(&ledger.conn).await?;
        info!(path = %path.display(), "Ledger opened");
        Ok(ledger)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let ledger = Self::from_database(db)?;
        migrations::run_migrations(&ledger.conn).await?;
        Ok(ledger)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_submissions(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        context: &str,
    ) -> Result<Vec<Submission>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{context}: {e}")))?;

        let mut submissions = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_submission(&row) {
                Ok(submission) => submissions.push(submission),
                Err(e) => {
                    warn!("Skipping ledger row: {e}");
                }
            }
        }
        Ok(submissions)
    }
}

// ── Helper functions ────────────────────────────────────────────────

const SUBMISSION_COLUMNS: &str = "row_id, id, created_at, submitter, submitter_chat_id, operator, \
     location, media_token, media_kind, status, description, moderator_comment";

/// Parse an RFC 3339 datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Map a libsql Row to a Submission.
///
/// Column order matches SUBMISSION_COLUMNS.
fn row_to_submission(row: &libsql::Row) -> Result<Submission, DatabaseError> {
    let get_text = |i: i32| -> Result<String, DatabaseError> {
        row.get::<String>(i)
            .map_err(|e| DatabaseError::Query(format!("column {i}: {e}")))
    };

    let row_id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("row_id: {e}")))?;
    let id = get_text(1)?
        .parse()
        .map_err(|e| DatabaseError::Query(format!("row {row_id}: invalid id: {e}")))?;
    let submitter_id: i64 = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("submitter_chat_id: {e}")))?;
    let kind: MediaKind = get_text(8)?
        .parse()
        .map_err(|e| DatabaseError::Query(format!("row {row_id}: {e}")))?;
    let status: SubmissionStatus = get_text(9)?
        .parse()
        .map_err(|e| DatabaseError::Query(format!("row {row_id}: {e}")))?;

    Ok(Submission {
        id,
        row: row_id,
        submitter_id,
        submitter_name: get_text(3)?,
        operator: get_text(5)?,
        location: get_text(6)?,
        media: Media {
            token: get_text(7)?,
            kind,
        },
        description: get_text(10)?,
        moderator_comment: row.get::<String>(11).ok(),
        status,
        created_at: parse_datetime(&get_text(2)?),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Ledger for LibSqlLedger {
    async fn append_row(&self, submission: &NewSubmission) -> Result<Submission, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let mut rows = self
            .conn()
            .query(
                "INSERT INTO submissions (created_at, submitter, operator, location, media_token,
                    status, description, id, submitter_chat_id, media_kind, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?8, ?9, ?10)
                 RETURNING row_id",
                params![
                    submission.created_at.to_rfc3339(),
                    submission.submitter_name.clone(),
                    submission.operator.clone(),
                    submission.location.clone(),
                    submission.media.token.clone(),
                    submission.description.clone(),
                    submission.id.to_string(),
                    submission.submitter_id,
                    submission.media.kind.as_str(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_row: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("append_row: {e}")))?
            .ok_or_else(|| DatabaseError::Query("append_row: no row id returned".into()))?;
        let row_id: RowId = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("append_row: {e}")))?;

        debug!(submission_id = %submission.id, row = row_id, "Ledger row appended");
        Ok(Submission::recorded(submission.clone(), row_id))
    }

    async fn find_row_by_media_token(&self, token: &str) -> Result<Option<RowId>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT row_id FROM submissions WHERE media_token = ?1 ORDER BY row_id ASC LIMIT 1",
                params![token],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_row_by_media_token: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get(0).map_err(|e| {
                DatabaseError::Query(format!("find_row_by_media_token: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_row_by_media_token: {e}"))),
        }
    }

    async fn update_cell(
        &self,
        row: RowId,
        column: Column,
        value: &str,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        // Column names come from the enum, never from input
        let sql = format!(
            "UPDATE submissions SET {} = ?1, updated_at = ?2 WHERE row_id = ?3",
            column.name()
        );
        let changed = self
            .conn()
            .execute(&sql, params![value, now, row])
            .await
            .map_err(|e| DatabaseError::Query(format!("update_cell: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "ledger row".into(),
                id: row.to_string(),
            });
        }

        debug!(row, column = column.name(), "Ledger cell updated");
        Ok(())
    }

    async fn count_rows_by_submitter(&self, submitter_id: i64) -> Result<u64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM submissions WHERE submitter_chat_id = ?1",
                params![submitter_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("count_rows_by_submitter: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).unwrap_or(0);
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(DatabaseError::Query(format!("count_rows_by_submitter: {e}"))),
        }
    }

    async fn get_row(&self, row: RowId) -> Result<Option<Submission>, DatabaseError> {
        let mut found = self
            .query_submissions(
                &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE row_id = ?1"),
                params![row],
                "get_row",
            )
            .await?;
        Ok(found.pop())
    }

    async fn find_by_id(&self, id: SubmissionId) -> Result<Option<Submission>, DatabaseError> {
        let mut found = self
            .query_submissions(
                &format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?1"),
                params![id.to_string()],
                "find_by_id",
            )
            .await?;
        Ok(found.pop())
    }

    async fn rows_with_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, DatabaseError> {
        self.query_submissions(
            &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE status = ?1 ORDER BY row_id ASC"
            ),
            params![status.as_str()],
            "rows_with_status",
        )
        .await
    }

    async fn unpublished_approved(&self) -> Result<Vec<Submission>, DatabaseError> {
        self.query_submissions(
            &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM submissions
                 WHERE status = 'approved' AND (published IS NULL OR published != 1)
                 ORDER BY row_id ASC"
            ),
            (),
            "unpublished_approved",
        )
        .await
    }
}
