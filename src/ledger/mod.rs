//! Persistent ledger — append-only table of submissions and their outcomes.
//!
//! Column layout (order matters for row exports): created_at, submitter,
//! operator, location, media_token, status, description, moderator_comment.

pub mod libsql_ledger;
pub mod migrations;

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::moderation::model::{NewSubmission, RowId, Submission, SubmissionId, SubmissionStatus};

pub use libsql_ledger::LibSqlLedger;

/// Ledger cells the moderation flow writes after a row is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Status,
    ModeratorComment,
    /// Public-channel publish outcome: `1` published, `0` failed.
    Published,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::ModeratorComment => "moderator_comment",
            Self::Published => "published",
        }
    }
}

/// Backend-agnostic ledger trait.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Append a new pending row. Returns the stored submission with its row id.
    async fn append_row(&self, submission: &NewSubmission) -> Result<Submission, DatabaseError>;

    /// Find the first row carrying a provider media token.
    async fn find_row_by_media_token(&self, token: &str) -> Result<Option<RowId>, DatabaseError>;

    /// Overwrite one cell of a row.
    async fn update_cell(&self, row: RowId, column: Column, value: &str)
    -> Result<(), DatabaseError>;

    /// Number of rows recorded for a submitter.
    async fn count_rows_by_submitter(&self, submitter_id: i64) -> Result<u64, DatabaseError>;

    /// Read one row.
    async fn get_row(&self, row: RowId) -> Result<Option<Submission>, DatabaseError>;

    /// Read the row recorded for a submission id.
    async fn find_by_id(&self, id: SubmissionId) -> Result<Option<Submission>, DatabaseError>;

    /// All rows with the given status, oldest first.
    async fn rows_with_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, DatabaseError>;

    /// Approved rows whose public-channel publish has not succeeded.
    async fn unpublished_approved(&self) -> Result<Vec<Submission>, DatabaseError>;

    /// Write a status, and the comment first when there is one, so a
    /// failure part-way never leaves a terminal status without its reason.
    async fn record_decision(
        &self,
        row: RowId,
        status: SubmissionStatus,
        comment: Option<&str>,
    ) -> Result<(), DatabaseError> {
        if let Some(comment) = comment {
            self.update_cell(row, Column::ModeratorComment, comment).await?;
        }
        self.update_cell(row, Column::Status, status.as_str()).await
    }

    /// Record the public-channel publish outcome of a row.
    async fn record_published(&self, row: RowId, published: bool) -> Result<(), DatabaseError> {
        self.update_cell(row, Column::Published, if published { "1" } else { "0" })
            .await
    }
}
