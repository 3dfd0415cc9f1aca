//! Submission data model — ids, statuses and the moderated record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channels::Media;

/// Direct index of a submission's row in the ledger.
pub type RowId = i64;

/// Unique submission identifier; the join key between the registry,
/// moderator buttons and the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SubmissionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Moderation status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Waiting for a moderator.
    Pending,
    /// Approved and (to be) published.
    Approved,
    /// Rejected with a moderator comment.
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown submission status: {other}")),
        }
    }
}

/// A completed complaint, before it has a ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub id: SubmissionId,
    /// Chat id of the reporting user.
    pub submitter_id: i64,
    /// Username or first name, as shown to moderators and in the ledger.
    pub submitter_name: String,
    pub operator: String,
    pub location: String,
    pub media: Media,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A complaint recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub row: RowId,
    pub submitter_id: i64,
    pub submitter_name: String,
    pub operator: String,
    pub location: String,
    pub media: Media,
    pub description: String,
    pub moderator_comment: Option<String>,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Attach a freshly appended ledger row to a new submission.
    pub fn recorded(new: NewSubmission, row: RowId) -> Self {
        Self {
            id: new.id,
            row,
            submitter_id: new.submitter_id,
            submitter_name: new.submitter_name,
            operator: new.operator,
            location: new.location,
            media: new.media,
            description: new.description,
            moderator_comment: None,
            status: SubmissionStatus::Pending,
            created_at: new.created_at,
        }
    }
}
