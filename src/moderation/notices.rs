//! Moderator, submitter and public-channel texts for the moderation flow.

use crate::channels::{Controls, InlineButton};

use super::model::{Submission, SubmissionId, SubmissionStatus};
use super::payload::{ButtonPayload, ModerationAction};

pub const UNAUTHORIZED: &str = "⛔ Only moderators can do that.";
pub const ALREADY_HANDLED: &str = "This complaint has already been handled.";
pub const INVALID_ACTION: &str = "Unknown action.";
pub const CONFIRM_REJECT: &str = "Reject this complaint?";
pub const REASON_PROMPT: &str =
    "✏️ Send the reason for rejecting this complaint. It will be forwarded to the author.";
pub const DECISION_FAILED: &str = "⚠️ Could not record the decision, please try again.";
pub const REASON_FAILED: &str = "⚠️ Could not record the rejection, please send the reason again.";
pub const REJECT_ABANDONED: &str = "The previous rejection was left without a reason.";
pub const APPROVED_ACK: &str = "Approved";
pub const REJECTED_ACK: &str = "❌ Rejected. The author has been notified.";
pub const SUBMITTER_APPROVED: &str = "✅ Your complaint was approved. Thank you for helping!";

fn button(label: &str, action: ModerationAction, id: SubmissionId) -> InlineButton {
    InlineButton::new(label, ButtonPayload::new(action, id).encode())
}

/// Summary sent to every moderator ahead of the media.
pub fn summary(submission: &Submission) -> String {
    format!(
        "🆕 New complaint from @{}\n\nOperator: {}\nLocation: {}\nDescription: {}",
        submission.submitter_name,
        submission.operator,
        submission.location,
        submission.description
    )
}

/// Approve / reject buttons under a summary.
pub fn decision_controls(id: SubmissionId) -> Controls {
    Controls::Inline(vec![vec![
        button("✅ Approve", ModerationAction::Approve, id),
        button("❌ Reject", ModerationAction::Reject, id),
    ]])
}

/// Second step of a reject.
pub fn confirm_reject_controls(id: SubmissionId) -> Controls {
    Controls::Inline(vec![vec![
        button("Yes, reject", ModerationAction::RejectConfirm, id),
        button("🔙 Back", ModerationAction::RejectCancel, id),
    ]])
}

/// Caption for the public channel post.
pub fn public_caption(submission: &Submission) -> String {
    format!(
        "🚨 Confirmed parking violation\n\nOperator: {}\nLocation: {}\n\n{}",
        submission.operator, submission.location, submission.description
    )
}

/// Control message after an approval.
pub fn approved(submission: &Submission, published: bool) -> String {
    let outcome = if published {
        "✅ Approved and published"
    } else {
        "✅ Approved, publishing failed (will be retried on restart)"
    };
    format!("{}\n\n{outcome}", summary(submission))
}

/// Control message after a rejection.
pub fn rejected(submission: &Submission, reason: &str) -> String {
    format!("{}\n\n❌ Rejected: {reason}", summary(submission))
}

/// Control message for a submission someone else already decided.
pub fn resolution(submission: &Submission) -> String {
    match submission.status {
        SubmissionStatus::Approved => format!("{}\n\n✅ Approved", summary(submission)),
        SubmissionStatus::Rejected => {
            rejected(submission, submission.moderator_comment.as_deref().unwrap_or_default())
        }
        SubmissionStatus::Pending => summary(submission),
    }
}

pub fn submitter_rejected(reason: &str) -> String {
    format!("❌ Your complaint was rejected.\nReason: {reason}")
}

/// Alert sent to every moderator when a post could not be published.
pub fn publish_failed(submission: &Submission) -> String {
    format!(
        "⚠️ Complaint {} was approved but could not be published to the channel. \
         It will be retried on the next restart.\n\n{}",
        submission.id,
        public_caption(submission)
    )
}
