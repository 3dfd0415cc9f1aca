//! Moderation protocol — approve, two-step reject and reason capture.
//!
//! A submission leaves the registry only when a terminal decision is about
//! to be written: at the approve press, or when the reject reason arrives.
//! `reject` and `reject_confirm` presses never touch the ledger.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::channels::{Channel, Controls, MessageRef, Sender};
use crate::config::BotConfig;
use crate::ledger::Ledger;

use super::markers::RejectMarkers;
use super::model::{Submission, SubmissionId, SubmissionStatus};
use super::notices;
use super::payload::{ButtonPayload, ModerationAction};
use super::publish::Publisher;
use super::registry::PendingRegistry;

/// What a moderation input resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationOutcome {
    Approved { id: SubmissionId, published: bool },
    Rejected { id: SubmissionId },
    /// First reject press; the moderator was asked to confirm.
    ConfirmRequested { id: SubmissionId },
    /// Reject confirmed; the moderator's next text is the reason.
    AwaitingReason { id: SubmissionId },
    /// The moderator backed out of a reject.
    RejectCancelled { id: SubmissionId },
    /// Someone else already decided; nothing changed.
    AlreadyHandled { id: SubmissionId },
    Unauthorized,
    InvalidPayload,
    /// The ledger write failed; the submission is pending again.
    Failed { id: SubmissionId },
}

/// A button press as seen by the protocol.
#[derive(Debug, Clone, Copy)]
pub struct Press<'a> {
    pub from: &'a Sender,
    pub interaction_id: &'a str,
    pub message: Option<MessageRef>,
    pub payload: &'a str,
}

pub struct Moderation {
    channel: Arc<dyn Channel>,
    ledger: Arc<dyn Ledger>,
    registry: Arc<PendingRegistry>,
    markers: RejectMarkers,
    publisher: Publisher,
    config: Arc<BotConfig>,
}

impl Moderation {
    pub fn new(
        channel: Arc<dyn Channel>,
        ledger: Arc<dyn Ledger>,
        registry: Arc<PendingRegistry>,
        config: Arc<BotConfig>,
    ) -> Self {
        Self {
            publisher: Publisher::new(Arc::clone(&channel), Arc::clone(&ledger), Arc::clone(&config)),
            markers: RejectMarkers::new(config.reject_reason_timeout),
            channel,
            ledger,
            registry,
            config,
        }
    }

    pub fn markers(&self) -> &RejectMarkers {
        &self.markers
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Send a new submission to every moderator: summary with decision
    /// buttons, then the media. One moderator failing does not stop the rest.
    /// Returns how many moderators received the summary.
    pub async fn announce(&self, submission: &Submission) -> usize {
        let text = notices::summary(submission);
        let controls = notices::decision_controls(submission.id);
        let mut delivered = 0;

        for &moderator in &self.config.moderators {
            if let Err(e) = self.channel.send_text(moderator, &text, Some(&controls)).await {
                warn!(
                    moderator,
                    submission_id = %submission.id,
                    error = %e,
                    "Failed to notify moderator"
                );
                continue;
            }
            delivered += 1;
            if let Err(e) = self.channel.send_media(moderator, &submission.media, None).await {
                warn!(
                    moderator,
                    submission_id = %submission.id,
                    error = %e,
                    "Failed to forward media to moderator"
                );
            }
        }

        info!(
            submission_id = %submission.id,
            delivered,
            moderators = self.config.moderators.len(),
            "Moderators notified"
        );
        delivered
    }

    /// Handle a moderation button press.
    pub async fn handle_press(&self, press: Press<'_>) -> ModerationOutcome {
        if !self.config.is_moderator(press.from.id) {
            warn!(actor = press.from.id, "Unauthorized moderation attempt");
            self.ack(press.interaction_id, Some(notices::UNAUTHORIZED)).await;
            return ModerationOutcome::Unauthorized;
        }

        let payload = match ButtonPayload::decode(press.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(actor = press.from.id, error = %e, "Undecodable button payload");
                self.ack(press.interaction_id, Some(notices::INVALID_ACTION)).await;
                return ModerationOutcome::InvalidPayload;
            }
        };

        debug!(
            moderator = press.from.id,
            action = payload.action.as_str(),
            submission_id = %payload.id,
            "Moderation press"
        );

        match payload.action {
            ModerationAction::Approve => self.approve(press, payload.id).await,
            ModerationAction::Reject => self.request_confirmation(press, payload.id).await,
            ModerationAction::RejectConfirm => self.await_reason(press, payload.id).await,
            ModerationAction::RejectCancel => self.cancel_reject(press, payload.id).await,
        }
    }

    /// Treat a moderator's text as a reject reason if they owe one.
    ///
    /// Returns `None` when no live marker exists, or the marked complaint
    /// was decided meanwhile, so the text falls through to ordinary
    /// conversation handling.
    pub async fn handle_reason(&self, from: &Sender, text: &str) -> Option<ModerationOutcome> {
        if !self.config.is_moderator(from.id) {
            return None;
        }
        let marker = self.markers.take_active(from.id).await?;
        let id = marker.id;

        // Decided by someone else since the marker was set: the text is not
        // a reason and goes to the conversation.
        let Some(submission) = self.registry.take(id).await else {
            info!(moderator = from.id, submission_id = %id, "Reason arrived for a handled complaint");
            self.say(from.id, notices::ALREADY_HANDLED).await;
            return None;
        };

        if let Err(e) = self
            .ledger
            .record_decision(submission.row, SubmissionStatus::Rejected, Some(text))
            .await
        {
            error!(submission_id = %id, row = submission.row, error = %e, "Failed to record rejection");
            self.registry.restore(submission).await;
            self.markers.begin(from.id, id, marker.control).await;
            self.say(from.id, notices::REASON_FAILED).await;
            return Some(ModerationOutcome::Failed { id });
        }

        info!(moderator = from.id, submission_id = %id, "Complaint rejected");
        self.release_markers(id).await;

        self.say(submission.submitter_id, &notices::submitter_rejected(text))
            .await;
        self.say(from.id, notices::REJECTED_ACK).await;
        if let Some(control) = marker.control {
            self.edit(&control, &notices::rejected(&submission, text), None)
                .await;
        }
        Some(ModerationOutcome::Rejected { id })
    }

    /// Drop any reject the moderator left without a reason.
    pub async fn abandon_reject(&self, moderator: i64) {
        if let Some(marker) = self.markers.clear(moderator).await {
            debug!(moderator, submission_id = %marker.id, "Reject abandoned");
            if let Some(control) = marker.control {
                if self.registry.contains(marker.id).await {
                    let controls = notices::decision_controls(marker.id);
                    self.restore_controls(&control, marker.id, &controls).await;
                }
            }
        }
    }

    async fn approve(&self, press: Press<'_>, id: SubmissionId) -> ModerationOutcome {
        let Some(submission) = self.registry.take(id).await else {
            return self.already_handled(press, id).await;
        };

        if let Err(e) = self
            .ledger
            .record_decision(submission.row, SubmissionStatus::Approved, None)
            .await
        {
            error!(submission_id = %id, row = submission.row, error = %e, "Failed to record approval");
            self.registry.restore(submission).await;
            self.ack(press.interaction_id, Some(notices::DECISION_FAILED))
                .await;
            return ModerationOutcome::Failed { id };
        }

        info!(moderator = press.from.id, submission_id = %id, "Complaint approved");
        self.ack(press.interaction_id, Some(notices::APPROVED_ACK)).await;
        self.release_markers(id).await;

        let published = self.publisher.publish(&submission).await;
        self.say(submission.submitter_id, notices::SUBMITTER_APPROVED)
            .await;
        if let Some(message) = press.message {
            self.edit(&message, &notices::approved(&submission, published), None)
                .await;
        }
        ModerationOutcome::Approved { id, published }
    }

    async fn request_confirmation(&self, press: Press<'_>, id: SubmissionId) -> ModerationOutcome {
        let Some(submission) = self.registry.get(id).await else {
            return self.already_handled(press, id).await;
        };
        self.ack(press.interaction_id, None).await;

        let text = format!("{}\n\n{}", notices::summary(&submission), notices::CONFIRM_REJECT);
        let controls = notices::confirm_reject_controls(id);
        match press.message {
            Some(message) => self.edit(&message, &text, Some(&controls)).await,
            None => {
                if let Err(e) = self
                    .channel
                    .send_text(press.from.id, notices::CONFIRM_REJECT, Some(&controls))
                    .await
                {
                    warn!(moderator = press.from.id, error = %e, "Failed to ask for reject confirmation");
                }
            }
        }
        ModerationOutcome::ConfirmRequested { id }
    }

    async fn await_reason(&self, press: Press<'_>, id: SubmissionId) -> ModerationOutcome {
        if !self.registry.contains(id).await {
            return self.already_handled(press, id).await;
        }
        self.ack(press.interaction_id, None).await;

        if let Some(previous) = self.markers.begin(press.from.id, id, press.message).await {
            if previous.id != id {
                info!(
                    moderator = press.from.id,
                    superseded = %previous.id,
                    submission_id = %id,
                    "Reject superseded by a newer one"
                );
                self.say(press.from.id, notices::REJECT_ABANDONED).await;
                if let Some(control) = previous.control {
                    let controls = notices::decision_controls(previous.id);
                    self.restore_controls(&control, previous.id, &controls).await;
                }
            }
        }

        self.say(press.from.id, notices::REASON_PROMPT).await;
        ModerationOutcome::AwaitingReason { id }
    }

    async fn cancel_reject(&self, press: Press<'_>, id: SubmissionId) -> ModerationOutcome {
        self.markers.cancel(press.from.id, id).await;
        if !self.registry.contains(id).await {
            return self.already_handled(press, id).await;
        }
        self.ack(press.interaction_id, None).await;
        if let Some(message) = press.message {
            self.restore_controls(&message, id, &notices::decision_controls(id))
                .await;
        }
        ModerationOutcome::RejectCancelled { id }
    }

    async fn already_handled(&self, press: Press<'_>, id: SubmissionId) -> ModerationOutcome {
        info!(moderator = press.from.id, submission_id = %id, "Complaint already handled");
        self.ack(press.interaction_id, Some(notices::ALREADY_HANDLED))
            .await;
        if let Some(message) = press.message {
            let text = match self.ledger.find_by_id(id).await {
                Ok(Some(row)) => notices::resolution(&row),
                Ok(None) => notices::ALREADY_HANDLED.to_string(),
                Err(e) => {
                    warn!(submission_id = %id, error = %e, "Failed to read resolution");
                    notices::ALREADY_HANDLED.to_string()
                }
            };
            self.edit(&message, &text, None).await;
        }
        ModerationOutcome::AlreadyHandled { id }
    }

    /// Tell moderators still owing a reason for `id` that it was decided.
    async fn release_markers(&self, id: SubmissionId) {
        for moderator in self.markers.release(id).await {
            debug!(moderator, submission_id = %id, "Reject marker released");
            self.say(moderator, notices::ALREADY_HANDLED).await;
        }
    }

    async fn restore_controls(&self, message: &MessageRef, id: SubmissionId, controls: &Controls) {
        if let Some(submission) = self.registry.get(id).await {
            self.edit(message, &notices::summary(&submission), Some(controls))
                .await;
        }
    }

    async fn ack(&self, interaction_id: &str, text: Option<&str>) {
        if let Err(e) = self.channel.acknowledge(interaction_id, text).await {
            debug!(error = %e, "Failed to acknowledge button press");
        }
    }

    async fn say(&self, to: i64, text: &str) {
        if let Err(e) = self.channel.send_text(to, text, None).await {
            warn!(recipient = to, error = %e, "Failed to send moderation message");
        }
    }

    async fn edit(&self, message: &MessageRef, text: &str, controls: Option<&Controls>) {
        if let Err(e) = self.channel.edit_message(message, text, controls).await {
            warn!(
                chat_id = message.chat_id,
                message_id = message.message_id,
                error = %e,
                "Failed to edit moderator message"
            );
        }
    }
}
