//! Bot core — routes inbound events to the conversation or the moderation
//! protocol and owns the shared state both need.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::channels::{Channel, Controls, InboundEvent, Sender};
use crate::config::BotConfig;
use crate::conversation::prompts;
use crate::conversation::{CompleteDraft, Input, Reply, SessionStore};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::moderation::{
    Moderation, ModerationOutcome, NewSubmission, PendingRegistry, Press, Submission,
    SubmissionId, SubmissionStatus,
};

/// What handling one event amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    /// A conversation step; the reply was sent to the user.
    Reply(Reply),
    /// A completed draft was recorded and sent to moderators.
    Submitted(Submission),
    /// The draft could not be recorded; the user was asked to retry.
    SubmitFailed,
    Moderation(ModerationOutcome),
}

/// Event-handling context: collaborators plus the in-memory registries.
pub struct Bot {
    config: Arc<BotConfig>,
    channel: Arc<dyn Channel>,
    ledger: Arc<dyn Ledger>,
    registry: Arc<PendingRegistry>,
    sessions: SessionStore,
    moderation: Moderation,
}

impl Bot {
    pub fn new(config: BotConfig, channel: Arc<dyn Channel>, ledger: Arc<dyn Ledger>) -> Self {
        let config = Arc::new(config);
        let registry = PendingRegistry::new();
        let moderation = Moderation::new(
            Arc::clone(&channel),
            Arc::clone(&ledger),
            Arc::clone(&registry),
            Arc::clone(&config),
        );
        Self {
            config,
            channel,
            ledger,
            registry,
            sessions: SessionStore::new(),
            moderation,
        }
    }

    pub fn registry(&self) -> &Arc<PendingRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn moderation(&self) -> &Moderation {
        &self.moderation
    }

    // ── Startup ─────────────────────────────────────────────────────

    /// Rebuild the pending registry from ledger rows still awaiting a
    /// decision. Returns how many were loaded.
    pub async fn recover(&self) -> Result<usize> {
        let pending = self.ledger.rows_with_status(SubmissionStatus::Pending).await?;
        let loaded = self.registry.load(pending).await;
        if loaded > 0 {
            info!(count = loaded, "Recovered pending submissions from ledger");
        }
        Ok(loaded)
    }

    /// Publish approved rows whose earlier publish failed.
    pub async fn reconcile(&self) -> Result<usize> {
        Ok(self.moderation.publisher().reconcile().await?)
    }

    // ── Main loop ───────────────────────────────────────────────────

    /// Consume the channel's event stream until it ends or Ctrl+C.
    /// Events are handled one at a time, in arrival order.
    pub async fn run(&self) -> Result<()> {
        let mut events = self.channel.start().await?;
        info!(
            channel = self.channel.name(),
            moderators = self.config.moderators.len(),
            "Bot ready and listening"
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => match event {
                    Some(event) => event,
                    None => {
                        info!("Event stream ended, shutting down...");
                        break;
                    }
                }
            };
            let user_id = event.sender().id;
            let handled = self.handle_event(event).await;
            debug!(user_id, ?handled, "Event handled");
        }
        Ok(())
    }

    /// Handle one inbound event to completion.
    pub async fn handle_event(&self, event: InboundEvent) -> Handled {
        match event {
            InboundEvent::ButtonPress {
                from,
                interaction_id,
                message,
                payload,
            } => {
                let press = Press {
                    from: &from,
                    interaction_id: &interaction_id,
                    message,
                    payload: &payload,
                };
                Handled::Moderation(self.moderation.handle_press(press).await)
            }
            InboundEvent::SessionStart { from } => {
                if self.config.is_moderator(from.id) {
                    self.moderation.abandon_reject(from.id).await;
                }
                self.converse(&from, Input::Start).await
            }
            InboundEvent::Text { from, text } => {
                let input = Input::from_text(&text);
                if self.config.is_moderator(from.id) {
                    // Commands and keyboard taps are never a reject reason.
                    match input {
                        Input::Text(text) if !prompts::is_keyboard_label(text) => {
                            if let Some(outcome) = self.moderation.handle_reason(&from, text).await {
                                return Handled::Moderation(outcome);
                            }
                        }
                        _ => self.moderation.abandon_reject(from.id).await,
                    }
                }
                self.converse(&from, input).await
            }
            InboundEvent::Media {
                from,
                media,
                caption,
            } => {
                let input = Input::Media {
                    media: &media,
                    caption: caption.as_deref(),
                };
                self.converse(&from, input).await
            }
            InboundEvent::Location { from, lat, lon } => {
                self.converse(&from, Input::Location { lat, lon }).await
            }
        }
    }

    // ── Conversation ────────────────────────────────────────────────

    async fn converse(&self, from: &Sender, input: Input<'_>) -> Handled {
        let reply = self
            .sessions
            .with_session(from.id, |session| session.advance(input))
            .await;

        match reply {
            Reply::Complete(draft) => self.submit(from, draft).await,
            reply => {
                self.respond(from, &reply).await;
                Handled::Reply(reply)
            }
        }
    }

    async fn respond(&self, from: &Sender, reply: &Reply) {
        let (text, controls) = match reply {
            Reply::Welcome => (prompts::WELCOME.to_string(), prompts::main_menu()),
            Reply::Cancelled => (prompts::CANCELLED.to_string(), prompts::main_menu()),
            Reply::Menu => (prompts::MENU_HINT.to_string(), prompts::main_menu()),
            Reply::ChooseOperator => (
                prompts::CHOOSE_OPERATOR.to_string(),
                prompts::operator_keyboard(),
            ),
            Reply::AskLocation => (
                prompts::ASK_LOCATION.to_string(),
                prompts::location_keyboard(),
            ),
            Reply::AskMedia => (prompts::ASK_MEDIA.to_string(), Controls::Clear),
            Reply::AskDescription => (prompts::ASK_DESCRIPTION.to_string(), Controls::Clear),
            Reply::Profile => (self.profile_text(from).await, prompts::main_menu()),
            Reply::About => (prompts::ABOUT_TEXT.to_string(), prompts::main_menu()),
            Reply::Reprompt(state) => (
                prompts::reprompt(*state).to_string(),
                prompts::keyboard_for(*state),
            ),
            // Handled by `submit`
            Reply::Complete(_) => return,
        };
        self.send(from.id, &text, Some(&controls)).await;
    }

    async fn profile_text(&self, from: &Sender) -> String {
        match self.ledger.count_rows_by_submitter(from.id).await {
            Ok(count) => prompts::profile(&from.display_name(), count),
            Err(e) => {
                error!(user_id = from.id, error = %e, "Failed to count submissions");
                prompts::TRY_AGAIN.to_string()
            }
        }
    }

    /// Record a completed draft, register it as pending and notify moderators.
    async fn submit(&self, from: &Sender, draft: CompleteDraft) -> Handled {
        let new = NewSubmission {
            id: SubmissionId::new(),
            submitter_id: from.id,
            submitter_name: from.display_name(),
            operator: draft.operator.clone(),
            location: draft.location.clone(),
            media: draft.media.clone(),
            description: draft.description.clone(),
            created_at: Utc::now(),
        };

        let submission = match self.ledger.append_row(&new).await {
            Ok(submission) => submission,
            Err(e) => {
                error!(user_id = from.id, submission_id = %new.id, error = %e, "Failed to record submission");
                self.sessions
                    .with_session(from.id, |session| session.restore(draft))
                    .await;
                self.send(from.id, prompts::TRY_AGAIN, None).await;
                return Handled::SubmitFailed;
            }
        };

        info!(
            user_id = from.id,
            submission_id = %submission.id,
            row = submission.row,
            "Submission recorded"
        );

        self.registry.put(submission.clone()).await;
        self.moderation.announce(&submission).await;
        self.send(from.id, prompts::SUBMITTED, Some(&prompts::after_report_keyboard()))
            .await;
        Handled::Submitted(submission)
    }

    async fn send(&self, to: i64, text: &str, controls: Option<&Controls>) {
        if let Err(e) = self.channel.send_text(to, text, controls).await {
            warn!(recipient = to, error = %e, "Failed to send message");
        }
    }
}
