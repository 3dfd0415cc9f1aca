//! Public-channel publishing of approved complaints.
//!
//! The ledger decision is committed before publishing. A publish that keeps
//! failing is recorded as `published = 0` and every moderator is alerted;
//! `reconcile` retries those rows at startup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::channels::Channel;
use crate::config::BotConfig;
use crate::error::DatabaseError;
use crate::ledger::Ledger;

use super::model::Submission;
use super::notices;

pub struct Publisher {
    channel: Arc<dyn Channel>,
    ledger: Arc<dyn Ledger>,
    config: Arc<BotConfig>,
}

impl Publisher {
    pub fn new(channel: Arc<dyn Channel>, ledger: Arc<dyn Ledger>, config: Arc<BotConfig>) -> Self {
        Self {
            channel,
            ledger,
            config,
        }
    }

    /// Post an approved submission to the public channel, retrying with
    /// exponential backoff. Returns whether the post went out.
    pub async fn publish(&self, submission: &Submission) -> bool {
        let caption = notices::public_caption(submission);
        let attempts = self.config.publish_attempts.max(1);
        let mut delay = self.config.publish_backoff;

        for attempt in 1..=attempts {
            match self
                .channel
                .send_media(self.config.public_channel, &submission.media, Some(&caption))
                .await
            {
                Ok(_) => {
                    info!(submission_id = %submission.id, attempt, "Published to public channel");
                    self.record(submission, true).await;
                    return true;
                }
                Err(e) => {
                    warn!(
                        submission_id = %submission.id,
                        attempt,
                        attempts,
                        error = %e,
                        "Publish to public channel failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2).min(Duration::from_secs(60));
                    }
                }
            }
        }

        error!(submission_id = %submission.id, "Giving up on publishing, alerting moderators");
        self.record(submission, false).await;
        self.alert(submission).await;
        false
    }

    /// Retry every approved row that has not been published yet.
    /// Returns how many were published.
    pub async fn reconcile(&self) -> Result<usize, DatabaseError> {
        let pending = self.ledger.unpublished_approved().await?;
        if pending.is_empty() {
            return Ok(0);
        }
        info!(count = pending.len(), "Reconciling unpublished approvals");

        let mut published = 0;
        for submission in &pending {
            if self.publish(submission).await {
                published += 1;
            }
        }
        Ok(published)
    }

    async fn record(&self, submission: &Submission, published: bool) {
        if let Err(e) = self.ledger.record_published(submission.row, published).await {
            error!(
                submission_id = %submission.id,
                row = submission.row,
                published,
                error = %e,
                "Failed to record publish outcome"
            );
        }
    }

    async fn alert(&self, submission: &Submission) {
        let text = notices::publish_failed(submission);
        for &moderator in &self.config.moderators {
            if let Err(e) = self.channel.send_text(moderator, &text, None).await {
                warn!(moderator, error = %e, "Failed to alert moderator");
            }
        }
    }
}
