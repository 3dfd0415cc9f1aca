//! Pending submission registry — completed complaints awaiting a moderator.
//!
//! A submission is in the registry exactly while its ledger status is
//! `pending`. `take` is the single point where a moderation decision claims
//! a submission, so a double press (or approve racing reject) resolves
//! exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::model::{Submission, SubmissionId};

/// In-memory table of pending submissions keyed by submission id.
pub struct PendingRegistry {
    entries: Mutex<HashMap<SubmissionId, Submission>>,
}

impl PendingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Insert a pending submission. Returns the entry it displaced, which
    /// only happens if ids collide.
    pub async fn put(&self, submission: Submission) -> Option<Submission> {
        let id = submission.id;
        let previous = self.entries.lock().await.insert(id, submission);
        if previous.is_some() {
            warn!(submission_id = %id, "Registry entry overwritten by id collision");
        } else {
            debug!(submission_id = %id, "Submission registered as pending");
        }
        previous
    }

    /// Atomically remove and return a submission.
    ///
    /// Returns `None` if it was never registered or another action already
    /// took it.
    pub async fn take(&self, id: SubmissionId) -> Option<Submission> {
        let taken = self.entries.lock().await.remove(&id);
        match &taken {
            Some(_) => debug!(submission_id = %id, "Submission taken for moderation"),
            None => debug!(submission_id = %id, "Submission already handled or unknown"),
        }
        taken
    }

    /// Return a taken submission after its terminal ledger write failed.
    pub async fn restore(&self, submission: Submission) {
        let id = submission.id;
        self.entries.lock().await.entry(id).or_insert(submission);
        info!(submission_id = %id, "Submission restored to pending after failed decision");
    }

    /// Whether a submission is still pending.
    pub async fn contains(&self, id: SubmissionId) -> bool {
        self.entries.lock().await.contains_key(&id)
    }

    /// Snapshot of a pending submission.
    pub async fn get(&self, id: SubmissionId) -> Option<Submission> {
        self.entries.lock().await.get(&id).cloned()
    }

    /// Reload pending submissions (from the ledger at startup).
    /// Returns how many were added.
    pub async fn load(&self, submissions: impl IntoIterator<Item = Submission>) -> usize {
        let mut entries = self.entries.lock().await;
        let mut loaded = 0;
        for submission in submissions {
            if let std::collections::hash_map::Entry::Vacant(slot) = entries.entry(submission.id) {
                slot.insert(submission);
                loaded += 1;
            }
        }
        loaded
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::channels::Media;
    use crate::moderation::model::SubmissionStatus;

    fn make_submission(row: i64) -> Submission {
        Submission {
            id: SubmissionId::new(),
            row,
            submitter_id: 100,
            submitter_name: "rider".into(),
            operator: "Whoosh".into(),
            location: "Mangilik El 55".into(),
            media: Media::photo(format!("file-{row}")),
            description: "parked across the ramp".into(),
            moderator_comment: None,
            status: SubmissionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_take_once() {
        let registry = PendingRegistry::new();
        let submission = make_submission(1);
        let id = submission.id;

        assert!(registry.put(submission.clone()).await.is_none());
        assert!(registry.contains(id).await);

        assert_eq!(registry.take(id).await, Some(submission));
        assert!(registry.take(id).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn take_unknown_is_none() {
        let registry = PendingRegistry::new();
        assert!(registry.take(SubmissionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn colliding_put_reports_displaced_entry() {
        let registry = PendingRegistry::new();
        let first = make_submission(1);
        let mut second = make_submission(2);
        second.id = first.id;

        registry.put(first.clone()).await;
        let displaced = registry.put(second.clone()).await;

        assert_eq!(displaced, Some(first));
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(second.id).await, Some(second));
    }

    #[tokio::test]
    async fn concurrent_takes_yield_exactly_one_winner() {
        let registry = PendingRegistry::new();
        let submission = make_submission(1);
        let id = submission.id;
        registry.put(submission).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.take(id).await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn restore_does_not_clobber_newer_entry() {
        let registry = PendingRegistry::new();
        let submission = make_submission(1);
        let id = submission.id;
        registry.put(submission.clone()).await;

        let taken = registry.take(id).await.unwrap();
        registry.restore(taken).await;
        assert!(registry.contains(id).await);

        let mut other = submission.clone();
        other.description = "changed".into();
        registry.restore(other).await;
        assert_eq!(registry.get(id).await.unwrap().description, "parked across the ramp");
    }

    #[tokio::test]
    async fn load_skips_known_ids() {
        let registry = PendingRegistry::new();
        let a = make_submission(1);
        let b = make_submission(2);
        registry.put(a.clone()).await;

        let loaded = registry.load(vec![a, b]).await;
        assert_eq!(loaded, 1);
        assert_eq!(registry.len().await, 2);
    }
}
