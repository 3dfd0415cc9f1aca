//! Reject-in-progress markers — which submission a moderator owes a reason for.
//!
//! A marker is scoped to one moderator and expires after a deadline, so a
//! moderator who walks away from a reject does not have some later message
//! captured as the reason.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::channels::MessageRef;

use super::model::SubmissionId;

/// An outstanding request for a reject reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectMarker {
    pub id: SubmissionId,
    /// The moderator's control message, edited once the reject resolves.
    pub control: Option<MessageRef>,
    pub expires_at: Instant,
}

impl RejectMarker {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Per-moderator reject markers.
pub struct RejectMarkers {
    timeout: Duration,
    markers: Mutex<HashMap<i64, RejectMarker>>,
}

impl RejectMarkers {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            markers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a marker for `moderator`, superseding any earlier one.
    /// Returns the superseded marker if it was still live.
    pub async fn begin(
        &self,
        moderator: i64,
        id: SubmissionId,
        control: Option<MessageRef>,
    ) -> Option<RejectMarker> {
        let now = Instant::now();
        let marker = RejectMarker {
            id,
            control,
            expires_at: now + self.timeout,
        };
        let previous = self.markers.lock().await.insert(moderator, marker);
        debug!(moderator, submission_id = %id, "Awaiting reject reason");
        previous.filter(|m| !m.is_expired(now))
    }

    /// Remove and return the live marker for `moderator`.
    ///
    /// Expired markers are dropped and reported as absent.
    pub async fn take_active(&self, moderator: i64) -> Option<RejectMarker> {
        let marker = self.markers.lock().await.remove(&moderator)?;
        if marker.is_expired(Instant::now()) {
            debug!(moderator, submission_id = %marker.id, "Reject marker expired");
            return None;
        }
        Some(marker)
    }

    /// Whether `moderator` currently owes a reason.
    pub async fn is_active(&self, moderator: i64) -> bool {
        let now = Instant::now();
        self.markers
            .lock()
            .await
            .get(&moderator)
            .is_some_and(|m| !m.is_expired(now))
    }

    /// Drop the marker for `moderator` if it points at `id`.
    pub async fn cancel(&self, moderator: i64, id: SubmissionId) -> bool {
        let mut markers = self.markers.lock().await;
        if markers.get(&moderator).is_some_and(|m| m.id == id) {
            markers.remove(&moderator);
            true
        } else {
            false
        }
    }

    /// Drop whatever marker `moderator` has.
    pub async fn clear(&self, moderator: i64) -> Option<RejectMarker> {
        self.markers.lock().await.remove(&moderator)
    }

    /// Drop every live marker pointing at `id`, returning the moderators
    /// that held one.
    pub async fn release(&self, id: SubmissionId) -> Vec<i64> {
        let now = Instant::now();
        let mut markers = self.markers.lock().await;
        let holders: Vec<i64> = markers
            .iter()
            .filter(|(_, m)| m.id == id)
            .map(|(&moderator, _)| moderator)
            .collect();
        let mut live = Vec::with_capacity(holders.len());
        for moderator in holders {
            if let Some(marker) = markers.remove(&moderator) {
                if !marker.is_expired(now) {
                    live.push(moderator);
                }
            }
        }
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn marker_is_consumed_once() {
        let markers = RejectMarkers::new(Duration::from_secs(60));
        let id = SubmissionId::new();
        assert!(markers.begin(1, id, None).await.is_none());
        assert!(markers.is_active(1).await);

        let marker = markers.take_active(1).await.unwrap();
        assert_eq!(marker.id, id);
        assert!(markers.take_active(1).await.is_none());
    }

    #[tokio::test]
    async fn markers_are_scoped_per_moderator() {
        let markers = RejectMarkers::new(Duration::from_secs(60));
        markers.begin(1, SubmissionId::new(), None).await;
        assert!(!markers.is_active(2).await);
        assert!(markers.take_active(2).await.is_none());
        assert!(markers.is_active(1).await);
    }

    #[tokio::test]
    async fn new_confirmation_supersedes_old_marker() {
        let markers = RejectMarkers::new(Duration::from_secs(60));
        let first = SubmissionId::new();
        let second = SubmissionId::new();
        markers.begin(1, first, None).await;

        let superseded = markers.begin(1, second, None).await.unwrap();
        assert_eq!(superseded.id, first);
        assert_eq!(markers.take_active(1).await.unwrap().id, second);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_marker_does_not_capture_text() {
        let markers = RejectMarkers::new(Duration::from_secs(60));
        markers.begin(1, SubmissionId::new(), None).await;

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(!markers.is_active(1).await);
        assert!(markers.take_active(1).await.is_none());
    }

    #[tokio::test]
    async fn cancel_only_matches_same_submission() {
        let markers = RejectMarkers::new(Duration::from_secs(60));
        let id = SubmissionId::new();
        markers.begin(1, id, None).await;

        assert!(!markers.cancel(1, SubmissionId::new()).await);
        assert!(markers.cancel(1, id).await);
        assert!(!markers.is_active(1).await);
    }

    #[tokio::test]
    async fn release_drops_markers_for_decided_submission() {
        let markers = RejectMarkers::new(Duration::from_secs(60));
        let decided = SubmissionId::new();
        let other = SubmissionId::new();
        markers.begin(1, decided, None).await;
        markers.begin(2, decided, None).await;
        markers.begin(3, other, None).await;

        let mut released = markers.release(decided).await;
        released.sort_unstable();
        assert_eq!(released, vec![1, 2]);
        assert!(!markers.is_active(1).await);
        assert!(!markers.is_active(2).await);
        assert!(markers.is_active(3).await);
        assert!(markers.release(decided).await.is_empty());
    }
}
