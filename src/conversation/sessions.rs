//! In-memory per-user session store.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::state::Session;

/// Sessions keyed by user id, created on first contact.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the user's session, creating it if needed.
    ///
    /// The lock is held only for the closure, which must not await.
    pub async fn with_session<R>(&self, user_id: i64, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(user_id));
        f(session)
    }

    /// Snapshot of a user's session, if one exists.
    pub async fn get(&self, user_id: i64) -> Option<Session> {
        self.sessions.lock().await.get(&user_id).cloned()
    }
}
