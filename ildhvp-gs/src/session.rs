//! Scoring sessions
//!
//! A session is one learner viewing one content instance. It owns the
//! instance's [`ContentInstanceState`]; statements posted for the session are
//! applied in arrival order while the registry lock is held, and whatever
//! the aggregator asks to persist is written after the lock is released.
//!
//! Pages that go away without closing their session leave it behind; sessions
//! idle for longer than the registry's TTL are evicted.

use chrono::{DateTime, Utc};
use ildhvp_common::{ContentInstanceState, PersistCommand, Statement};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: i64,
    pub state: ContentInstanceState,
    pub statements_processed: u64,
    pub created_at: DateTime<Utc>,
    /// Creation or last statement
    pub last_seen: DateTime<Utc>,
}

impl Session {
    fn idle_longer_than(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        // A clock step backwards yields a negative span, which is never idle
        (now - self.last_seen).to_std().is_ok_and(|idle| idle > ttl)
    }
}

/// Idle time after which a session is evicted
pub const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Outcome of applying one statement to a session
#[derive(Debug, Clone)]
pub enum Applied {
    /// No session with that id belongs to the user
    UnknownSession,
    Processed {
        command: Option<PersistCommand>,
        snapshot: Session,
    },
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, Session>>,
    idle_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_SESSION_IDLE_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub async fn create(&self, user_id: i64, state: ContentInstanceState) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            state,
            statements_processed: 0,
            created_at: now,
            last_seen: now,
        };

        let mut sessions = self.sessions.lock().await;
        // Abandoned sessions are dropped on access
        Self::evict_locked(&mut sessions, self.idle_ttl, now);
        sessions.insert(session.id, session.clone());
        drop(sessions);

        debug!(
            session_id = %session.id,
            user_id,
            content_id = session.state.content_id(),
            "Session created"
        );
        session
    }

    /// Snapshot of a session owned by `user_id`
    pub async fn get(&self, id: Uuid, user_id: i64) -> Option<Session> {
        self.sessions
            .lock()
            .await
            .get(&id)
            .filter(|session| session.user_id == user_id)
            .cloned()
    }

    /// Feed a statement to a session owned by `user_id`
    pub async fn apply(&self, id: Uuid, user_id: i64, statement: &Statement) -> Applied {
        let mut sessions = self.sessions.lock().await;

        let Some(session) = sessions
            .get_mut(&id)
            .filter(|session| session.user_id == user_id)
        else {
            return Applied::UnknownSession;
        };

        let command = session.state.process(statement);
        session.statements_processed += 1;
        session.last_seen = Utc::now();

        Applied::Processed {
            command,
            snapshot: session.clone(),
        }
    }

    /// Remove a session owned by `user_id`; false when there was none
    pub async fn close(&self, id: Uuid, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock().await;

        match sessions.get(&id) {
            Some(session) if session.user_id == user_id => {
                sessions.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Drop sessions idle for longer than the TTL; returns how many went
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Utc::now()).await
    }

    /// [`evict_idle`](Self::evict_idle) as of `now`
    pub async fn evict_idle_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock().await;
        Self::evict_locked(&mut sessions, self.idle_ttl, now)
    }

    fn evict_locked(
        sessions: &mut HashMap<Uuid, Session>,
        idle_ttl: Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, session| !session.idle_longer_than(idle_ttl, now));
        let evicted = before - sessions.len();

        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle scoring sessions");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ildhvp_common::xapi::verbs;
    use ildhvp_common::Classification;

    fn essay_state(content_id: i64) -> ContentInstanceState {
        ContentInstanceState::new(
            content_id,
            Classification::Essay {
                pass_percentage: None,
            },
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_sessions_are_private_to_their_user() {
        let registry = SessionRegistry::new();
        let session = registry.create(1, essay_state(7)).await;

        assert!(registry.get(session.id, 1).await.is_some());
        assert!(registry.get(session.id, 2).await.is_none());

        let statement = Statement::new(7, verbs::ANSWERED).with_score(1.0, 2.0);
        assert!(matches!(
            registry.apply(session.id, 2, &statement).await,
            Applied::UnknownSession
        ));
        assert!(!registry.close(session.id, 2).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_apply_updates_state_in_order() {
        let registry = SessionRegistry::new();
        let session = registry.create(1, essay_state(7)).await;

        let statement = Statement::new(7, verbs::ANSWERED).with_score(1.0, 2.0);
        let Applied::Processed { command, snapshot } =
            registry.apply(session.id, 1, &statement).await
        else {
            panic!("session should exist");
        };

        assert_eq!(command, Some(PersistCommand::percentage(7, 50.0)));
        assert_eq!(snapshot.statements_processed, 1);
        assert_eq!(snapshot.state.running_percentage(), 50.0);

        // Ignored statements are still counted
        let other = Statement::new(8, verbs::ANSWERED).with_score(1.0, 1.0);
        let Applied::Processed { command, snapshot } = registry.apply(session.id, 1, &other).await
        else {
            panic!("session should exist");
        };
        assert_eq!(command, None);
        assert_eq!(snapshot.statements_processed, 2);

        assert!(registry.close(session.id, 1).await);
        assert!(registry.get(session.id, 1).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let registry = SessionRegistry::with_idle_ttl(Duration::from_secs(60));
        let session = registry.create(1, essay_state(7)).await;

        let within_ttl = session.last_seen + chrono::Duration::seconds(30);
        assert_eq!(registry.evict_idle_at(within_ttl).await, 0);
        assert!(registry.get(session.id, 1).await.is_some());

        let expired = session.last_seen + chrono::Duration::seconds(61);
        assert_eq!(registry.evict_idle_at(expired).await, 1);
        assert!(registry.get(session.id, 1).await.is_none());

        let statement = Statement::new(7, verbs::ANSWERED).with_score(1.0, 2.0);
        assert!(matches!(
            registry.apply(session.id, 1, &statement).await,
            Applied::UnknownSession
        ));
    }

    #[tokio::test]
    async fn test_create_evicts_abandoned_sessions() {
        let registry = SessionRegistry::with_idle_ttl(Duration::ZERO);
        let abandoned = registry.create(1, essay_state(7)).await;

        tokio::time::sleep(Duration::from_millis(5)).await;
        let fresh = registry.create(2, essay_state(8)).await;

        assert!(registry.get(abandoned.id, 1).await.is_none());
        assert!(registry.get(fresh.id, 2).await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_recent_statement_keeps_session_alive() {
        let registry = SessionRegistry::with_idle_ttl(Duration::from_secs(60));
        let session = registry.create(1, essay_state(7)).await;

        let statement = Statement::new(7, verbs::ANSWERED).with_score(1.0, 2.0);
        let Applied::Processed { snapshot, .. } = registry.apply(session.id, 1, &statement).await
        else {
            panic!("session should exist");
        };

        assert_eq!(
            registry
                .evict_idle_at(snapshot.last_seen + chrono::Duration::seconds(59))
                .await,
            0
        );
        assert!(registry.get(session.id, 1).await.is_some());

        assert_eq!(
            registry
                .evict_idle_at(snapshot.last_seen + chrono::Duration::seconds(61))
                .await,
            1
        );
        assert_eq!(registry.len().await, 0);
    }
}
