//! Session manager (C8): admission control for the stateful HTTP transport.
//! TTL pruning runs on every inbound request; LRU capacity eviction runs
//! before a new session is created (§4.8).

use crate::model::SessionRuntime;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;
use uuid::Uuid;

pub struct SessionManager {
    sessions: DashMap<String, SessionRuntime>,
    ttl: Duration,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(ttl: Duration, max_sessions: usize) -> Self {
        Self { sessions: DashMap::new(), ttl, max_sessions }
    }

    /// Drop every session whose `lastSeenAt` has aged past the configured TTL.
    pub fn prune_expired(&self) {
        if self.ttl.is_zero() {
            return;
        }
        let now = Utc::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| {
                let age = now.signed_duration_since(entry.last_seen_at);
                age.to_std().map(|age| age > self.ttl).unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();
        for session_id in expired {
            self.sessions.remove(&session_id);
        }
    }

    /// Evict the least-recently-seen session to make room for a new one.
    fn evict_lru(&self) {
        let oldest = self.sessions.iter().min_by_key(|entry| entry.last_seen_at).map(|entry| entry.key().clone());
        if let Some(session_id) = oldest {
            self.sessions.remove(&session_id);
        }
    }

    /// `createSession() -> SessionRuntime` (§4.8): prunes, evicts at capacity, then inserts.
    pub fn create_session(&self) -> SessionRuntime {
        self.prune_expired();
        if self.sessions.len() >= self.max_sessions {
            self.evict_lru();
        }
        let now = Utc::now();
        let runtime = SessionRuntime { session_id: Uuid::new_v4().to_string(), created_at: now, last_seen_at: now };
        self.sessions.insert(runtime.session_id.clone(), runtime.clone());
        runtime
    }

    /// Refresh `lastSeenAt` for an existing session; `false` if unknown or just expired.
    pub fn touch(&self, session_id: &str) -> bool {
        self.prune_expired();
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                entry.last_seen_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRuntime> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    /// Explicit client close (HTTP `DELETE`, §4.8).
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Graceful shutdown: every open session is considered closed.
    pub fn close_all(&self) {
        self.sessions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_eviction_drops_the_least_recently_seen_session() {
        let manager = SessionManager::new(Duration::from_secs(3600), 2);
        let first = manager.create_session();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _second = manager.create_session();
        assert_eq!(manager.len(), 2);

        let _third = manager.create_session();
        assert_eq!(manager.len(), 2);
        assert!(manager.get(&first.session_id).is_none());
    }

    #[test]
    fn ttl_pruning_drops_expired_sessions_on_touch() {
        let manager = SessionManager::new(Duration::from_millis(10), 10);
        let session = manager.create_session();
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert!(!manager.touch(&session.session_id));
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn remove_reports_whether_a_session_existed() {
        let manager = SessionManager::new(Duration::from_secs(3600), 10);
        let session = manager.create_session();
        assert!(manager.remove(&session.session_id));
        assert!(!manager.remove(&session.session_id));
    }
}
