// Session store - in-memory map of active SRP sessions, keyed by a
// server-assigned 32-bit session id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;

use authd_shared::auth::BigNumber;

/// Where a session sits in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Negotiated,
    EphemeralSent,
    Proven,
    Dead,
}

/// One in-flight SRP handshake.
#[derive(Clone)]
pub struct Session {
    pub id: u32,
    pub user_id: u32,
    pub username: String,
    pub client_session: u32,
    pub protocol_version: u8,
    pub state: SessionState,
    pub created_at: std::time::Instant,

    pub client_ephemeral: Option<BigNumber>,
    pub server_ephemeral: Option<BigNumber>,
    pub server_secret: Option<BigNumber>,
    pub expected_proof: Option<[u8; 20]>,
    pub server_proof: Option<[u8; 20]>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("session expired")]
    Expired,
    #[error("too many collisions allocating a session id")]
    Overloaded,
}

const MAX_ID_COLLISION_RETRIES: u8 = 8;

/// Shared, lock-guarded table of active sessions. All state transitions go
/// through compare-and-set style methods so at most one handler advances a
/// given session_id at a time.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<u32, Session>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a new session in the NEGOTIATED state. Retries on id collision
    /// against any still-live session up to a small bound.
    pub fn create(
        &self,
        user_id: u32,
        username: &str,
        client_session: u32,
        protocol_version: u8,
    ) -> Result<u32, SessionError> {
        let mut table = self.sessions.write();

        for _ in 0..MAX_ID_COLLISION_RETRIES {
            let id: u32 = rand::thread_rng().gen_range(1..=u32::MAX);
            if table.contains_key(&id) {
                continue;
            }

            table.insert(
                id,
                Session {
                    id,
                    user_id,
                    username: username.to_string(),
                    client_session,
                    protocol_version,
                    state: SessionState::Negotiated,
                    created_at: std::time::Instant::now(),
                    client_ephemeral: None,
                    server_ephemeral: None,
                    server_secret: None,
                    expected_proof: None,
                    server_proof: None,
                },
            );
            return Ok(id);
        }

        Err(SessionError::Overloaded)
    }

    /// Returns the session only if it hasn't aged past `ttl` and isn't dead.
    pub fn get(&self, session_id: u32, ttl: std::time::Duration) -> Result<Session, SessionError> {
        let table = self.sessions.read();
        let session = table.get(&session_id).ok_or(SessionError::NotFound)?;

        if session.state == SessionState::Dead {
            return Err(SessionError::NotFound);
        }
        if session.created_at.elapsed() > ttl {
            return Err(SessionError::Expired);
        }

        Ok(session.clone())
    }

    /// Atomic compare-and-set: succeeds only if the session is currently
    /// NEGOTIATED. A second call (replay) observes a state other than
    /// NEGOTIATED and fails.
    pub fn set_ephemeral(
        &self,
        session_id: u32,
        client_ephemeral: BigNumber,
        server_ephemeral: BigNumber,
        server_secret: BigNumber,
        expected_proof: [u8; 20],
        server_proof: [u8; 20],
    ) -> bool {
        let mut table = self.sessions.write();
        let Some(session) = table.get_mut(&session_id) else {
            return false;
        };

        if session.state != SessionState::Negotiated {
            return false;
        }

        session.client_ephemeral = Some(client_ephemeral);
        session.server_ephemeral = Some(server_ephemeral);
        session.server_secret = Some(server_secret);
        session.expected_proof = Some(expected_proof);
        session.server_proof = Some(server_proof);
        session.state = SessionState::EphemeralSent;
        true
    }

    /// NEGOTIATED/EPHEMERAL_SENT -> PROVEN. Idempotent: calling it again on an
    /// already-proven session is a no-op success (same session_id -> M pair).
    pub fn mark_proven(&self, session_id: u32) -> bool {
        let mut table = self.sessions.write();
        let Some(session) = table.get_mut(&session_id) else {
            return false;
        };

        match session.state {
            SessionState::Negotiated | SessionState::EphemeralSent | SessionState::Proven => {
                session.state = SessionState::Proven;
                true
            }
            SessionState::Dead => false,
        }
    }

    pub fn kill(&self, session_id: u32) {
        let mut table = self.sessions.write();
        if let Some(session) = table.get_mut(&session_id) {
            session.state = SessionState::Dead;
        }
    }

    /// Remove sessions older than `ttl`. Returns the number removed.
    pub fn sweep(&self, ttl: std::time::Duration) -> usize {
        let mut table = self.sessions.write();
        let before = table.len();
        table.retain(|_, session| session.created_at.elapsed() <= ttl);
        before - table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_get_round_trips() {
        let store = SessionStore::new();
        let id = store.create(1, "alice", 42, 2).unwrap();
        let session = store.get(id, std::time::Duration::from_secs(30)).unwrap();
        assert_eq!(session.user_id, 1);
        assert_eq!(session.state, SessionState::Negotiated);
    }

    #[test]
    fn expired_session_is_rejected() {
        let store = SessionStore::new();
        let id = store.create(1, "alice", 42, 2).unwrap();
        let session = store.get(id, std::time::Duration::from_secs(0));
        assert!(matches!(session, Err(SessionError::Expired)));
    }

    #[test]
    fn set_ephemeral_rejects_replay() {
        let store = SessionStore::new();
        let id = store.create(1, "alice", 42, 2).unwrap();

        let ok = store.set_ephemeral(
            id,
            BigNumber::from_u32(1),
            BigNumber::from_u32(2),
            BigNumber::from_u32(3),
            [0u8; 20],
            [0u8; 20],
        );
        assert!(ok);

        let replay = store.set_ephemeral(
            id,
            BigNumber::from_u32(1),
            BigNumber::from_u32(2),
            BigNumber::from_u32(3),
            [0u8; 20],
            [0u8; 20],
        );
        assert!(!replay);
    }

    #[test]
    fn sweep_removes_stale_sessions() {
        let store = SessionStore::new();
        store.create(1, "alice", 1, 2).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let removed = store.sweep(std::time::Duration::from_millis(0));
        assert_eq!(removed, 1);
    }

    #[test]
    fn kill_makes_session_unreachable() {
        let store = SessionStore::new();
        let id = store.create(1, "alice", 1, 2).unwrap();
        store.kill(id);
        let result = store.get(id, std::time::Duration::from_secs(30));
        assert!(matches!(result, Err(SessionError::NotFound)));
    }
}
