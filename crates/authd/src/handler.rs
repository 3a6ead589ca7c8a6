// Protocol state machine - advances a session through NEGOTIATED ->
// EPHEMERAL_SENT -> PROVEN for each inbound datagram, independently.

use std::time::Duration;

use authd_shared::auth::{BigNumber, Srp6Server};
use authd_shared::database::{AccessLevel, CredentialStore};

use crate::protocol::{self, Inbound, SessionErrorCode, UserErrorCode};
use crate::session::{SessionError, SessionState, SessionStore};

pub struct Handler {
    pub credentials: CredentialStore,
    pub sessions: SessionStore,
    pub srp: Srp6Server,
    pub session_ttl: Duration,
}

impl Handler {
    pub async fn handle(&self, datagram: &[u8], source_ip: [u8; 4]) -> Option<Vec<u8>> {
        let inbound = match protocol::decode(datagram) {
            Ok(inbound) => inbound,
            Err(_) => return None, // malformed, silently dropped
        };

        match inbound {
            Inbound::Negotiate(n) => self.handle_negotiate(n).await,
            Inbound::Ephemeral(e) => self.handle_ephemeral(e).await,
            Inbound::Proof(p) => self.handle_proof(p, source_ip).await,
        }
    }

    async fn handle_negotiate(&self, negotiate: protocol::ServerNegotiate) -> Option<Vec<u8>> {
        let username = negotiate.username.to_lowercase();

        let user = match self.credentials.find_user_by_name(&username).await {
            Ok(user) if user.active && user.access != AccessLevel::Unverified => user,
            _ => return Some(protocol::encode_error_user(UserErrorCode::NoExist, &username)),
        };

        if negotiate.version != 1 && negotiate.version != 2 {
            return Some(protocol::encode_error_user(UserErrorCode::OutdatedProtocol, &username));
        }

        let session_id = match self.sessions.create(
            user.id,
            &username,
            negotiate.client_session,
            negotiate.version,
        ) {
            Ok(id) => id,
            Err(SessionError::Overloaded) => {
                return Some(protocol::encode_error_user(UserErrorCode::TryLater, &username));
            }
            Err(_) => unreachable!("create only returns Ok or Overloaded"),
        };

        Some(protocol::encode_auth_negotiate(
            negotiate.version,
            negotiate.client_session,
            session_id,
            &user.salt,
            &username,
        ))
    }

    async fn handle_ephemeral(&self, ephemeral: protocol::ServerEphemeralPacket) -> Option<Vec<u8>> {
        let session_id = ephemeral.session_id;

        let session = match self.sessions.get(session_id, self.session_ttl) {
            Ok(session) => session,
            Err(_) => {
                return Some(protocol::encode_error_session(SessionErrorCode::NoExist, session_id));
            }
        };

        let user = match self.credentials.find_user_by_name(&session.username).await {
            Ok(user) => user,
            Err(_) => {
                return Some(protocol::encode_error_session(SessionErrorCode::NoExist, session_id));
            }
        };

        let client_a = BigNumber::from_bytes_be(&ephemeral.client_ephemeral);
        let verifier = BigNumber::from_bytes_be(&user.verifier);

        let server_ephemeral = self.srp.server_ephemeral(&verifier);

        let key_result = match self.srp.session_key(
            &client_a,
            &server_ephemeral.b,
            &server_ephemeral.big_b,
            &verifier,
            &session.username,
            &user.salt,
        ) {
            Ok(result) => result,
            Err(_) => {
                self.sessions.kill(session_id);
                return Some(protocol::encode_error_session(
                    SessionErrorCode::VerifierUnsafe,
                    session_id,
                ));
            }
        };

        let server_b_bytes = server_ephemeral.big_b.as_byte_array_be(Srp6Server::GROUP_BYTE_SIZE);

        let set = self.sessions.set_ephemeral(
            session_id,
            client_a,
            server_ephemeral.big_b,
            server_ephemeral.b,
            key_result.expected_proof,
            key_result.server_proof,
        );

        if !set {
            return Some(protocol::encode_error_session(SessionErrorCode::NoExist, session_id));
        }

        Some(protocol::encode_auth_ephemeral(session_id, &server_b_bytes))
    }

    async fn handle_proof(
        &self,
        proof: protocol::ServerProofPacket,
        source_ip: [u8; 4],
    ) -> Option<Vec<u8>> {
        let session_id = proof.session_id;

        let session = match self.sessions.get(session_id, self.session_ttl) {
            Ok(session) if session.state == SessionState::EphemeralSent => session,
            _ => {
                return Some(protocol::encode_error_session(SessionErrorCode::NoExist, session_id));
            }
        };

        let expected_proof = session
            .expected_proof
            .expect("EPHEMERAL_SENT sessions always carry a cached expected proof");
        let server_proof = session
            .server_proof
            .expect("EPHEMERAL_SENT sessions always carry a cached server proof");

        if !Srp6Server::verify_proof(&proof.proof, &expected_proof) {
            self.sessions.kill(session_id);
            return Some(protocol::encode_error_session(SessionErrorCode::AuthFailed, session_id));
        }

        self.sessions.mark_proven(session_id);
        self.credentials
            .record_auth_action(session.user_id, &source_ip, chrono::Utc::now())
            .await;

        Some(protocol::encode_auth_proof(session_id, &server_proof))
    }
}
