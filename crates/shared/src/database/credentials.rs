// Credential store - user/verifier lookup backed by the shared Database pool.

use super::{Database, FieldExt};
use crate::auth::BigNumber;
use crate::auth::Srp6Server;
use crate::AccountTypes;

/// Account access level, from most to least privileged. `Unverified` accounts
/// are treated identically to a missing account on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Owner,
    Master,
    Op,
    User,
    Unverified,
}

impl AccessLevel {
    fn from_raw(raw: AccountTypes) -> Self {
        match raw {
            crate::SEC_OWNER => AccessLevel::Owner,
            crate::SEC_MASTER => AccessLevel::Master,
            crate::SEC_OP => AccessLevel::Op,
            crate::SEC_USER => AccessLevel::User,
            _ => AccessLevel::Unverified,
        }
    }
}

/// A row from the credentials table, as the core needs it.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: u32,
    pub username: String,
    pub salt: Vec<u8>,
    pub verifier: Vec<u8>,
    pub access: AccessLevel,
    pub active: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialStoreError {
    #[error("user not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),
}

/// Read-mostly lookup over the account/verifier table. The core never writes
/// through this handle; registration and password changes are the companion
/// web app's job.
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        CredentialStore { db }
    }

    pub async fn find_user_by_name(&self, lower_username: &str) -> Result<UserRow, CredentialStoreError> {
        let escaped = Database::escape_string(lower_username);
        let sql = format!(
            "SELECT id, username, salt, verifier, access, active FROM account WHERE LOWER(username) = '{}'",
            escaped
        );

        let row = self
            .db
            .query_one(&sql)
            .await
            .map_err(CredentialStoreError::Database)?
            .ok_or(CredentialStoreError::NotFound)?;

        let mut salt_bn = BigNumber::new();
        salt_bn.set_hex_str(&row.get_string(2));
        let mut verifier_bn = BigNumber::new();
        verifier_bn.set_hex_str(&row.get_string(3));

        Ok(UserRow {
            id: row.get_u32(0),
            username: row.get_string(1),
            salt: salt_bn.as_byte_array_be(Srp6Server::SALT_BYTE_SIZE),
            verifier: verifier_bn.as_byte_array_be(Srp6Server::GROUP_BYTE_SIZE),
            access: AccessLevel::from_raw(row.get_u8(4)),
            active: row.get_bool(5),
        })
    }

    /// Fire-and-forget: failure to record an auth action must never fail the
    /// authentication attempt that triggered it.
    pub async fn record_auth_action(&self, user_id: u32, ip_bytes: &[u8; 4], at: chrono::DateTime<chrono::Utc>) {
        let ip = format!("{}.{}.{}.{}", ip_bytes[0], ip_bytes[1], ip_bytes[2], ip_bytes[3]);
        let sql = format!(
            "INSERT INTO auth_action (user_id, ip, at) VALUES ({}, '{}', '{}')",
            user_id,
            Database::escape_string(&ip),
            at.to_rfc3339(),
        );

        if let Err(e) = self.db.execute(&sql).await {
            tracing::warn!("failed to record auth action for user {}: {}", user_id, e);
        }
    }
}
