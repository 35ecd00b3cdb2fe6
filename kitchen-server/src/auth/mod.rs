use std::sync::Arc;

use chrono::Utc;
use kitchen::{models::Principal, validation::validate_sign_up};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use session::{Sessions, UserSession};

pub mod route;
pub mod session;

pub type AuthResult<X> = Result<X, AuthError>;

use crate::config::AuthConfig;
use crate::database::Database;
use crate::errors::WebError;
use crate::models::User;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("User already registered")]
    EmailTaken,
    #[error(transparent)]
    Validation(#[from] kitchen::validation::ValidationError),
    #[error("Account storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<AuthError> for WebError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => WebError::Auth(e.to_string()),
            AuthError::EmailTaken => WebError::Conflict(e.to_string()),
            AuthError::Validation(e) => e.into(),
            AuthError::Storage(e) => WebError::Internal(e),
        }
    }
}

/// Salted, iterated SHA-256.
fn hash_password(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();
    for _ in 0..iterations {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt)
            .finalize()
            .into();
    }
    digest
}

fn verify_password(user: &User, password: &str, iterations: u32) -> bool {
    let (Ok(salt), Ok(expected)) = (
        hex::decode(&user.password_salt),
        hex::decode(&user.password_hash),
    ) else {
        tracing::warn!(user_id = %user.user_id, "Stored password digest is not hex");
        return false;
    };
    let actual = hash_password(password, &salt, iterations);
    actual[..].ct_eq(&expected[..]).into()
}

/// Accounts and sessions.
#[derive(Clone)]
pub struct Authenticator {
    db: Database,
    pub sessions: Arc<Sessions>,
    iterations: u32,
    /// Mark session cookies `Secure`; only sensible when serving over TLS.
    pub secure_cookies: bool,
}

impl Authenticator {
    pub async fn from_config(db: Database, conf: &AuthConfig, secure_cookies: bool) -> Self {
        Self {
            db,
            sessions: Sessions::from_config(conf).await,
            iterations: conf.password_iterations,
            secure_cookies,
        }
    }

    /// An authenticator whose sessions are never written to disk.
    pub fn ephemeral(db: Database, iterations: u32) -> Self {
        Self {
            db,
            sessions: Default::default(),
            iterations,
            secure_cookies: false,
        }
    }

    /// Register a new account and sign it in.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> AuthResult<UserSession> {
        validate_sign_up(email, password, confirmation)?;
        let mut rng = rand::thread_rng();
        let salt: [u8; 16] = rng.gen();
        let user_id: [u8; 16] = rng.gen();
        let user = User {
            user_id: hex::encode(user_id),
            email: email.trim().to_string(),
            password_salt: hex::encode(salt),
            password_hash: hex::encode(hash_password(password, &salt, self.iterations)),
            created_at: Utc::now(),
        };
        if !user.insert(&self.db)? {
            return Err(AuthError::EmailTaken);
        }
        tracing::info!(user_id = %user.user_id, "Registered account");
        Ok(self.sessions.open(Principal {
            id: user.user_id,
            email: user.email,
        }))
    }

    /// Check credentials and open a session. Unknown emails and wrong passwords are
    /// indistinguishable to the caller.
    pub fn sign_in(&self, email: &str, password: &str) -> AuthResult<UserSession> {
        let user = User::find_by_email(&self.db, email)?.ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(&user, password, self.iterations) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(self.sessions.open(Principal {
            id: user.user_id,
            email: user.email,
        }))
    }

    pub fn sign_out(&self, session_id: &str) {
        self.sessions.sessions.remove(session_id);
    }

    /// Delete the account, its recipes and drafts, and end every session it holds.
    pub fn delete_account(&self, user_id: &str) -> AuthResult<()> {
        User::delete_account(&self.db, user_id)?;
        self.sessions.close_all_for(user_id);
        Ok(())
    }
}
