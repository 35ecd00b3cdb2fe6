use axum::extract::FromRef;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use kitchen::models::Principal;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::errors::WebError;

use super::Authenticator;

pub const SESSION_COOKIE: &str = "session_id";

pub type SessionID = String;

/// Sessions older than this must sign in again.
pub const SESSION_MAX_AGE_DAYS: i64 = 30;

/// Information about the connected user, and proof that they are authenticated
/// Use this as a request guard to get the user's session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserSession {
    pub id: SessionID,
    pub principal: Principal,
    pub created_at: DateTime<Utc>,
}

impl UserSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > chrono::Duration::days(SESSION_MAX_AGE_DAYS)
    }
}

#[derive(Serialize, Deserialize, Default)]
pub struct Sessions {
    pub sessions: DashMap<SessionID, UserSession>,
}

impl Sessions {
    pub async fn from_config(conf: &AuthConfig) -> Arc<Self> {
        // Copy this path to avoid borrowing issues
        let path = conf.session_storage_path.clone();
        // Read sessions from the file
        let session_text = tokio::fs::read_to_string(&path).await.unwrap_or_default();
        let sessions: Self = serde_json::from_str(&session_text).unwrap_or_default();
        tracing::info!("Restored {} sessions", sessions.sessions.len());

        let sessions_ref = Arc::new(sessions);

        // Start a task to save the sessions to disk every 5 minutes
        let sessions_ref2 = sessions_ref.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_secs(300)).await;
                if let Err(e) = sessions_ref2.save(&path).await {
                    tracing::warn!(%path, "Could not save sessions: {e:#}");
                }
            }
        });

        sessions_ref
    }

    pub async fn save(&self, path: &str) -> anyhow::Result<()> {
        let now = Utc::now();
        self.sessions.retain(|_, s| !s.is_expired(now));
        let sessions_text = serde_json::to_string(self)?;
        tokio::fs::write(path, sessions_text).await?;
        Ok(())
    }

    /// Start a new session for a signed-in user.
    pub fn open(&self, principal: Principal) -> UserSession {
        let id: [u8; 32] = rand::thread_rng().gen();
        let session = UserSession {
            id: hex::encode(id),
            principal,
            created_at: Utc::now(),
        };
        self.sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// An expired session is removed and reported as missing.
    pub fn get(&self, id: &str) -> Option<UserSession> {
        let session = self.sessions.get(id).map(|s| s.value().clone())?;
        if session.is_expired(Utc::now()) {
            self.sessions.remove(id);
            return None;
        }
        Some(session)
    }

    pub fn close_all_for(&self, user_id: &str) {
        self.sessions.retain(|_, s| s.principal.id != user_id);
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserSession
where
    Authenticator: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Extract the session cookie and look up the user session in the session store (infallible)
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .unwrap_or_default();

        let no = |msg: &str| WebError::Auth(msg.into());
        let session_id = jar.get(SESSION_COOKIE).ok_or(no("Not signed in"))?;
        let auth = Authenticator::from_ref(state);
        auth.sessions
            .get(session_id.value())
            .ok_or(no("Session expired or signed out"))
    }
}
