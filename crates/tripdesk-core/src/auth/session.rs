use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::CredentialSource;

/// Token expiry time in minutes.
/// The hosted auth service issues access tokens valid for one hour.
const TOKEN_EXPIRY_MINUTES: i64 = 60;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Token and user profile issued by the auth provider at sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub token: String,
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
            email: email.into(),
            display_name: None,
            role: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        Utc::now() > expiry
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at =
            self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES - TOKEN_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        let expiry = self.created_at + Duration::minutes(TOKEN_EXPIRY_MINUTES);
        expiry - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// The signed-in user's session, shared between the login flow (which
/// writes it) and the sync layer (which reads the token).
#[derive(Debug, Default)]
pub struct Session {
    data: RwLock<Option<SessionData>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: SessionData) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }

    /// Replace the session after sign-in or token renewal.
    pub async fn update(&self, data: SessionData) {
        info!(user_id = %data.user_id, "Session updated");
        *self.data.write().await = Some(data);
    }

    /// Sign out.
    pub async fn clear(&self) {
        if self.data.write().await.take().is_some() {
            info!("Session cleared");
        }
    }

    /// Snapshot of the current session, expired or not.
    pub async fn data(&self) -> Option<SessionData> {
        self.data.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<String> {
        self.data.read().await.as_ref().map(|d| d.user_id.clone())
    }

    /// Check if session is valid (exists and not expired)
    pub async fn is_valid(&self) -> bool {
        self.data
            .read()
            .await
            .as_ref()
            .map(|d| !d.is_expired())
            .unwrap_or(false)
    }
}

#[async_trait]
impl CredentialSource for Session {
    async fn token(&self) -> Option<String> {
        let guard = self.data.read().await;
        match guard.as_ref() {
            Some(d) if !d.is_expired() => Some(d.token.clone()),
            Some(_) => {
                debug!("Session token expired, fetching unauthenticated");
                None
            }
            None => None,
        }
    }
}
