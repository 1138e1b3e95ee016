use tracing::{debug, warn};

use quill_types::api::UserResponse;
use quill_types::models::Role;

use crate::client::ApiClient;
use crate::error::ClientResult;

/// A validated bearer token paired with the account it belongs to.
///
/// A session only exists once the server has accepted the token, so a
/// stale or revoked token never produces one.
#[derive(Debug, Clone)]
pub struct Session {
    client: ApiClient,
    token: String,
    user: UserResponse,
}

impl Session {
    /// Restores a session from a stored token by asking `/auth/me` who it
    /// belongs to. On failure the token is dropped and the error returned.
    pub async fn init(client: ApiClient, token: impl Into<String>) -> ClientResult<Self> {
        let token = token.into();
        match client.me(&token).await {
            Ok(user) => {
                debug!("Session restored for {}", user.email);
                Ok(Self {
                    client,
                    token,
                    user,
                })
            }
            Err(e) => {
                warn!("Stored token rejected: {}", e);
                Err(e)
            }
        }
    }

    pub async fn login(client: ApiClient, email: &str, password: &str) -> ClientResult<Self> {
        let resp = client.login(email, password).await?;
        debug!("Logged in as {}", resp.user.email);
        Ok(Self {
            client,
            token: resp.token,
            user: resp.user,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &UserResponse {
        &self.user
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    /// Re-reads the account, picking up role or profile changes made
    /// elsewhere.
    pub async fn refresh(&mut self) -> ClientResult<&UserResponse> {
        self.user = self.client.me(&self.token).await?;
        Ok(&self.user)
    }

    pub fn logout(self) -> ApiClient {
        debug!("Logged out {}", self.user.email);
        self.client
    }
}
