use tokio::sync::watch;

use super::{ApiClient, ClientError};
use crate::{
    db::models::User,
    gate::{self, Access, IdentityState, Policy},
    models::Credentials,
};

/// Who is signed in, shared by everything that talks to the API.
///
/// Starts out [`IdentityState::Loading`]; [`Identity::load`] settles it.
/// Observers can follow changes through [`Identity::subscribe`].
pub struct Identity {
    api: ApiClient,
    state: watch::Sender<IdentityState>,
}

impl Identity {
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(IdentityState::Loading);
        Self { api, state }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        match &*self.state.borrow() {
            IdentityState::Ready(user) => user.clone(),
            IdentityState::Loading => None,
        }
    }

    /// Fetch the profile for the stored token.
    ///
    /// Without a token no request is made. A rejected token is removed from
    /// the store. Other failures leave the state untouched.
    pub async fn load(&self) -> Result<Option<User>, ClientError> {
        if self.api.tokens().load()?.is_none() {
            self.state.send_replace(IdentityState::Ready(None));
            return Ok(None);
        }

        match self.api.profile().await {
            Ok(user) => {
                tracing::debug!("signed in as {}", user.username);
                self.state.send_replace(IdentityState::Ready(Some(user.clone())));
                Ok(Some(user))
            }
            Err(e) if e.is_auth() => {
                tracing::warn!("stored token was rejected: {e}");
                self.api.tokens().clear()?;
                self.state.send_replace(IdentityState::Ready(None));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Option<User>, ClientError> {
        self.api.login(credentials).await?;
        self.load().await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let revoked = self.api.logout().await;
        self.state.send_replace(IdentityState::Ready(None));
        if let Err(e) = &revoked {
            tracing::warn!("logout request failed: {e}");
        }
        revoked
    }

    pub fn access(&self, policy: &Policy, path: &str) -> Access {
        gate::decide(&self.state(), policy, path)
    }
}

/// Sign in and return where to go next.
pub async fn login_flow(
    identity: &Identity,
    credentials: &Credentials,
    next: Option<&str>,
) -> Result<String, ClientError> {
    identity.login(credentials).await?;
    Ok(gate::post_login_target(next))
}
