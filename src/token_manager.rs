use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use crate::authenticator::Authenticator;
use crate::cache::CredentialCache;
use crate::config::Credentials;
use crate::error::ClientError;
use crate::token::Token;
use crate::TokenProvider;

/// Hands out valid tokens, authenticating only when the cache has none.
///
/// Checking the cache and renewing the token happen under a single lock so concurrent callers
/// never authenticate twice for the same expiration.
pub struct TokenManager<A, C>
where
    A: Authenticator,
    C: CredentialCache,
{
    authenticator: A,
    cache: C,
    credentials: Credentials,
    refresh_lock: Mutex<()>,
}

impl<A, C> fmt::Debug for TokenManager<A, C>
where
    A: Authenticator,
    C: CredentialCache,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("username", &self.credentials.username)
            .field("authenticator", &"impl Authenticator")
            .field("cache", &"impl CredentialCache")
            .finish()
    }
}

impl<A, C> TokenManager<A, C>
where
    A: Authenticator,
    C: CredentialCache,
{
    pub fn new(authenticator: A, cache: C, credentials: Credentials) -> Self {
        Self {
            authenticator,
            cache,
            credentials,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Authenticates and stores the new token. Nothing is cached if authentication fails.
    fn renew(&self) -> Result<Token, ClientError> {
        let token = self.authenticator.authenticate(&self.credentials)?;
        self.cache.set(&token);
        debug!("authorization token refreshed");
        Ok(token)
    }
}

impl<A, C> TokenProvider for TokenManager<A, C>
where
    A: Authenticator,
    C: CredentialCache,
{
    fn get_valid_token(&self) -> Result<Token, ClientError> {
        // The lock guards no data, a panic while holding it cannot leave anything inconsistent.
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match self.cache.get() {
            Some(token) => Ok(token),
            None => self.renew(),
        }
    }

    fn force_refresh(&self) -> Result<Token, ClientError> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        info!("forcing token refresh");
        self.cache.invalidate();
        self.renew()
    }
}
