use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

pub type AccessToken = String;

/// Bearer token issued by the provider together with its absolute expiration time.
#[derive(Clone, PartialEq)]
pub struct Token {
    access_token: AccessToken,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(access_token: AccessToken, expires_at: DateTime<Utc>) -> Self {
        Token {
            access_token,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is considered expired once `now` is within `renewal_buffer` of its expiration.
    pub fn is_expired_at(&self, now: DateTime<Utc>, renewal_buffer: TimeDelta) -> bool {
        now >= self.expires_at - renewal_buffer
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<hidden>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of the current time, so expiration checks can be driven from tests.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
