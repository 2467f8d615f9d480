use std::time::Duration;
use tokio::time::Instant;

/// How far ahead of its expiry a token is already treated as stale.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// A bearer token together with the instant it stops being accepted.
///
/// A fresh lease holds nothing and is never usable.
#[derive(Debug, Default)]
pub struct TokenLease {
    token: Option<String>,
    expires_at: Option<Instant>,
}

impl TokenLease {
    /// The token, if it stays valid for longer than the safety margin.
    pub fn usable_token(&self, now: Instant) -> Option<&str> {
        match self.expires_at {
            Some(expires_at) if expires_at > now + SAFETY_MARGIN => self.token.as_deref(),
            _ => None,
        }
    }

    pub fn renew(&mut self, token: String, lifetime: Duration, now: Instant) {
        self.token = Some(token);
        self.expires_at = Some(now + lifetime);
    }

    /// Drops the lease if it still holds `token`. A token that was already
    /// replaced by a concurrent refresh is left alone.
    pub fn invalidate(&mut self, token: &str) {
        if self.token.as_deref() == Some(token) {
            self.token = None;
            self.expires_at = None;
        }
    }
}
