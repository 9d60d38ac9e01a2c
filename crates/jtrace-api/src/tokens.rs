use dashmap::DashMap;
use std::time::{Duration, Instant};

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// The one live access token per username.
///
/// A JWT is only accepted while it is the token stored here, so logging in
/// again, changing the password or disabling the account revokes the old one.
pub struct TokenCache {
    entries: DashMap<String, CachedToken>,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn store(&self, username: &str, token: &str) {
        self.entries.insert(
            username.to_string(),
            CachedToken {
                token: token.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn is_current(&self, username: &str, token: &str) -> bool {
        let now = Instant::now();
        let verdict = match self.entries.get(username) {
            Some(entry) if entry.expires_at > now => Some(entry.token == token),
            Some(_) => None,
            None => return false,
        };

        match verdict {
            Some(matches) => matches,
            None => {
                self.entries.remove_if(username, |_, e| e.expires_at <= now);
                false
            }
        }
    }

    pub fn revoke(&self, username: &str) {
        self.entries.remove(username);
    }
}
