use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
// Using tokio's Instant keeps expiry arithmetic testable with a paused clock.
use tokio::time::Instant;

/// How many characters of the secret may appear in logs.
const PREVIEW_LEN: usize = 10;

/// The bearer token we hold for the upstream API.
///
/// Immutable once created; a refresh replaces it wholesale rather than
/// mutating it in place.
#[derive(Debug, Clone)]
pub struct BearerToken {
    pub secret: String,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

impl BearerToken {
    pub fn new(secret: String, ttl: Duration) -> Self {
        let issued_at = Instant::now();
        BearerToken {
            secret,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    /// A token past its expiry must not be sent upstream.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// True once the token is within `margin` of expiring, i.e. the point
    /// at which the background loop renews it proactively.
    pub fn refresh_due(&self, now: Instant, margin: Duration) -> bool {
        match self.expires_at.checked_sub(margin) {
            Some(deadline) => now >= deadline,
            None => true,
        }
    }

    /// The point in time at which a proactive refresh should run.
    pub fn refresh_deadline(&self, margin: Duration) -> Instant {
        self.expires_at.checked_sub(margin).unwrap_or(self.issued_at)
    }

    pub fn ttl(&self) -> Duration {
        self.expires_at - self.issued_at
    }

    /// Loggable form of the secret. The full value never hits the logs.
    pub fn preview(&self) -> String {
        let head: String = self.secret.chars().take(PREVIEW_LEN).collect();
        format!("{}...", head)
    }
}

/// Classification of the stored token at a given instant.
pub enum TokenStatus {
    /// No token has ever been stored.
    Empty,
    Fresh(BearerToken),
    Stale(BearerToken),
}

/// The shared slot holding the current token.
///
/// Many readers, one writer (whichever task runs the current refresh).
/// Replacement swaps the whole value under the write lock, so a reader can
/// never observe a half-updated token.
#[derive(Clone, Default)]
pub struct TokenCell {
    slot: Arc<RwLock<Option<BearerToken>>>,
}

impl TokenCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replaces the stored token; visible to all subsequent reads.
    pub async fn replace(&self, token: BearerToken) {
        *self.slot.write().await = Some(token);
    }

    /// A snapshot of the current token, if any.
    pub async fn current(&self) -> Option<BearerToken> {
        self.slot.read().await.clone()
    }

    /// One locked read that also classifies staleness, so callers decide
    /// what to do without re-reading.
    pub async fn status(&self, now: Instant) -> TokenStatus {
        match self.slot.read().await.as_ref() {
            None => TokenStatus::Empty,
            Some(token) if token.is_expired(now) => TokenStatus::Stale(token.clone()),
            Some(token) => TokenStatus::Fresh(token.clone()),
        }
    }
}

/// Wire shape both the login and the refresh endpoint respond with.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    /// Validity in seconds from now.
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A replaced token is immediately visible to readers.
    #[tokio::test]
    async fn test_replace_is_visible() {
        let cell = TokenCell::new();
        assert!(cell.current().await.is_none());

        cell.replace(BearerToken::new("first".into(), Duration::from_secs(60)))
            .await;
        let current = cell.current().await.expect("token should be stored");
        assert_eq!(current.secret, "first");

        cell.replace(BearerToken::new("second".into(), Duration::from_secs(60)))
            .await;
        let current = cell.current().await.expect("token should be stored");
        assert_eq!(current.secret, "second");
    }

    /// Status classification follows the clock.
    #[tokio::test(start_paused = true)]
    async fn test_status_tracks_expiry() {
        let cell = TokenCell::new();
        assert!(matches!(cell.status(Instant::now()).await, TokenStatus::Empty));

        cell.replace(BearerToken::new("tok".into(), Duration::from_secs(300)))
            .await;
        assert!(matches!(
            cell.status(Instant::now()).await,
            TokenStatus::Fresh(_)
        ));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(matches!(
            cell.status(Instant::now()).await,
            TokenStatus::Stale(_)
        ));
    }

    /// The refresh deadline sits `margin` before expiry and the due check
    /// flips exactly there.
    #[tokio::test(start_paused = true)]
    async fn test_refresh_due_margin() {
        let token = BearerToken::new("tok".into(), Duration::from_secs(300));
        let margin = Duration::from_secs(60);

        assert!(!token.refresh_due(Instant::now(), margin));

        tokio::time::advance(Duration::from_secs(240)).await;
        assert!(token.refresh_due(Instant::now(), margin));
        assert!(!token.is_expired(Instant::now()));
    }

    /// Only a short prefix of the secret is ever rendered.
    #[test]
    fn test_preview_truncates() {
        let token = BearerToken::new(
            "abcdefghijklmnopqrstuvwxyz".into(),
            Duration::from_secs(1),
        );
        assert_eq!(token.preview(), "abcdefghij...");

        let short = BearerToken::new("abc".into(), Duration::from_secs(1));
        assert_eq!(short.preview(), "abc...");
    }
}
