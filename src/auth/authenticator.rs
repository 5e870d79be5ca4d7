//! Bot-token lifecycle against the upstream API.
//!
//! One `TokenAuthenticator` logs in at startup, hands out the current
//! bearer token to any number of concurrent callers, and keeps it fresh
//! with a background loop. However many callers observe a stale token at
//! once, at most one refresh request is ever in flight; everyone else
//! waits on that attempt and shares its outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BotAuthConfig;
use crate::metrics::{Metrics, MetricsRecorder};

use super::error::AuthError;
use super::token::{BearerToken, TokenCell, TokenResponse, TokenStatus};

/// How long shutdown waits for the refresh loop to wind down.
const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Floor for the loop's re-arm interval, so a refresh margin larger than
/// the token lifetime cannot turn the loop into a hot spin.
const MIN_WAKE_DELAY: Duration = Duration::from_secs(1);

/// Cap on a granted token lifetime. An absurd `expires_in` must not push
/// the expiry instant out of range; anything above a year is treated as a
/// year.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// What it takes for the stored token to satisfy a refresh caller. The
/// criterion travels with the attempt so the double-check under the gate
/// applies the same bar as the caller.
#[derive(Clone)]
enum Acceptable {
    /// Fresh and not within the given margin of expiry. Zero means any
    /// token that simply has not expired.
    OutsideMargin(Duration),
    /// Fresh and carrying a different secret than one upstream rejected.
    /// Wall-clock freshness is no defence against a revoked token.
    NotSecret(String),
}

/// Handle to the token lifecycle. Cheap to clone; all clones share state.
///
/// Owned by the startup wiring and passed into the HTTP client explicitly,
/// rather than living in a process-wide global.
#[derive(Clone)]
pub struct TokenAuthenticator {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    config: BotAuthConfig,
    metrics: Metrics,
    cell: TokenCell,
    /// Held across one whole refresh attempt; holding it is what makes
    /// that attempt the only one in flight.
    refresh_gate: Arc<Mutex<()>>,
    /// Count of completed attempts. Waiters watch it to learn that the
    /// attempt they queued behind has published its outcome.
    attempts: watch::Sender<u64>,
    /// Outcome of the most recent failed attempt, shared with every caller
    /// that waited on it.
    last_error: StdMutex<Option<AuthError>>,
    cancel: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl TokenAuthenticator {
    pub fn new(http: Client, config: BotAuthConfig, metrics: Metrics) -> Self {
        let (attempts, _) = watch::channel(0u64);
        TokenAuthenticator {
            inner: Arc::new(Inner {
                http,
                config,
                metrics,
                cell: TokenCell::new(),
                refresh_gate: Arc::new(Mutex::new(())),
                attempts,
                last_error: StdMutex::new(None),
                cancel: CancellationToken::new(),
                refresh_task: Mutex::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Performs the initial login and launches the background refresh loop.
    ///
    /// The login is synchronous: the service has no business serving
    /// traffic without a token, so a failure here is surfaced as
    /// `StartupFailed` for the bootstrap code to treat as fatal.
    pub async fn start(&self) -> Result<(), AuthError> {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(AuthError::StartupFailed(
                "authenticator already started".to_string(),
            ));
        }

        let token = match login_token(
            &inner.http,
            &inner.config.login_url,
            &inner.config.login,
            &inner.config.password,
        )
        .await
        {
            Ok(token) => token,
            Err(e) => {
                inner.metrics.record_token_refresh("startup", "failure");
                return Err(AuthError::StartupFailed(e));
            }
        };

        info!(
            token = %token.preview(),
            valid_for_secs = token.ttl().as_secs(),
            "Logged in to the upstream API"
        );
        inner.metrics.record_token_refresh("startup", "success");
        inner.cell.replace(token).await;

        let loop_handle = tokio::spawn(self.clone().run_refresh_loop());
        *inner.refresh_task.lock().await = Some(loop_handle);
        Ok(())
    }

    /// Returns the current token secret, refreshing first if it has gone
    /// stale. The single entry point for request-issuing code.
    pub async fn get_token(&self) -> Result<String, AuthError> {
        match self.inner.cell.status(Instant::now()).await {
            TokenStatus::Fresh(token) => return Ok(token.secret),
            TokenStatus::Empty => return Err(AuthError::NotAuthenticated),
            TokenStatus::Stale(token) => {
                debug!(token = %token.preview(), "Stored token is stale; refreshing before use");
            }
        }
        self.await_refresh("on_demand", Acceptable::OutsideMargin(Duration::ZERO))
            .await
    }

    /// A snapshot of the stored token, fresh or not.
    pub async fn current_token(&self) -> Option<BearerToken> {
        self.inner.cell.current().await
    }

    /// Replaces a token the upstream just rejected with a 401 and returns
    /// the replacement secret. When several in-flight requests hit the
    /// rejection at once they all land here and share one refresh.
    pub(crate) async fn refresh_rejected(&self, rejected: &str) -> Result<String, AuthError> {
        self.await_refresh("on_demand", Acceptable::NotSecret(rejected.to_string()))
            .await
    }

    /// Ensures one refresh attempt completes and returns its outcome. If
    /// an attempt is already in flight, joins it instead of starting
    /// another; the wait is bounded by the configured `refresh_wait` so a
    /// wedged attempt fails callers instead of blocking them forever.
    ///
    /// A completed attempt is terminal for the wait even when its token
    /// falls short of `accept`: the upstream granted what it granted, and
    /// another immediate exchange would not do better. A grant inside the
    /// caller's margin is returned as is; a grant that reissues a rejected
    /// secret fails the wait.
    async fn await_refresh(
        &self,
        trigger: &str,
        accept: Acceptable,
    ) -> Result<String, AuthError> {
        let inner = &self.inner;
        let deadline = Instant::now() + inner.config.refresh_wait();
        let mut attempts = inner.attempts.subscribe();

        loop {
            // Mark the current attempt count as seen before inspecting
            // state, so a completion between the two shows up in `changed`.
            attempts.borrow_and_update();

            // The attempt we queued behind may already have delivered.
            if let Some(token) = inner.usable_token(&accept).await {
                return Ok(token.secret);
            }

            if let Ok(guard) = inner.refresh_gate.clone().try_lock_owned() {
                // Run the attempt on a detached task: a caller dropping
                // this future must not abort a refresh that other waiters
                // are queued on.
                tokio::spawn(Inner::execute_attempt(
                    Arc::clone(inner),
                    guard,
                    trigger.to_string(),
                    accept.clone(),
                ));
            }

            match tokio::time::timeout_at(deadline, attempts.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => {
                    return Err(AuthError::RefreshFailed(format!(
                        "timed out after {}s waiting for the in-flight refresh",
                        inner.config.refresh_wait_secs
                    )));
                }
            }

            // Consume the outcome of the attempt that just completed.
            if let Some(token) = inner.usable_token(&accept).await {
                return Ok(token.secret);
            }
            if let Some(err) = inner.last_error() {
                return Err(err);
            }
            // The attempt succeeded. Its grant is final for this wait even
            // when it falls short of the bar: spawning another exchange
            // right away would just hammer the endpoint for the rest of
            // the window.
            if let TokenStatus::Fresh(token) = inner.cell.status(Instant::now()).await {
                return match &accept {
                    Acceptable::NotSecret(rejected) if token.secret == *rejected => {
                        Err(AuthError::RefreshFailed(
                            "the upstream reissued the token it had just rejected".to_string(),
                        ))
                    }
                    _ => Ok(token.secret),
                };
            }
            // No fresh token and no recorded failure: the completion
            // belonged to an older cycle. Go around until the deadline.
        }
    }

    /// Stops the background loop and waits (bounded) for it to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.refresh_task.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!("Token refresh loop stopped"),
                Ok(Err(e)) => warn!("Token refresh loop ended abnormally: {}", e),
                Err(_) => warn!(
                    "Timed out after {}s waiting for the token refresh loop",
                    SHUTDOWN_JOIN_TIMEOUT.as_secs()
                ),
            }
        }
    }

    /// Renews the token shortly before each expiry for the life of the
    /// process. Exits only on cancellation.
    async fn run_refresh_loop(self) {
        let inner = &self.inner;
        debug!("Token refresh loop started");
        loop {
            let wake = self.next_wake().await;
            tokio::select! {
                _ = inner.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(wake) => {}
            }

            // An on-demand refresh may have renewed the token while we
            // slept; if so, just re-arm on the new expiry.
            let due = match inner.cell.current().await {
                Some(token) => token.refresh_due(Instant::now(), inner.config.refresh_margin()),
                None => true,
            };
            if !due {
                continue;
            }

            if !self.refresh_with_retries().await {
                // Retry budget exhausted. Leave the stale token in place
                // and hold off until some request-triggered attempt lands
                // a fresh one, then resume the normal schedule.
                if !self.wait_for_new_token().await {
                    break;
                }
            }
        }
        debug!("Token refresh loop exited");
    }

    async fn next_wake(&self) -> Instant {
        let now = Instant::now();
        let deadline = match self.inner.cell.current().await {
            Some(token) => token.refresh_deadline(self.inner.config.refresh_margin()),
            None => now + self.inner.config.refresh_retry_delay(),
        };
        deadline.max(now + MIN_WAKE_DELAY)
    }

    /// Runs refresh attempts with a fixed delay in between, up to the
    /// configured budget. Returns false if every attempt failed.
    async fn refresh_with_retries(&self) -> bool {
        let inner = &self.inner;
        let margin = inner.config.refresh_margin();
        let max_attempts = inner.config.refresh_retries.max(1);
        for attempt in 1..=max_attempts {
            let result = tokio::select! {
                _ = inner.cancel.cancelled() => return true,
                result = self.await_refresh("background", Acceptable::OutsideMargin(margin)) => result,
            };
            match result {
                Ok(_) => return true,
                Err(e) => {
                    warn!(attempt, max_attempts, "Background token refresh failed: {}", e);
                }
            }
            if attempt < max_attempts {
                tokio::select! {
                    _ = inner.cancel.cancelled() => return true,
                    _ = tokio::time::sleep(inner.config.refresh_retry_delay()) => {}
                }
            }
        }
        warn!(
            "Token refresh retry budget exhausted; keeping the stale token until a request forces a refresh"
        );
        false
    }

    /// Parks until an attempt stores a fresh token. Returns false when
    /// cancelled instead.
    async fn wait_for_new_token(&self) -> bool {
        let inner = &self.inner;
        let mut attempts = inner.attempts.subscribe();
        loop {
            attempts.borrow_and_update();
            if let TokenStatus::Fresh(_) = inner.cell.status(Instant::now()).await {
                return true;
            }
            tokio::select! {
                _ = inner.cancel.cancelled() => return false,
                changed = attempts.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

impl Inner {
    /// The stored token, if it satisfies `accept`.
    async fn usable_token(&self, accept: &Acceptable) -> Option<BearerToken> {
        let now = Instant::now();
        match self.cell.status(now).await {
            TokenStatus::Fresh(token) => match accept {
                Acceptable::OutsideMargin(margin) if !token.refresh_due(now, *margin) => {
                    Some(token)
                }
                Acceptable::NotSecret(rejected) if token.secret != *rejected => Some(token),
                _ => None,
            },
            _ => None,
        }
    }

    fn last_error(&self) -> Option<AuthError> {
        self.last_error.lock().ok().and_then(|slot| slot.clone())
    }

    fn set_last_error(&self, error: Option<AuthError>) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = error;
        }
    }

    /// One gated refresh attempt: exchange, publish, release, in that
    /// order. Waiters observe the new state strictly before the attempt
    /// counter moves.
    async fn execute_attempt(
        inner: Arc<Inner>,
        gate: OwnedMutexGuard<()>,
        trigger: String,
        accept: Acceptable,
    ) -> Result<BearerToken, AuthError> {
        // Double-check under the gate: the previous holder may have
        // renewed the token while this attempt queued for the lock.
        if let Some(token) = inner.usable_token(&accept).await {
            drop(gate);
            return Ok(token);
        }

        let current = inner.cell.current().await;
        let renewed = match &current {
            Some(token) => {
                refresh_token(&inner.http, &inner.config.refresh_url, &token.secret).await
            }
            None => Err("no token available to refresh".to_string()),
        };

        // The refresh endpoint rejecting us does not have to be fatal: the
        // credentials may still be good, so fall back to a full login.
        let outcome = match renewed {
            Ok(token) => Ok(token),
            Err(refresh_err) => {
                warn!(trigger = %trigger, "Refresh call failed ({}); retrying with a full login", refresh_err);
                login_token(
                    &inner.http,
                    &inner.config.login_url,
                    &inner.config.login,
                    &inner.config.password,
                )
                .await
                .map_err(|login_err| {
                    AuthError::RefreshFailed(format!(
                        "refresh: {}; login fallback: {}",
                        refresh_err, login_err
                    ))
                })
            }
        };

        match &outcome {
            Ok(token) => {
                info!(
                    trigger = %trigger,
                    token = %token.preview(),
                    valid_for_secs = token.ttl().as_secs(),
                    "Upstream token renewed"
                );
                inner.cell.replace(token.clone()).await;
                inner.set_last_error(None);
                inner.metrics.record_token_refresh(&trigger, "success");
            }
            Err(e) => {
                inner.set_last_error(Some(e.clone()));
                inner.metrics.record_token_refresh(&trigger, "failure");
            }
        }

        drop(gate);
        inner.attempts.send_modify(|count| *count += 1);
        outcome
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

/// Exchanges bot credentials for a token at the login endpoint.
async fn login_token(
    http: &Client,
    url: &str,
    login: &str,
    password: &str,
) -> Result<BearerToken, String> {
    debug!("Sending login request to {}", url);
    let response = http
        .post(url)
        .json(&LoginRequest { login, password })
        .send()
        .await
        .map_err(|e| format!("Error sending login request: {}", e))?;
    token_from_response(response).await
}

/// Trades the current (possibly near-expiry) token for a renewed one.
async fn refresh_token(http: &Client, url: &str, current: &str) -> Result<BearerToken, String> {
    debug!("Sending refresh request to {}", url);
    let response = http
        .post(url)
        .bearer_auth(current)
        .send()
        .await
        .map_err(|e| format!("Error sending refresh request: {}", e))?;
    token_from_response(response).await
}

async fn token_from_response(response: reqwest::Response) -> Result<BearerToken, String> {
    let status = response.status();
    if !status.is_success() {
        return Err(format!("Unexpected status code: {}", status));
    }
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| format!("Error parsing token response: {}", e))?;
    if body.expires_in == 0 {
        return Err("Token response carried a zero lifetime".to_string());
    }
    let ttl = Duration::from_secs(body.expires_in).min(MAX_TOKEN_LIFETIME);
    Ok(BearerToken::new(body.token, ttl))
}
