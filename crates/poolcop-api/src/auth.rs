// Access-token bookkeeping.
//
// PoolCopilot exchanges the long-lived API key for a short-lived token.
// A token is good for a bounded number of requests inside a bounded time
// window; whichever runs out first ends its useful life.

use std::time::Duration;

use secrecy::SecretString;
use tokio::time::Instant;

/// Requests a single token may serve.
pub const TOKEN_REQUEST_BUDGET: u32 = 90;

/// How long a token stays valid after it was issued.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(900);

/// Renew this long before the nominal expiry to absorb clock skew and latency.
const EXPIRY_MARGIN: Duration = Duration::from_secs(10);

/// A short-lived access token plus its remaining budget.
#[derive(Debug, Clone)]
pub struct Token {
    value: SecretString,
    issued_at: Instant,
    lifetime: Duration,
    budget: u32,
    used: u32,
}

impl Token {
    /// A token issued now, with the given lifetime and the standard request budget.
    pub fn new(value: SecretString, lifetime: Duration) -> Self {
        Self::with_budget(value, lifetime, TOKEN_REQUEST_BUDGET)
    }

    pub fn with_budget(value: SecretString, lifetime: Duration, budget: u32) -> Self {
        Self {
            value,
            issued_at: Instant::now(),
            lifetime,
            budget,
            used: 0,
        }
    }

    /// Whether the token can serve one more request right now.
    pub fn is_usable(&self) -> bool {
        self.used < self.budget && Instant::now() < self.expires_at()
    }

    /// Record one request against the budget and hand out the secret.
    pub fn consume(&mut self) -> SecretString {
        self.used = self.used.saturating_add(1);
        self.value.clone()
    }

    /// Requests left before the budget is exhausted.
    pub fn remaining(&self) -> u32 {
        self.budget.saturating_sub(self.used)
    }

    fn expires_at(&self) -> Instant {
        let margin = EXPIRY_MARGIN.min(self.lifetime / 2);
        self.issued_at + self.lifetime.saturating_sub(margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(budget: u32) -> Token {
        Token::with_budget(SecretString::from("tok"), TOKEN_LIFETIME, budget)
    }

    #[tokio::test(start_paused = true)]
    async fn budget_runs_out_after_last_request() {
        let mut t = token(2);
        assert!(t.is_usable());
        let _ = t.consume();
        assert_eq!(t.remaining(), 1);
        let _ = t.consume();
        assert!(!t.is_usable());
    }

    #[tokio::test(start_paused = true)]
    async fn token_expires_before_nominal_lifetime() {
        let t = token(TOKEN_REQUEST_BUDGET);
        tokio::time::advance(TOKEN_LIFETIME - Duration::from_secs(5)).await;
        assert!(!t.is_usable());
    }

    #[tokio::test(start_paused = true)]
    async fn token_usable_well_inside_window() {
        let t = token(TOKEN_REQUEST_BUDGET);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(t.is_usable());
    }
}
