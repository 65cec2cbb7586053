// src/services/rate_limit.rs
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth_limit: u32,
    pub per_ip_limit: u32,
    pub window_seconds: u32,
    pub whitelist_ips: Vec<String>,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Only safe behind a proxy
    /// that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_limit: 10,     // sign-in / sign-up attempts per window per IP
            per_ip_limit: 120,  // everything else per window per IP
            window_seconds: 60,
            whitelist_ips: vec!["127.0.0.1".to_string(), "::1".to_string()],
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // RATE_LIMIT_ENABLED - set to "false" to disable rate limiting
        if let Ok(enabled) = env::var("RATE_LIMIT_ENABLED") {
            config.enabled = enabled.to_lowercase() != "false";
        }

        if let Ok(limit) = env::var("RATE_LIMIT_AUTH") {
            if let Ok(val) = limit.parse::<u32>() {
                config.auth_limit = val;
            }
        }

        if let Ok(limit) = env::var("RATE_LIMIT_PER_IP") {
            if let Ok(val) = limit.parse::<u32>() {
                config.per_ip_limit = val;
            }
        }

        if let Ok(window) = env::var("RATE_LIMIT_WINDOW_SECONDS") {
            if let Ok(val) = window.parse::<u32>() {
                config.window_seconds = val;
            }
        }

        // RATE_LIMIT_WHITELIST_IPS - comma-separated list of whitelisted IPs
        if let Ok(whitelist) = env::var("RATE_LIMIT_WHITELIST_IPS") {
            config.whitelist_ips = whitelist
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // RATE_LIMIT_TRUST_PROXY - set to "true" when running behind a reverse proxy
        if let Ok(trust) = env::var("RATE_LIMIT_TRUST_PROXY") {
            config.trust_proxy_headers = trust.to_lowercase() == "true";
        }

        config
    }
}

/// Which budget a request draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    /// Credential submissions and account creation
    Auth,
    General,
}

impl RateScope {
    pub fn for_request(method: &axum::http::Method, path: &str) -> Self {
        let is_credential_post = *method == axum::http::Method::POST
            && (path == "/api/signup" || path == "/api/auth/callback/credentials");
        if is_credential_post {
            RateScope::Auth
        } else {
            RateScope::General
        }
    }

    fn key_prefix(&self) -> &'static str {
        match self {
            RateScope::Auth => "auth",
            RateScope::General => "ip",
        }
    }
}

#[derive(Debug, Clone)]
struct RateLimitState {
    count: u32,
    window_start: Instant,
}

impl RateLimitState {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.window_start = Instant::now();
    }

    fn is_expired(&self, window_duration: Duration) -> bool {
        self.window_start.elapsed() > window_duration
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Limited { retry_after: u32 },
}

#[derive(Debug, Clone)]
pub struct RateLimitService {
    config: RateLimitConfig,
    rate_limiter: Arc<RwLock<HashMap<String, RateLimitState>>>,
}

impl RateLimitService {
    pub fn new(config: RateLimitConfig) -> Self {
        info!(
            enabled = config.enabled,
            auth_limit = config.auth_limit,
            per_ip_limit = config.per_ip_limit,
            window_seconds = config.window_seconds,
            whitelist_ips = ?config.whitelist_ips,
            trust_proxy_headers = config.trust_proxy_headers,
            "Initializing RateLimitService"
        );
        Self {
            config,
            rate_limiter: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn is_whitelisted(&self, ip: &str) -> bool {
        self.config.whitelist_ips.iter().any(|whitelisted| whitelisted == ip)
    }

    /// Check the rate limit for a client IP within a scope
    pub async fn check_rate_limit(&self, ip_address: &str, scope: RateScope) -> RateLimitResult {
        if !self.config.enabled || self.is_whitelisted(ip_address) {
            return RateLimitResult::Allowed;
        }

        let limit = match scope {
            RateScope::Auth => self.config.auth_limit,
            RateScope::General => self.config.per_ip_limit,
        };
        let window_duration = self.window_duration();
        let key = format!("{}:{}", scope.key_prefix(), ip_address);

        self.check_limit_for_key(&key, limit, window_duration).await
    }

    async fn check_limit_for_key(
        &self,
        key: &str,
        limit: u32,
        window_duration: Duration,
    ) -> RateLimitResult {
        let mut limiter = self.rate_limiter.write().await;

        let state = limiter
            .entry(key.to_string())
            .or_insert_with(RateLimitState::new);

        if state.is_expired(window_duration) {
            state.reset();
        }

        if state.count >= limit {
            let elapsed = state.window_start.elapsed().as_secs() as u32;
            let retry_after = (window_duration.as_secs() as u32).saturating_sub(elapsed).max(1);
            return RateLimitResult::Limited { retry_after };
        }

        state.count += 1;
        RateLimitResult::Allowed
    }

    fn window_duration(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds as u64)
    }

    /// Drop entries whose window has passed. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let window_duration = self.window_duration();
        let mut limiter = self.rate_limiter.write().await;
        let before = limiter.len();
        limiter.retain(|_, state| !state.is_expired(window_duration));
        let removed = before - limiter.len();
        if removed > 0 {
            debug!(removed, remaining = limiter.len(), "Cleaned up expired rate limit entries");
        }
        removed
    }

    /// Number of tracked client windows
    pub async fn tracked_entries(&self) -> usize {
        self.rate_limiter.read().await.len()
    }

    /// Start background task that sweeps expired entries once per window
    pub fn start_cleanup_task(service: Arc<RateLimitService>) {
        let period = service.window_duration().max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                service.cleanup_expired().await;
            }
        });
    }

    pub fn log_violation(&self, ip_address: &str, endpoint: &str) {
        warn!(
            ip_address = %ip_address,
            endpoint = %endpoint,
            "Rate limit violation detected"
        );
    }
}
