use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota};
use nonzero_ext::nonzero;
use once_cell::sync::Lazy;
use rand::{thread_rng, Rng};
use regex::Regex;
use serde::Serialize;
use std::time::{Duration, Instant};

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("script pattern"));
static JS_PROTOCOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("protocol pattern"));
static EVENT_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)on\w+\s*=").expect("handler pattern"));
static ANGLE_BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[<>]").expect("bracket pattern"));

pub const SESSION_LIFETIME_HOURS: i64 = 24;

pub type KeyedLimiter = governor::RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// 30 new sessions per minute per client address.
pub fn session_issue_limiter() -> KeyedLimiter {
    governor::RateLimiter::keyed(Quota::per_minute(nonzero!(30u32)))
}

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
script-src 'self' 'unsafe-inline' https://checkout.razorpay.com https://api.razorpay.com; \
style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; \
font-src 'self' https://fonts.gstatic.com; \
img-src 'self' data: https: blob:; \
connect-src 'self' https://api.razorpay.com https://checkout.razorpay.com wss:; \
frame-src 'self' https://api.razorpay.com; \
object-src 'none'; \
base-uri 'self'; \
form-action 'self'";

/// Strips script blocks, `javascript:` schemes, inline `on*=` handlers and
/// angle brackets, then trims.
pub fn sanitize_input(input: &str) -> String {
    let without_scripts = SCRIPT_TAG.replace_all(input, "");
    let without_protocol = JS_PROTOCOL.replace_all(&without_scripts, "");
    let without_handlers = EVENT_HANDLER.replace_all(&without_protocol, "");
    let without_brackets = ANGLE_BRACKETS.replace_all(&without_handlers, "");
    without_brackets.trim().to_string()
}

pub fn escape_html(unsafe_text: &str) -> String {
    let mut escaped = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitRecord {
    pub count: u32,
    pub reset_at: Instant,
}

/// Fixed-window limiter. Only useful when callers key it by a stable identity
/// such as the client address; a fresh key is always allowed.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<String, RateLimitRecord>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, identifier: &str, max_requests: u32, window: Duration) -> bool {
        self.check_at(identifier, max_requests, window, Instant::now())
    }

    pub fn check_at(&self, identifier: &str, max_requests: u32, window: Duration, now: Instant) -> bool {
        let mut entry = self
            .windows
            .entry(identifier.to_string())
            .or_insert(RateLimitRecord { count: 0, reset_at: now + window });
        let record = entry.value_mut();

        if record.count == 0 || now > record.reset_at {
            *record = RateLimitRecord { count: 1, reset_at: now + window };
            return true;
        }

        if record.count >= max_requests {
            return false;
        }

        record.count += 1;
        true
    }

    /// Gives back a slot taken by `check` for an attempt that failed on our side.
    pub fn release(&self, identifier: &str) {
        if let Some(mut record) = self.windows.get_mut(identifier) {
            record.count = record.count.saturating_sub(1);
        }
    }

    pub fn record(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.windows.get(identifier).map(|r| *r.value())
    }

    /// Drops windows that have already reset. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, record| now <= record.reset_at);
        before - self.windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

pub fn generate_csrf_token() -> String {
    let token_bytes: [u8; 32] = thread_rng().gen(); // 256-bit secure random
    hex::encode(token_bytes)
}

#[derive(Debug, Clone, Serialize)]
pub struct SecuritySession {
    pub session_id: String,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SecuritySession {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, SecuritySession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&self) -> SecuritySession {
        self.create_session_at(Utc::now())
    }

    pub fn create_session_at(&self, now: DateTime<Utc>) -> SecuritySession {
        let session = SecuritySession {
            session_id: generate_csrf_token(),
            csrf_token: generate_csrf_token(),
            expires_at: now + ChronoDuration::hours(SESSION_LIFETIME_HOURS),
        };
        self.sessions.insert(session.session_id.clone(), session.clone());
        session
    }

    pub fn validate_session(&self, session_id: &str) -> bool {
        self.validate_session_at(session_id, Utc::now())
    }

    /// Expired sessions are dropped on the first failed check.
    pub fn validate_session_at(&self, session_id: &str, now: DateTime<Utc>) -> bool {
        let valid = match self.sessions.get(session_id) {
            Some(session) => session.is_valid_at(now),
            None => return false,
        };
        if !valid {
            self.sessions.remove(session_id);
        }
        valid
    }

    pub fn is_live(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Removes every session expired at `now`. Returns how many were removed.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_valid_at(now));
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn verify_csrf(&self, session_id: &str, csrf_token: &str) -> bool {
        if !self.validate_session(session_id) {
            return false;
        }
        self.sessions
            .get(session_id)
            .map(|session| session.csrf_token == csrf_token)
            .unwrap_or(false)
    }
}

/// Writes a structured audit record on the `security` target and leaves a
/// breadcrumb for Sentry.
pub fn log_security_event(event: &str, details: serde_json::Value, user_agent: &str, url: &str) {
    let timestamp = Utc::now().to_rfc3339();
    tracing::warn!(
        target: "security",
        timestamp = %timestamp,
        event = event,
        details = %details,
        user_agent = user_agent,
        url = url,
        "Security event"
    );
    sentry::add_breadcrumb(sentry::Breadcrumb {
        category: Some("security".to_string()),
        message: Some(format!("{}: {}", event, details)),
        level: sentry::Level::Warning,
        ..Default::default()
    });
}
