//! Rate limit rules and key strategies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::clock::duration_ms;

/// Placeholder for identity parts a caller didn't supply.
const UNKNOWN: &str = "unknown";

// == Request Identity ==
/// What the request boundary knows about a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    /// Client network address
    pub source_address: Option<String>,
    /// Route or operation name
    pub route: Option<String>,
    /// Authenticated subject (user id, api key, ...)
    pub subject: Option<String>,
    /// Identifier submitted with the request, e.g. a login name
    pub identifier: Option<String>,
}

impl RequestIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity made of a subject only.
    pub fn subject(subject: impl Into<String>) -> Self {
        Self::new().with_subject(subject)
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

fn part(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNKNOWN)
}

// == Key Strategy ==
/// Derives the window key from a request identity.
#[derive(Clone)]
pub enum KeyStrategy {
    /// Subject alone, falling back to the source address
    Subject,
    /// Source address alone
    SourceAddress,
    /// Source address plus submitted identifier (login attempts)
    AddressAndIdentifier,
    /// Source address, route and subject (general API traffic)
    AddressRouteSubject,
    /// Caller-provided derivation
    Custom(Arc<dyn Fn(&RequestIdentity) -> String + Send + Sync>),
}

impl KeyStrategy {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&RequestIdentity) -> String + Send + Sync + 'static,
    {
        KeyStrategy::Custom(Arc::new(f))
    }

    // == Derive Key ==
    pub fn derive(&self, identity: &RequestIdentity) -> String {
        match self {
            KeyStrategy::Subject => identity
                .subject
                .as_deref()
                .or(identity.source_address.as_deref())
                .unwrap_or(UNKNOWN)
                .to_string(),
            KeyStrategy::SourceAddress => part(&identity.source_address).to_string(),
            KeyStrategy::AddressAndIdentifier => format!(
                "{}:{}",
                part(&identity.source_address),
                part(&identity.identifier)
            ),
            KeyStrategy::AddressRouteSubject => format!(
                "{}:{}:{}",
                part(&identity.source_address),
                part(&identity.route),
                part(&identity.subject)
            ),
            KeyStrategy::Custom(f) => f(identity),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            KeyStrategy::Subject => "subject",
            KeyStrategy::SourceAddress => "source_address",
            KeyStrategy::AddressAndIdentifier => "address_and_identifier",
            KeyStrategy::AddressRouteSubject => "address_route_subject",
            KeyStrategy::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// == Rate Limit Rule ==
/// A named limit: at most `max_requests` per trailing `window`.
#[derive(Debug, Clone)]
pub struct RateLimitRule {
    pub name: String,
    pub window: Duration,
    pub max_requests: u32,
    pub key_strategy: KeyStrategy,
}

impl RateLimitRule {
    pub fn new(
        name: impl Into<String>,
        window: Duration,
        max_requests: u32,
        key_strategy: KeyStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            window,
            max_requests,
            key_strategy,
        }
    }

    pub fn window_ms(&self) -> u64 {
        duration_ms(self.window)
    }

    /// Key of the window this identity falls into, namespaced by rule.
    pub fn window_key(&self, identity: &RequestIdentity) -> String {
        format!("{}:{}", self.name, self.key_strategy.derive(identity))
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            name: self.name.clone(),
            window_ms: self.window_ms(),
            max_requests: self.max_requests,
            key_strategy: self.key_strategy.label().to_string(),
        }
    }

    // == Default Rules ==
    /// Login attempts: 5 per 15 minutes per address and submitted login.
    pub fn auth() -> Self {
        Self::new("auth", Duration::from_secs(15 * 60), 5, KeyStrategy::AddressAndIdentifier)
    }

    /// General API calls: 100 per minute per address, route and subject.
    pub fn api() -> Self {
        Self::new("api", Duration::from_secs(60), 100, KeyStrategy::AddressRouteSubject)
    }

    /// Expensive generation jobs: 10 per hour per subject.
    pub fn generation() -> Self {
        Self::new("generation", Duration::from_secs(3600), 10, KeyStrategy::Subject)
    }

    pub fn defaults() -> Vec<RateLimitRule> {
        vec![Self::auth(), Self::api(), Self::generation()]
    }
}

/// Serializable description of a registered rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub name: String,
    pub window_ms: u64,
    pub max_requests: u32,
    pub key_strategy: String,
}
