//! Transport rule configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trigger patterns selecting a transport rule
///
/// Each non-empty field is a regular expression matched (unanchored) against
/// the request method, path and raw query string. Empty fields match anything.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Triggers {
    /// Pattern for the HTTP method
    pub method: String,
    /// Pattern for the request path
    pub path: String,
    /// Pattern for the raw query string
    pub query_param: String,
}

impl Triggers {
    /// Triggers matching only the given method pattern
    pub fn method(pattern: impl Into<String>) -> Self {
        Self {
            method: pattern.into(),
            ..Default::default()
        }
    }

    /// True when no trigger is declared
    pub fn is_empty(&self) -> bool {
        self.method.is_empty() && self.path.is_empty() && self.query_param.is_empty()
    }
}

/// HTTP client tuning applied to requests matching a rule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TuningProfile {
    /// Idle connections kept per backend host
    pub max_idle_conns_per_host: usize,
    /// Idle connection lifetime in milliseconds (0 = no limit)
    pub idle_conn_timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Whole-request timeout in milliseconds (unset = no limit)
    pub request_timeout_ms: Option<u64>,
    /// Close connections after every request
    pub disable_keep_alives: bool,
}

impl Default for TuningProfile {
    fn default() -> Self {
        Self {
            max_idle_conns_per_host: 100,
            idle_conn_timeout_ms: 90_000,
            connect_timeout_ms: 5_000,
            request_timeout_ms: None,
            disable_keep_alives: false,
        }
    }
}

impl TuningProfile {
    /// Client builder configured with this profile
    ///
    /// Redirects are never followed: a backend's redirect is a response to
    /// pass back to the client.
    pub fn client_builder(&self) -> reqwest::ClientBuilder {
        let idle_per_host = if self.disable_keep_alives {
            0
        } else {
            self.max_idle_conns_per_host
        };
        let idle_timeout = match self.idle_conn_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(idle_per_host)
            .pool_idle_timeout(idle_timeout)
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::none());
        if let Some(ms) = self.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        builder
    }
}

/// A named transport rule: triggers plus the tuning they select
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransportRule {
    /// Rule name, used in logs and errors
    pub name: String,
    /// Trigger patterns; none declared makes this a default rule
    #[serde(default)]
    pub triggers: Triggers,
    /// Client tuning
    #[serde(default)]
    pub tuning: TuningProfile,
}

impl TransportRule {
    /// Rule with default tuning
    pub fn new(name: impl Into<String>, triggers: Triggers) -> Self {
        Self {
            name: name.into(),
            triggers,
            tuning: TuningProfile::default(),
        }
    }

    /// Replace the tuning profile
    pub fn with_tuning(mut self, tuning: TuningProfile) -> Self {
        self.tuning = tuning;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_deserialize_with_defaults() {
        let rule: TransportRule = serde_json::from_str(
            r#"{"name": "listing", "triggers": {"method": "GET", "query_param": "list-type"}}"#,
        )
        .unwrap();
        assert_eq!(rule.name, "listing");
        assert_eq!(rule.triggers.method, "GET");
        assert_eq!(rule.triggers.path, "");
        assert_eq!(rule.tuning, TuningProfile::default());
        assert!(!rule.triggers.is_empty());

        let rule: TransportRule = serde_json::from_str(r#"{"name": "default"}"#).unwrap();
        assert!(rule.triggers.is_empty());
    }

    #[test]
    fn test_client_builder_builds() {
        let profile = TuningProfile {
            request_timeout_ms: Some(30_000),
            idle_conn_timeout_ms: 0,
            disable_keep_alives: true,
            ..Default::default()
        };
        assert!(profile.client_builder().build().is_ok());
    }
}
