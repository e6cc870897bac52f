//! Responder-side access policy.
//!
//! A policy is an ordered list of rules. The first rule whose origin
//! matcher matches the sender governs the message — order matters when
//! matchers overlap, and that is deliberate: put the narrow rule first.
//! An origin matching no rule gets nothing (fail closed).

use regex::Regex;
use serde::Deserialize;

use xdstore_protocol::{DenialCode, Method, Namespace};

/// A single access rule.
///
/// `methods`/`namespaces` of `None` mean "all" — a configured origin is
/// fully trusted unless narrowed explicitly.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawAccessRule")]
pub struct AccessRule {
    origin: Regex,
    methods: Option<Vec<Method>>,
    namespaces: Option<Vec<Namespace>>,
}

/// Serde-facing shape of a rule, with the origin matcher as a pattern string.
#[derive(Debug, Deserialize)]
struct RawAccessRule {
    origin: String,
    #[serde(default)]
    methods: Option<Vec<Method>>,
    #[serde(default)]
    namespaces: Option<Vec<Namespace>>,
}

impl TryFrom<RawAccessRule> for AccessRule {
    type Error = regex::Error;

    fn try_from(raw: RawAccessRule) -> Result<Self, Self::Error> {
        Ok(Self {
            origin: Regex::new(&raw.origin)?,
            methods: raw.methods,
            namespaces: raw.namespaces,
        })
    }
}

impl AccessRule {
    /// Rule matching `pattern` against sender origins, allowing everything.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            origin: Regex::new(pattern)?,
            methods: None,
            namespaces: None,
        })
    }

    /// Narrow the rule to the given methods.
    pub fn allow_methods(mut self, methods: impl Into<Vec<Method>>) -> Self {
        self.methods = Some(methods.into());
        self
    }

    /// Narrow the rule to the given namespaces.
    pub fn allow_namespaces(mut self, namespaces: impl Into<Vec<Namespace>>) -> Self {
        self.namespaces = Some(namespaces.into());
        self
    }

    fn matches_origin(&self, origin: &str) -> bool {
        self.origin.is_match(origin)
    }

    fn allows_method(&self, method: Method) -> bool {
        match &self.methods {
            Some(allowed) => allowed.contains(&method),
            None => true,
        }
    }

    fn allows_namespace(&self, namespace: Namespace) -> bool {
        match &self.namespaces {
            Some(allowed) => allowed.contains(&namespace),
            None => true,
        }
    }
}

/// Outcome of evaluating a request against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Denied { code: DenialCode, reason: String },
}

/// Ordered access policy.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    rules: Vec<AccessRule>,
}

impl Policy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// Evaluate one request. First rule matching the origin governs it.
    pub fn evaluate(&self, origin: &str, method: Method, namespace: Namespace) -> PolicyDecision {
        let Some(rule) = self.rules.iter().find(|r| r.matches_origin(origin)) else {
            return PolicyDecision::Denied {
                code: DenialCode::OriginNotAllowed,
                reason: format!("origin not allowed ({origin})"),
            };
        };

        if !rule.allows_method(method) {
            return PolicyDecision::Denied {
                code: DenialCode::MethodNotAllowed,
                reason: format!("method not allowed ({method})"),
            };
        }

        if !rule.allows_namespace(namespace) {
            return PolicyDecision::Denied {
                code: DenialCode::NamespaceNotAllowed,
                reason: format!("storage type not allowed ({namespace})"),
            };
        }

        PolicyDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn denied_with(decision: PolicyDecision, expected: DenialCode) {
        match decision {
            PolicyDecision::Denied { code, .. } => assert_eq!(code, expected),
            other => panic!("expected denial {expected:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_unconfigured_origin_denied() {
        let policy = Policy::new(vec![AccessRule::new(r"^https://a\.test$").unwrap()]);
        denied_with(
            policy.evaluate("https://evil.test", Method::Get, Namespace::Local),
            DenialCode::OriginNotAllowed,
        );
    }

    #[test]
    fn test_empty_policy_denies_everything() {
        let policy = Policy::default();
        denied_with(
            policy.evaluate("https://a.test", Method::Get, Namespace::Local),
            DenialCode::OriginNotAllowed,
        );
    }

    #[test]
    fn test_defaults_allow_all_methods_and_namespaces() {
        let policy = Policy::new(vec![AccessRule::new(r"^https://a\.test$").unwrap()]);
        for method in [Method::Get, Method::Set, Method::Remove] {
            for namespace in [Namespace::Local, Namespace::Session] {
                assert_eq!(
                    policy.evaluate("https://a.test", method, namespace),
                    PolicyDecision::Allowed
                );
            }
        }
    }

    #[test]
    fn test_method_narrowing() {
        let policy = Policy::new(vec![AccessRule::new(r"^https://a\.test$")
            .unwrap()
            .allow_methods([Method::Get])]);

        assert_eq!(
            policy.evaluate("https://a.test", Method::Get, Namespace::Local),
            PolicyDecision::Allowed
        );
        denied_with(
            policy.evaluate("https://a.test", Method::Set, Namespace::Local),
            DenialCode::MethodNotAllowed,
        );
    }

    #[test]
    fn test_namespace_narrowing() {
        let policy = Policy::new(vec![AccessRule::new(r"^https://a\.test$")
            .unwrap()
            .allow_namespaces([Namespace::Local])]);

        denied_with(
            policy.evaluate("https://a.test", Method::Get, Namespace::Session),
            DenialCode::NamespaceNotAllowed,
        );
    }

    /// Overlapping matchers resolve to the first rule in configured order,
    /// even when a later rule would be more permissive.
    #[test]
    fn test_first_match_wins() {
        let policy = Policy::new(vec![
            AccessRule::new(r"sub\.example\.test$")
                .unwrap()
                .allow_methods([Method::Get]),
            AccessRule::new(r"example\.test$").unwrap(),
        ]);

        // Governed by the narrow first rule, not the permissive second.
        denied_with(
            policy.evaluate("https://sub.example.test", Method::Set, Namespace::Local),
            DenialCode::MethodNotAllowed,
        );
        // Other subdomains fall through to the second rule.
        assert_eq!(
            policy.evaluate("https://www.example.test", Method::Set, Namespace::Local),
            PolicyDecision::Allowed
        );
    }

    #[test]
    fn test_rule_deserializes_from_config() {
        let raw = r#"{"origin": "^https://a\\.test$", "methods": ["get"]}"#;
        let rule: AccessRule = serde_json::from_str(raw).unwrap();
        assert!(rule.matches_origin("https://a.test"));
        assert!(rule.allows_method(Method::Get));
        assert!(!rule.allows_method(Method::Set));
        assert!(rule.allows_namespace(Namespace::Session));

        // Invalid pattern surfaces as a deserialization error.
        let bad = r#"{"origin": "("}"#;
        assert!(serde_json::from_str::<AccessRule>(bad).is_err());
    }
}
