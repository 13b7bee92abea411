//! Requests the worker must never intercept.
//!
//! Authentication and payment flows, other origins, and browser-internal
//! schemes go straight to the network and never touch the cache.

use tether_core::AppConfig;
use tether_core::config::{DEFAULT_EXCLUDED_PATH_PREFIXES, DEFAULT_EXCLUDED_SCHEMES};
use url::{Origin, Url};

/// Why a request bypasses the worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Exclusion {
    #[error("excluded path prefix: {0}")]
    PathPrefix(String),

    #[error("cross-origin request to {0}")]
    CrossOrigin(String),

    #[error("non-network scheme: {0}")]
    Scheme(String),
}

/// Path-prefix, origin and scheme predicates for bypassing the worker.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    origin: Origin,
    path_prefixes: Vec<String>,
    schemes: Vec<String>,
}

impl ExclusionRules {
    /// Rules with the default prefix and scheme tables for `origin`.
    pub fn new(origin: &Url) -> Self {
        Self {
            origin: origin.origin(),
            path_prefixes: DEFAULT_EXCLUDED_PATH_PREFIXES.iter().map(|s| s.to_string()).collect(),
            schemes: DEFAULT_EXCLUDED_SCHEMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Rules taken from configuration.
    pub fn from_config(origin: &Url, config: &AppConfig) -> Self {
        Self {
            origin: origin.origin(),
            path_prefixes: config.excluded_path_prefixes.clone(),
            schemes: config.excluded_schemes.clone(),
        }
    }

    /// Return the first rule that excludes `url`, if any.
    pub fn check(&self, url: &Url) -> Option<Exclusion> {
        let path = url.path();
        if let Some(prefix) = self.path_prefixes.iter().find(|p| path.starts_with(p.as_str())) {
            return Some(Exclusion::PathPrefix(prefix.clone()));
        }

        if self.schemes.iter().any(|s| s == url.scheme()) {
            return Some(Exclusion::Scheme(url.scheme().to_string()));
        }

        if url.origin() != self.origin {
            return Some(Exclusion::CrossOrigin(url.origin().ascii_serialization()));
        }

        None
    }

    pub fn is_excluded(&self, url: &Url) -> bool {
        self.check(url).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ExclusionRules {
        ExclusionRules::new(&Url::parse("https://app.example.com").unwrap())
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_auth_paths_excluded() {
        let rules = rules();
        assert_eq!(
            rules.check(&url("https://app.example.com/api/auth/session")),
            Some(Exclusion::PathPrefix("/api/auth".into()))
        );
        assert_eq!(
            rules.check(&url("https://app.example.com/auth/callback")),
            Some(Exclusion::PathPrefix("/auth".into()))
        );
    }

    #[test]
    fn test_prefix_match_is_literal() {
        // plain prefix match, not segment-aware
        assert!(rules().is_excluded(&url("https://app.example.com/authors")));
    }

    #[test]
    fn test_stripe_path_excluded() {
        assert_eq!(
            rules().check(&url("https://app.example.com/api/stripe/webhook")),
            Some(Exclusion::PathPrefix("/api/stripe".into()))
        );
    }

    #[test]
    fn test_cross_origin_excluded() {
        let rules = rules();
        assert!(matches!(rules.check(&url("https://cdn.example.com/app.js")), Some(Exclusion::CrossOrigin(_))));
        assert!(matches!(rules.check(&url("http://app.example.com/")), Some(Exclusion::CrossOrigin(_))));
        assert!(matches!(rules.check(&url("https://app.example.com:8443/")), Some(Exclusion::CrossOrigin(_))));
    }

    #[test]
    fn test_extension_scheme_excluded() {
        assert_eq!(
            rules().check(&url("chrome-extension://abcdef/content.js")),
            Some(Exclusion::Scheme("chrome-extension".into()))
        );
    }

    #[test]
    fn test_same_origin_allowed() {
        let rules = rules();
        assert_eq!(rules.check(&url("https://app.example.com/")), None);
        assert_eq!(rules.check(&url("https://app.example.com/api/programs")), None);
        assert_eq!(rules.check(&url("https://app.example.com/logo.png")), None);
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig { excluded_path_prefixes: vec!["/admin".into()], ..Default::default() };
        let rules = ExclusionRules::from_config(&url("https://app.example.com"), &config);
        assert!(rules.is_excluded(&url("https://app.example.com/admin/users")));
        assert!(!rules.is_excluded(&url("https://app.example.com/api/auth")));
    }
}
