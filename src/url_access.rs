//! Navigation and resource access control.
//!
//! [`UrlAccessController::decide`] walks a fixed, first-match-wins list:
//!
//! ```text
//! data: / about:blank            → Allow
//! base application domain        → Allow
//! allowed_domains                → Allow
//! blocked_domains                → Block(blocked-domain)
//! allowed_url_patterns           → Allow
//! blocked_url_patterns           → Block(blocked-pattern)
//! strict_mode ? Block(default-deny) : Allow
//! ```
//!
//! Exit detection is a separate question ([`UrlAccessController::check_exit`])
//! and only ever fires for user-initiated, main-frame, non-redirect
//! navigations so that scripted logouts and redirect chains cannot end the
//! exam on their own.

use std::fmt;

use url::Url;

use crate::rules::{RuleSet, UrlPattern, first_match, host_matches, normalize_domain};

/// One navigation as reported by the browser collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub url: String,
    pub is_main_frame: bool,
    pub is_user_gesture: bool,
    pub is_redirect: bool,
}

impl NavigationRequest {
    /// A main-frame navigation started by the user (link click, form submit).
    pub fn user_navigation(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_main_frame: true,
            is_user_gesture: true,
            is_redirect: false,
        }
    }

    /// A main-frame navigation started by script.
    pub fn scripted(url: impl Into<String>) -> Self {
        Self {
            is_user_gesture: false,
            ..Self::user_navigation(url)
        }
    }

    pub fn redirected(mut self) -> Self {
        self.is_redirect = true;
        self
    }

    pub fn in_subframe(mut self) -> Self {
        self.is_main_frame = false;
        self
    }
}

/// Why a URL was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockReason {
    BlockedDomain,
    BlockedPattern,
    DefaultDeny,
}

impl BlockReason {
    /// Explicit blocks count as unauthorized-URL violations; the strict-mode
    /// fallback does not.
    pub fn is_violation(self) -> bool {
        matches!(self, BlockReason::BlockedDomain | BlockReason::BlockedPattern)
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::BlockedDomain => write!(f, "blocked-domain"),
            BlockReason::BlockedPattern => write!(f, "blocked-pattern"),
            BlockReason::DefaultDeny => write!(f, "default-deny"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlDecision {
    Allow,
    Block(BlockReason),
}

impl UrlDecision {
    pub fn is_allowed(self) -> bool {
        self == UrlDecision::Allow
    }
}

/// Stateless URL decider. The only thing it owns is the base application
/// domain, which comes from configuration rather than the rule set.
#[derive(Debug, Clone, Default)]
pub struct UrlAccessController {
    base_domain: Option<String>,
}

impl UrlAccessController {
    pub fn new(base_domain: Option<&str>) -> Self {
        Self {
            base_domain: base_domain.and_then(normalize_domain),
        }
    }

    pub fn base_domain(&self) -> Option<&str> {
        self.base_domain.as_deref()
    }

    pub fn decide(&self, request: &NavigationRequest, rules: &RuleSet) -> UrlDecision {
        self.decide_url(&request.url, rules)
    }

    /// Same policy as [`decide`](Self::decide), for sub-resources that
    /// carry no navigation metadata.
    pub fn decide_url(&self, url: &str, rules: &RuleSet) -> UrlDecision {
        if is_trusted_synthetic(url) {
            return UrlDecision::Allow;
        }

        if let Some(host) = host_of(url) {
            if let Some(base) = &self.base_domain
                && host_matches(&host, base)
            {
                return UrlDecision::Allow;
            }
            if rules.is_domain_allowed(&host) {
                return UrlDecision::Allow;
            }
            if rules.is_domain_blocked(&host) {
                return UrlDecision::Block(BlockReason::BlockedDomain);
            }
        }

        if first_match(&rules.allowed_url_patterns, url).is_some() {
            return UrlDecision::Allow;
        }
        if first_match(&rules.blocked_url_patterns, url).is_some() {
            return UrlDecision::Block(BlockReason::BlockedPattern);
        }

        if rules.strict_mode {
            UrlDecision::Block(BlockReason::DefaultDeny)
        } else {
            UrlDecision::Allow
        }
    }

    /// Returns the first exit pattern matched by a qualifying navigation.
    pub fn check_exit<'r>(
        &self,
        request: &NavigationRequest,
        rules: &'r RuleSet,
    ) -> Option<&'r UrlPattern> {
        if !rules.exit_detection_enabled
            || !request.is_main_frame
            || !request.is_user_gesture
            || request.is_redirect
        {
            return None;
        }
        first_match(&rules.exit_patterns, &request.url)
    }
}

/// `data:` URLs and `about:blank` never leave the process.
fn is_trusted_synthetic(url: &str) -> bool {
    let url = url.trim_start();
    if starts_with_ignore_case(url, "data:") {
        return true;
    }
    starts_with_ignore_case(url, "about:blank")
        && matches!(url.as_bytes().get(11), None | Some(b'#') | Some(b'?'))
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Lower-cased host without trailing dot, if `url` parses and has one.
fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXIT: &str = "^https?://[^/]+/#/login_s$";

    fn controller() -> UrlAccessController {
        UrlAccessController::new(Some("app.exam-portal.com"))
    }

    // ── decide ────────────────────────────────────────────────────────

    #[test]
    fn test_synthetic_schemes_allowed_even_in_strict_mode() {
        let rules = RuleSet::builder()
            .strict_mode(true)
            .block_url_pattern(".*")
            .build();
        let c = controller();
        assert_eq!(c.decide_url("data:text/html,<p>hi</p>", &rules), UrlDecision::Allow);
        assert_eq!(c.decide_url("DATA:image/png;base64,AA", &rules), UrlDecision::Allow);
        assert_eq!(c.decide_url("about:blank", &rules), UrlDecision::Allow);
        assert_eq!(c.decide_url("about:blank#top", &rules), UrlDecision::Allow);
        assert_ne!(c.decide_url("about:blankety", &rules), UrlDecision::Allow);
        assert_ne!(c.decide_url("about:config", &rules), UrlDecision::Allow);
    }

    #[test]
    fn test_base_domain_and_subdomains_allowed() {
        let rules = RuleSet::builder()
            .strict_mode(true)
            .block_domain("exam-portal.com")
            .build();
        let c = controller();
        assert!(c.decide_url("https://app.exam-portal.com/q/1", &rules).is_allowed());
        assert!(c.decide_url("https://cdn.app.exam-portal.com/a.js", &rules).is_allowed());
        // The parent domain is blocked, only the base domain subtree is exempt.
        assert_eq!(
            c.decide_url("https://www.exam-portal.com/", &rules),
            UrlDecision::Block(BlockReason::BlockedDomain)
        );
    }

    #[test]
    fn test_allowed_domain_exact_and_subdomain() {
        let rules = RuleSet::builder()
            .allow_domain("exam.edu")
            .strict_mode(true)
            .build();
        let c = UrlAccessController::default();
        for url in [
            "https://exam.edu",
            "https://sub.exam.edu/page",
            "http://deep.sub.EXAM.edu:8443/x?y=1",
        ] {
            assert_eq!(c.decide_url(url, &rules), UrlDecision::Allow, "{url}");
        }
    }

    #[test]
    fn test_allowed_domain_wins_over_blocked_domain() {
        let rules = RuleSet::builder()
            .allow_domain("docs.example.com")
            .block_domain("example.com")
            .build();
        let c = UrlAccessController::default();
        assert!(c.decide_url("https://docs.example.com/", &rules).is_allowed());
        assert_eq!(
            c.decide_url("https://mail.example.com/", &rules),
            UrlDecision::Block(BlockReason::BlockedDomain)
        );
    }

    #[test]
    fn test_blocked_domain_beats_allowed_pattern() {
        let rules = RuleSet::builder()
            .block_domain("social.com")
            .allow_url_pattern("social")
            .build();
        let c = UrlAccessController::default();
        assert_eq!(
            c.decide_url("https://m.social.com/feed", &rules),
            UrlDecision::Block(BlockReason::BlockedDomain)
        );
    }

    #[test]
    fn test_allowed_pattern_beats_blocked_pattern() {
        let rules = RuleSet::builder()
            .allow_url_pattern("/public/")
            .block_url_pattern("\\.pdf$")
            .build();
        let c = UrlAccessController::default();
        assert!(c.decide_url("https://files.net/public/a.pdf", &rules).is_allowed());
        assert_eq!(
            c.decide_url("https://files.net/private/a.PDF", &rules),
            UrlDecision::Block(BlockReason::BlockedPattern)
        );
    }

    #[test]
    fn test_default_depends_on_strict_mode() {
        let c = UrlAccessController::default();
        let lax = RuleSet::builder().allow_domain("exam.edu").build();
        let strict = RuleSet::builder().allow_domain("exam.edu").strict_mode(true).build();

        assert_eq!(c.decide_url("https://other.com", &lax), UrlDecision::Allow);
        assert_eq!(
            c.decide_url("https://other.com", &strict),
            UrlDecision::Block(BlockReason::DefaultDeny)
        );
    }

    #[test]
    fn test_unparseable_url_still_goes_through_patterns() {
        let rules = RuleSet::builder()
            .block_url_pattern("^javascript:")
            .strict_mode(true)
            .build();
        let c = UrlAccessController::default();
        assert_eq!(
            c.decide_url("JavaScript:alert(1)", &rules),
            UrlDecision::Block(BlockReason::BlockedPattern)
        );
        assert_eq!(
            c.decide_url("not a url", &rules),
            UrlDecision::Block(BlockReason::DefaultDeny)
        );
    }

    #[test]
    fn test_trailing_dot_host_is_normalized() {
        let rules = RuleSet::builder().block_domain("social.com").build();
        let c = UrlAccessController::default();
        assert_eq!(
            c.decide_url("https://social.com./", &rules),
            UrlDecision::Block(BlockReason::BlockedDomain)
        );
    }

    #[test]
    fn test_block_reason_labels_and_violation_flag() {
        assert_eq!(BlockReason::BlockedDomain.to_string(), "blocked-domain");
        assert_eq!(BlockReason::BlockedPattern.to_string(), "blocked-pattern");
        assert_eq!(BlockReason::DefaultDeny.to_string(), "default-deny");
        assert!(BlockReason::BlockedDomain.is_violation());
        assert!(!BlockReason::DefaultDeny.is_violation());
    }

    // ── check_exit ────────────────────────────────────────────────────

    #[test]
    fn test_exit_matches_user_navigation() {
        let rules = RuleSet::builder().exit_pattern(EXIT).build();
        let c = UrlAccessController::default();
        let hit = c.check_exit(&NavigationRequest::user_navigation("https://x.com/#/login_s"), &rules);
        assert_eq!(hit.map(UrlPattern::as_str), Some(EXIT));
    }

    #[test]
    fn test_exit_pattern_is_anchored() {
        let rules = RuleSet::builder().exit_pattern(EXIT).build();
        let c = UrlAccessController::default();
        for url in [
            "https://example.com/#/login_s/extra",
            "https://example.com/#/login_success",
            "https://example.com/app/#/login_s",
        ] {
            let req = NavigationRequest::user_navigation(url);
            assert!(c.check_exit(&req, &rules).is_none(), "{url}");
        }
        let req = NavigationRequest::user_navigation("https://example.com/#/login_s");
        assert!(c.check_exit(&req, &rules).is_some());
    }

    #[test]
    fn test_exit_matching_ignores_case() {
        let rules = RuleSet::builder().exit_pattern(EXIT).build();
        let c = UrlAccessController::default();
        let req = NavigationRequest::user_navigation("HTTPS://Example.com/#/Login_s");
        assert!(c.check_exit(&req, &rules).is_some());
    }

    #[test]
    fn test_exit_requires_gesture_main_frame_and_no_redirect() {
        let rules = RuleSet::builder().exit_pattern(EXIT).build();
        let c = UrlAccessController::default();
        let url = "https://x.com/#/login_s";

        assert!(c.check_exit(&NavigationRequest::scripted(url), &rules).is_none());
        assert!(
            c.check_exit(&NavigationRequest::user_navigation(url).redirected(), &rules)
                .is_none()
        );
        assert!(
            c.check_exit(&NavigationRequest::user_navigation(url).in_subframe(), &rules)
                .is_none()
        );
    }

    #[test]
    fn test_exit_disabled_or_empty_never_matches() {
        let c = UrlAccessController::default();
        let req = NavigationRequest::user_navigation("https://x.com/#/login_s");

        let disabled = RuleSet::builder().exit_pattern(EXIT).exit_detection(false).build();
        assert!(c.check_exit(&req, &disabled).is_none());

        let empty = RuleSet::builder().exit_detection(true).build();
        assert!(c.check_exit(&req, &empty).is_none());
    }

    #[test]
    fn test_exit_returns_first_matching_pattern() {
        let rules = RuleSet::builder()
            .exit_pattern("(")
            .exit_pattern("/logout")
            .exit_pattern("logout$")
            .build();
        let c = UrlAccessController::default();
        let req = NavigationRequest::user_navigation("https://exam.edu/logout");
        assert_eq!(c.check_exit(&req, &rules).map(UrlPattern::as_str), Some("/logout"));
    }
}
