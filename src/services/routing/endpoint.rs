//! Endpoint patterns compiled into path predicates.
//!
//! A pattern is a route path such as `wp/v2/posts` or a glob such as
//! `wp/*/posts`, where `*` stands for one or more characters (slashes
//! included). Leading and trailing slashes are ignored on both sides, so
//! `wp/*/posts` matches `/wp/v2/posts/` as well.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

/// Pattern used by endpoints that bring their own matcher.
pub const WILDCARD: &str = "*";

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("empty endpoint pattern")]
    Empty,
    #[error("invalid endpoint pattern `{pattern}`: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

type MatchFn = dyn Fn(&str) -> bool + Send + Sync;

#[derive(Clone)]
enum Matcher {
    Pattern(Regex),
    Custom(Arc<MatchFn>),
}

/// One compiled endpoint rule.
///
/// Immutable once built; cloning is cheap.
#[derive(Clone)]
pub struct Endpoint {
    pattern: String,
    matcher: Matcher,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matcher = match &self.matcher {
            Matcher::Pattern(re) => re.as_str(),
            Matcher::Custom(_) => "<custom>",
        };
        f.debug_struct("Endpoint")
            .field("pattern", &self.pattern)
            .field("matcher", &matcher)
            .finish()
    }
}

impl Endpoint {
    /// Compile a literal or wildcard pattern.
    pub fn compile(pattern: &str) -> Result<Self, EndpointError> {
        let regex = pattern_to_regex(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Matcher::Pattern(regex),
        })
    }

    /// Endpoint whose matching is entirely decided by `predicate`.
    ///
    /// The rule is registered under the wildcard pattern, so the predicate
    /// sees every path.
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            pattern: WILDCARD.to_string(),
            matcher: Matcher::Custom(Arc::new(predicate)),
        }
    }

    /// Compile `pattern` but delegate the decision to `matcher`, which gets
    /// the compiled pattern alongside the path.
    pub fn with_matcher<F>(pattern: &str, matcher: F) -> Result<Self, EndpointError>
    where
        F: Fn(&Regex, &str) -> bool + Send + Sync + 'static,
    {
        let regex = pattern_to_regex(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Matcher::Custom(Arc::new(move |path: &str| matcher(&regex, path))),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, path: &str) -> bool {
        match &self.matcher {
            Matcher::Pattern(re) => re.is_match(path),
            Matcher::Custom(f) => f(path),
        }
    }
}

/// First-match over `rules` in registration order.
pub fn matches_any<'a, I>(path: &str, rules: I) -> bool
where
    I: IntoIterator<Item = &'a Endpoint>,
{
    rules.into_iter().any(|rule| rule.is_match(path))
}

fn pattern_to_regex(pattern: &str) -> Result<Regex, EndpointError> {
    let trimmed = pattern.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(EndpointError::Empty);
    }

    let body = trimmed
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".+");

    Regex::new(&format!("^/?{body}/?$")).map_err(|source| EndpointError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches_itself_only() {
        let ep = Endpoint::compile("jwt/v1/auth/login").unwrap();
        assert!(ep.is_match("jwt/v1/auth/login"));
        assert!(ep.is_match("/jwt/v1/auth/login"));
        assert!(ep.is_match("/jwt/v1/auth/login/"));
        assert!(!ep.is_match("jwt/v1/auth/loginx"));
        assert!(!ep.is_match("/prefix/jwt/v1/auth/login"));
    }

    #[test]
    fn wildcard_spans_segments() {
        let ep = Endpoint::compile("wp/*/posts").unwrap();
        assert!(ep.is_match("wp/v2/posts"));
        assert!(ep.is_match("/wp/anything/posts"));
        assert!(ep.is_match("/wp/a/b/c/posts"));
        assert!(!ep.is_match("wp/v2/pages"));
        assert!(!ep.is_match("wp//posts"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let ep = Endpoint::compile("api/v1.0/items").unwrap();
        assert!(ep.is_match("/api/v1.0/items"));
        assert!(!ep.is_match("/api/v1x0/items"));
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(matches!(Endpoint::compile("/"), Err(EndpointError::Empty)));
    }

    #[test]
    fn custom_predicate_sees_every_path() {
        let ep = Endpoint::custom(|path| path.ends_with("/me"));
        assert_eq!(ep.pattern(), WILDCARD);
        assert!(ep.is_match("/wp/v2/users/me"));
        assert!(!ep.is_match("/wp/v2/users/1"));
    }

    #[test]
    fn with_matcher_receives_compiled_pattern() {
        let ep = Endpoint::with_matcher("wp/*/media", |re, path| {
            re.is_match(path) && !path.contains("private")
        })
        .unwrap();
        assert!(ep.is_match("/wp/v2/media"));
        assert!(!ep.is_match("/wp/private/media"));
    }

    #[test]
    fn first_match_wins_over_ordered_rules() {
        let rules = vec![
            Endpoint::compile("a/*").unwrap(),
            Endpoint::custom(|_| panic!("must not be evaluated")),
        ];
        assert!(matches_any("/a/b", &rules));
    }

    #[test]
    fn no_rules_never_match() {
        let rules: Vec<Endpoint> = Vec::new();
        assert!(!matches_any("/anything", &rules));
    }
}
