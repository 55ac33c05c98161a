//! Name matcher implementation
//!
//! A cheaper alternative to the automaton for testing single names:
//! exact names go into a hash set, `prefix*` patterns into a prefix list,
//! other wildcards into `glob` patterns and `/regex/` patterns into `regex`.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use glob::Pattern;
use regex::Regex;
use regex_syntax::ParserBuilder;

use crate::automaton::is_lucene_regex;
use crate::core::{AuthzError, AuthzResult};

/// Matches names against a set of patterns, composable with AND/OR/NOT
#[derive(Clone)]
pub struct NameMatcher {
    inner: Arc<Inner>,
}

enum Inner {
    Always,
    Never,
    Patterns(PatternSet),
    And(NameMatcher, NameMatcher),
    Or(NameMatcher, NameMatcher),
    Not(NameMatcher),
}

struct PatternSet {
    /// Source patterns, for display
    source: Vec<String>,
    exact: HashSet<String>,
    prefixes: Vec<String>,
    globs: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl PatternSet {
    fn test(&self, name: &str) -> bool {
        self.exact.contains(name)
            || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
            || self.globs.iter().any(|g| g.matches(name))
            || self.regexes.iter().any(|r| r.is_match(name))
    }
}

/// Collapse runs of `*`; `glob` reads `**` as a recursive path wildcard
fn collapse_stars(pattern: &str) -> Cow<'_, str> {
    if !pattern.contains("**") {
        return Cow::Borrowed(pattern);
    }
    let mut collapsed = String::with_capacity(pattern.len());
    for ch in pattern.chars() {
        if ch == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(ch);
    }
    Cow::Owned(collapsed)
}

/// Translate a `*`/`?` wildcard into a glob pattern with everything else escaped
fn wildcard_to_glob(pattern: &str) -> AuthzResult<Pattern> {
    let mut glob = String::with_capacity(pattern.len() + 4);
    let mut literal = String::new();
    for ch in pattern.chars() {
        if ch == '*' || ch == '?' {
            glob.push_str(&Pattern::escape(&literal));
            literal.clear();
            glob.push(ch);
        } else {
            literal.push(ch);
        }
    }
    glob.push_str(&Pattern::escape(&literal));
    Pattern::new(&glob).map_err(|e| AuthzError::invalid_pattern(pattern, e.to_string()))
}

fn compile_regex(pattern: &str) -> AuthzResult<Regex> {
    let inner = &pattern[1..pattern.len() - 1];
    // Keep the accepted syntax identical to the automaton compiler
    let hir = ParserBuilder::new()
        .dot_matches_new_line(true)
        .build()
        .parse(inner)
        .map_err(|e| AuthzError::invalid_pattern(pattern, e.to_string()))?;
    if !hir.properties().look_set().is_empty() {
        return Err(AuthzError::invalid_pattern(
            pattern,
            "anchors and word boundaries are not supported",
        ));
    }
    Regex::new(&format!("^(?s:{})$", inner))
        .map_err(|e| AuthzError::invalid_pattern(pattern, e.to_string()))
}

impl NameMatcher {
    /// Matcher accepting every name
    pub fn always() -> Self {
        Self {
            inner: Arc::new(Inner::Always),
        }
    }

    /// Matcher accepting no name
    pub fn never() -> Self {
        Self {
            inner: Arc::new(Inner::Never),
        }
    }

    /// Build a matcher for the union of `patterns`
    pub fn of<I, S>(patterns: I) -> AuthzResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = PatternSet {
            source: Vec::new(),
            exact: HashSet::new(),
            prefixes: Vec::new(),
            globs: Vec::new(),
            regexes: Vec::new(),
        };

        for source in patterns {
            let source = source.as_ref();
            let pattern = if source.starts_with('/') {
                Cow::Borrowed(source)
            } else {
                collapse_stars(source)
            };
            let pattern = pattern.as_ref();
            if pattern == "*" {
                return Ok(Self::always());
            }
            set.source.push(source.to_string());
            if pattern.starts_with('/') {
                if !is_lucene_regex(pattern) {
                    return Err(AuthzError::invalid_pattern(
                        pattern,
                        "regular expressions must start and end with '/'",
                    ));
                }
                set.regexes.push(compile_regex(pattern)?);
            } else if !pattern.contains(['*', '?']) {
                set.exact.insert(pattern.to_string());
            } else if let Some(prefix) = pattern
                .strip_suffix('*')
                .filter(|prefix| !prefix.contains(['*', '?']))
            {
                set.prefixes.push(prefix.to_string());
            } else {
                set.globs.push(wildcard_to_glob(pattern)?);
            }
        }

        if set.source.is_empty() {
            return Ok(Self::never());
        }
        Ok(Self {
            inner: Arc::new(Inner::Patterns(set)),
        })
    }

    /// Names matched by both matchers
    pub fn and(&self, other: &NameMatcher) -> NameMatcher {
        match (&*self.inner, &*other.inner) {
            (Inner::Never, _) | (_, Inner::Never) => Self::never(),
            (Inner::Always, _) => other.clone(),
            (_, Inner::Always) => self.clone(),
            _ => Self {
                inner: Arc::new(Inner::And(self.clone(), other.clone())),
            },
        }
    }

    /// Names matched by either matcher
    pub fn or(&self, other: &NameMatcher) -> NameMatcher {
        match (&*self.inner, &*other.inner) {
            (Inner::Always, _) | (_, Inner::Always) => Self::always(),
            (Inner::Never, _) => other.clone(),
            (_, Inner::Never) => self.clone(),
            _ => Self {
                inner: Arc::new(Inner::Or(self.clone(), other.clone())),
            },
        }
    }

    /// Names not matched by this matcher
    pub fn not(&self) -> NameMatcher {
        match &*self.inner {
            Inner::Always => Self::never(),
            Inner::Never => Self::always(),
            Inner::Not(inner) => inner.clone(),
            _ => Self {
                inner: Arc::new(Inner::Not(self.clone())),
            },
        }
    }

    /// Names matched by this matcher but not by `other`
    pub fn and_not(&self, other: &NameMatcher) -> NameMatcher {
        self.and(&other.not())
    }

    /// Test a single name
    pub fn test(&self, name: &str) -> bool {
        match &*self.inner {
            Inner::Always => true,
            Inner::Never => false,
            Inner::Patterns(set) => set.test(name),
            Inner::And(a, b) => a.test(name) && b.test(name),
            Inner::Or(a, b) => a.test(name) || b.test(name),
            Inner::Not(a) => !a.test(name),
        }
    }

    /// Whether this matcher accepts every name
    pub fn is_total(&self) -> bool {
        matches!(&*self.inner, Inner::Always)
    }

    /// Whether this matcher accepts no name at all
    pub fn is_never(&self) -> bool {
        matches!(&*self.inner, Inner::Never)
    }
}

impl fmt::Display for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            Inner::Always => f.write_str("*"),
            Inner::Never => f.write_str("<none>"),
            Inner::Patterns(set) => f.write_str(&set.source.join("|")),
            Inner::And(a, b) => write!(f, "({})&({})", a, b),
            Inner::Or(a, b) => write!(f, "({})|({})", a, b),
            Inner::Not(a) => write!(f, "!({})", a),
        }
    }
}

impl fmt::Debug for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NameMatcher").field(&self.to_string()).finish()
    }
}
