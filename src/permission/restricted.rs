//! Restricted index classifier

use std::sync::Arc;

use crate::automaton::{self, Automaton};
use crate::core::AuthzResult;
use crate::matcher::NameMatcher;

/// Classifies index names that are hidden from ordinary wildcard grants
#[derive(Debug, Clone)]
pub struct RestrictedIndices {
    patterns: Vec<String>,
    matcher: NameMatcher,
    automaton: Arc<Automaton>,
}

impl RestrictedIndices {
    pub fn new<I, S>(patterns: I) -> AuthzResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect();
        let matcher = NameMatcher::of(&patterns)?;
        let automaton = Arc::new(automaton::patterns(&patterns)?);
        Ok(Self {
            patterns,
            matcher,
            automaton,
        })
    }

    /// Classifier with no restricted names
    pub fn none() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: NameMatcher::never(),
            automaton: Arc::new(Automaton::empty()),
        }
    }

    pub fn is_restricted(&self, name: &str) -> bool {
        self.matcher.test(name)
    }

    pub fn matcher(&self) -> &NameMatcher {
        &self.matcher
    }

    pub fn automaton(&self) -> &Arc<Automaton> {
        &self.automaton
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_names() {
        let restricted = RestrictedIndices::new([".security", ".security-*"]).unwrap();
        assert!(restricted.is_restricted(".security"));
        assert!(restricted.is_restricted(".security-7"));
        assert!(!restricted.is_restricted("security"));
        assert!(restricted.automaton().run(".security-7"));
        assert!(!restricted.automaton().run("logs"));
    }

    #[test]
    fn none_restricts_nothing() {
        let restricted = RestrictedIndices::none();
        assert!(!restricted.is_restricted(".security"));
        assert!(restricted.automaton().is_empty());
    }
}
