//! Index component selectors
//!
//! A selector picks the data view or the failure-store view of a data stream.
//! It travels as a `::suffix` on the requested name (`logs::failures`).

use serde::{Deserialize, Serialize};

use crate::core::{AuthzError, AuthzResult};

/// Separator between a name and its selector suffix
pub const SELECTOR_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Data,
    Failures,
}

impl Selector {
    pub fn as_str(self) -> &'static str {
        match self {
            Selector::Data => "data",
            Selector::Failures => "failures",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "data" => Some(Selector::Data),
            "failures" => Some(Selector::Failures),
            _ => None,
        }
    }

    pub fn should_include_data(self) -> bool {
        self == Selector::Data
    }

    pub fn should_include_failures(self) -> bool {
        self == Selector::Failures
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Selector {
    type Err = AuthzError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Selector::from_key(value).ok_or_else(|| AuthzError::InvalidSelector(value.to_string()))
    }
}

/// Which selectors a privilege applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorPredicate {
    Data,
    Failures,
    DataAndFailures,
}

impl SelectorPredicate {
    pub fn test(self, selector: Selector) -> bool {
        match self {
            SelectorPredicate::Data => selector == Selector::Data,
            SelectorPredicate::Failures => selector == Selector::Failures,
            SelectorPredicate::DataAndFailures => true,
        }
    }
}

/// Split `name::selector` into the name and its selector.
///
/// A missing suffix yields `None`; an unknown suffix is an error.
pub fn split_selector_expression(expression: &str) -> AuthzResult<(&str, Option<Selector>)> {
    match expression.rsplit_once(SELECTOR_SEPARATOR) {
        None => Ok((expression, None)),
        Some((name, key)) => {
            let selector = key.parse::<Selector>()?;
            Ok((name, Some(selector)))
        }
    }
}

/// Re-attach a selector to a name. Only the failures selector is rendered.
pub fn combine_selector(name: &str, selector: Option<Selector>) -> String {
    match selector {
        Some(Selector::Failures) => format!("{}{}{}", name, SELECTOR_SEPARATOR, Selector::Failures),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_string_roundtrip() {
        for selector in [Selector::Data, Selector::Failures] {
            assert_eq!(selector.as_str().parse::<Selector>().ok(), Some(selector));
            assert_eq!(selector.to_string(), selector.as_str());
        }
        assert!(matches!(
            "all".parse::<Selector>(),
            Err(AuthzError::InvalidSelector(_))
        ));
    }

    #[test]
    fn selector_includes_only_its_own_view() {
        assert!(Selector::Data.should_include_data());
        assert!(!Selector::Data.should_include_failures());
        assert!(Selector::Failures.should_include_failures());
        assert!(!Selector::Failures.should_include_data());
    }

    #[test]
    fn split_expression() {
        assert_eq!(split_selector_expression("logs").unwrap(), ("logs", None));
        assert_eq!(
            split_selector_expression("logs::failures").unwrap(),
            ("logs", Some(Selector::Failures))
        );
        assert_eq!(
            split_selector_expression("logs::data").unwrap(),
            ("logs", Some(Selector::Data))
        );
        assert!(split_selector_expression("logs::other").is_err());
    }

    #[test]
    fn combine_renders_only_failures() {
        assert_eq!(combine_selector("logs", None), "logs");
        assert_eq!(combine_selector("logs", Some(Selector::Data)), "logs");
        assert_eq!(
            combine_selector("logs", Some(Selector::Failures)),
            "logs::failures"
        );
    }

    #[test]
    fn predicate() {
        assert!(SelectorPredicate::Data.test(Selector::Data));
        assert!(!SelectorPredicate::Data.test(Selector::Failures));
        assert!(SelectorPredicate::Failures.test(Selector::Failures));
        assert!(!SelectorPredicate::Failures.test(Selector::Data));
        assert!(SelectorPredicate::DataAndFailures.test(Selector::Data));
        assert!(SelectorPredicate::DataAndFailures.test(Selector::Failures));
    }
}
