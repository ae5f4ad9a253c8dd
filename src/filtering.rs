use regex::Regex;

use crate::error::Result;

/// A unary predicate over borrowed items.
pub type Filter<T> = Box<dyn Fn(&T) -> bool>;

/// Retains the elements of a collection that satisfy every predicate.
///
/// Predicates are applied in the order supplied, each pass narrowing the
/// output of the previous one. Element order is preserved.
pub fn apply_filters<T>(items: Vec<T>, filters: &[Filter<T>]) -> Vec<T> {
    let mut result = items;

    for check in filters {
        result.retain(|item| check(item));
    }

    result
}

/// A compiled set of alternative search patterns.
///
/// A text matches when any of the patterns is found somewhere in it, so a
/// single matcher gives OR semantics across its patterns. Stacking one
/// matcher per filter call gives AND semantics across calls.
#[derive(Debug, Clone)]
pub struct Matcher {
    patterns: Vec<Regex>,
}

impl Matcher {
    /// Compiles one or more regex patterns into a matcher.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the patterns is not a valid regex.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| Regex::new(pattern.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    /// Whether any of the patterns is found in the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.is_match(text))
    }
}
