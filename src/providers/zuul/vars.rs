use log::debug;
use serde_json::{Map, Value};

use crate::error::Result;

use super::requests::VariantResponse;

/// Variable names that carry the release a variant deploys, most specific
/// first.
const RELEASE_TERMS: &[&str] = &["rhos_release_version", "osp_release", "release"];

/// Variable names that carry the featureset a variant deploys with.
const FEATURESET_TERMS: &[&str] = &["featureset"];

/// Variable names that carry overrides on top of the featureset.
const FEATURESET_OVERRIDES_TERMS: &[&str] = &["featureset_override"];

/// Looks for the first of a set of variable names among a variant's
/// variables.
pub(super) struct VariableSearch {
    terms: Vec<String>,
}

impl VariableSearch {
    pub(super) fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|term| term.as_ref().to_string())
                .collect(),
        }
    }

    /// Value of the first term present among the variables. Terms given
    /// first take precedence.
    pub(super) fn find_in(&self, variables: &Map<String, Value>) -> Option<Value> {
        self.terms
            .iter()
            .find_map(|term| variables.get(term).cloned())
    }

    /// Runs the search over the variant's variables, parents included.
    pub(super) fn search(&self, variant: &VariantResponse) -> Result<Option<Value>> {
        let variables = variant.variables(true)?;

        Ok(self.find_in(&variables))
    }
}

/// Search for the release a variant deploys.
pub(super) struct ReleaseSearch {
    search: VariableSearch,
}

impl ReleaseSearch {
    pub(super) fn new() -> Self {
        Self {
            search: VariableSearch::new(RELEASE_TERMS),
        }
    }

    pub(super) fn search(&self, variant: &VariantResponse) -> Result<Option<String>> {
        debug!("Searching for the release on variant '{}'", variant.name());

        let value = self.search.search(variant)?;

        Ok(value.map(|value| as_plain_string(&value)))
    }
}

/// Search for the featureset a variant deploys with.
pub(super) struct FeatureSetSearch {
    search: VariableSearch,
}

impl FeatureSetSearch {
    pub(super) fn new() -> Self {
        Self {
            search: VariableSearch::new(FEATURESET_TERMS),
        }
    }

    pub(super) fn search(&self, variant: &VariantResponse) -> Result<Option<String>> {
        debug!("Searching for the featureset on variant '{}'", variant.name());

        let value = self.search.search(variant)?;

        Ok(value.map(|value| as_plain_string(&value)))
    }
}

/// Search for the overrides a variant applies on top of its featureset.
pub(super) struct FeatureSetOverridesSearch {
    search: VariableSearch,
}

impl FeatureSetOverridesSearch {
    pub(super) fn new() -> Self {
        Self {
            search: VariableSearch::new(FEATURESET_OVERRIDES_TERMS),
        }
    }

    /// The overrides object, if the variant carries one. Anything other
    /// than an object is dismissed.
    pub(super) fn search(&self, variant: &VariantResponse) -> Result<Option<Map<String, Value>>> {
        debug!(
            "Searching for featureset overrides on variant '{}'",
            variant.name()
        );

        let value = self.search.search(variant)?;

        Ok(value.and_then(|value| value.as_object().cloned()))
    }
}

/// Renders a JSON value the way a person would write it down: strings keep
/// their text, everything else falls back to its JSON form.
pub(super) fn as_plain_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::providers::zuul::testing::FakeVariant;

    fn create_variant(variables: Value) -> VariantResponse {
        VariantResponse::new(Arc::new(FakeVariant::with_variables("tempest", variables)))
    }

    mod variable_search_tests {
        use super::*;

        #[test]
        fn test_first_term_takes_precedence() {
            let variant = create_variant(json!({
                "release": "wallaby",
                "osp_release": "17.0",
            }));

            let search = VariableSearch::new(["osp_release", "release"]);
            let value = search.search(&variant).unwrap();

            assert_eq!(value, Some(json!("17.0")));
        }

        #[test]
        fn test_absent_terms_are_skipped() {
            let variant = create_variant(json!({
                "osp_release": "16.2",
                "release": "train",
            }));

            let search = VariableSearch::new(["rhos_release_version", "osp_release", "release"]);
            let value = search.search(&variant).unwrap();

            assert_eq!(value, Some(json!("16.2")));
        }

        #[test]
        fn test_nothing_found() {
            let variant = create_variant(json!({"topology": "3ctrl_2comp"}));

            let search = VariableSearch::new(["release"]);

            assert_eq!(search.search(&variant).unwrap(), None);
        }
    }

    mod release_search_tests {
        use super::*;

        #[test]
        fn test_numbers_are_stringified() {
            let variant = create_variant(json!({"rhos_release_version": 17}));

            let release = ReleaseSearch::new().search(&variant).unwrap();

            assert_eq!(release, Some("17".to_string()));
        }

        #[test]
        fn test_specific_terms_win_over_generic_ones() {
            let variant = create_variant(json!({
                "release": "wallaby",
                "rhos_release_version": "17.1",
            }));

            let release = ReleaseSearch::new().search(&variant).unwrap();

            assert_eq!(release, Some("17.1".to_string()));
        }
    }

    mod featureset_search_tests {
        use super::*;

        #[test]
        fn test_featureset_is_found() {
            let variant = create_variant(json!({"featureset": "052"}));

            let featureset = FeatureSetSearch::new().search(&variant).unwrap();

            assert_eq!(featureset, Some("052".to_string()));
        }
    }

    mod featureset_overrides_search_tests {
        use super::*;

        #[test]
        fn test_overrides_come_back_as_an_object() {
            let variant = create_variant(json!({
                "featureset_override": {"run_tempest": false},
            }));

            let overrides = FeatureSetOverridesSearch::new().search(&variant).unwrap();

            let overrides = overrides.unwrap();
            assert_eq!(overrides.get("run_tempest"), Some(&json!(false)));
        }

        #[test]
        fn test_non_object_overrides_are_dismissed() {
            let variant = create_variant(json!({"featureset_override": "oops"}));

            let overrides = FeatureSetOverridesSearch::new().search(&variant).unwrap();

            assert!(overrides.is_none());
        }
    }
}
