//! Suite selection
//!
//! Pure reducers selecting a sub-suite by identifier, tag expression and variant.

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{Payload, Test, Variants};

/// Name-sorted, read-only view over a set of registered tests
#[derive(Clone, Default)]
pub struct Suite {
    tests: Vec<Arc<Test>>,
    variants: Vec<String>,
}

impl Suite {
    pub fn from_tests(tests: impl IntoIterator<Item = Arc<Test>>) -> Self {
        let mut tests: Vec<Arc<Test>> = tests.into_iter().collect();
        tests.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            tests,
            variants: Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Test>> {
        self.tests.iter()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name.as_str()).collect()
    }

    /// Variant labels requested for this suite; empty means all
    pub fn requested_variants(&self) -> &[String] {
        &self.variants
    }

    /// Expand the suite into one plan per (test, selected variant) pair
    pub fn plans(&self) -> Vec<RunPlan> {
        let mut plans = Vec::new();
        for test in &self.tests {
            let selected = select_variants(test, &self.variants);
            for (label, data) in selected.iter() {
                plans.push(RunPlan {
                    test: test.clone(),
                    variant: label.to_string(),
                    data: data.cloned(),
                });
            }
        }
        plans
    }

    fn derive(&self, tests: Vec<Arc<Test>>) -> Self {
        Self {
            tests,
            variants: self.variants.clone(),
        }
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("tests", &self.names())
            .field("variants", &self.variants)
            .finish()
    }
}

/// One (test, variant) pair ready to be scheduled
#[derive(Clone)]
pub struct RunPlan {
    pub test: Arc<Test>,
    pub variant: String,
    pub data: Option<Payload>,
}

impl RunPlan {
    /// Key used in the status board
    pub fn key(&self) -> String {
        format!("{} (variant {})", self.test.name, self.variant)
    }
}

/// A tag filter token, optionally negated with `~`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagExpr {
    pub tag: String,
    pub negated: bool,
}

impl TagExpr {
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        let (tag, negated) = match expr.strip_prefix('~') {
            Some(rest) => (rest.trim(), true),
            None => (expr, false),
        };

        if tag.is_empty() {
            return None;
        }

        Some(Self {
            tag: tag.to_string(),
            negated,
        })
    }
}

/// Tests whose identifier is in `ids`; an empty list keeps the suite unchanged
pub fn select_by_identifiers(suite: &Suite, ids: &[String], verbose: bool) -> Suite {
    if ids.is_empty() {
        return suite.clone();
    }

    let tests = suite
        .tests
        .iter()
        .filter(|t| ids.iter().any(|id| *id == t.id))
        .cloned()
        .collect();

    let selected = suite.derive(tests);
    log_selection(&selected, verbose);
    selected
}

/// Tests matching the tag expressions.
///
/// Negated expressions always exclude. With `match_all` every positive tag
/// must be present; otherwise at least one must be, unless there are none.
pub fn select_by_tags(suite: &Suite, exprs: &[String], match_all: bool, verbose: bool) -> Suite {
    let exprs: Vec<TagExpr> = exprs.iter().filter_map(|e| TagExpr::parse(e)).collect();
    if exprs.is_empty() {
        return suite.clone();
    }

    let (negated, positive): (Vec<&TagExpr>, Vec<&TagExpr>) =
        exprs.iter().partition(|e| e.negated);

    let tests = suite
        .tests
        .iter()
        .filter(|t| {
            if negated.iter().any(|e| t.has_tag(&e.tag)) {
                return false;
            }
            if positive.is_empty() {
                return true;
            }
            if match_all {
                positive.iter().all(|e| t.has_tag(&e.tag))
            } else {
                positive.iter().any(|e| t.has_tag(&e.tag))
            }
        })
        .cloned()
        .collect();

    let selected = suite.derive(tests);
    log_selection(&selected, verbose);
    selected
}

/// Restrict a test's variants to the requested labels.
///
/// An empty request keeps every declared variant. A test declaring no
/// variants always gets the default.
pub fn select_variants(test: &Test, requested: &[String]) -> Variants {
    if !test.declares_variants {
        return Variants::base();
    }
    if requested.is_empty() {
        return test.variants.clone();
    }
    test.variants.retain_labels(requested)
}

/// Record the requested variants and drop tests that have none of them
pub fn select_by_variants(suite: &Suite, requested: &[String], verbose: bool) -> Suite {
    if requested.is_empty() {
        return suite.clone();
    }

    let tests = suite
        .tests
        .iter()
        .filter(|t| !select_variants(t, requested).is_empty())
        .cloned()
        .collect();

    let selected = Suite {
        tests,
        variants: requested.to_vec(),
    };
    log_selection(&selected, verbose);
    selected
}

fn log_selection(suite: &Suite, verbose: bool) {
    if !verbose {
        return;
    }

    if suite.is_empty() {
        warn!("No matching tests found.");
        return;
    }

    info!("Selected tests:");
    for test in &suite.tests {
        info!(" - {}", test.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestDefinition, BASE_VARIANT};
    use crate::registry::Registry;

    fn def(name: &str, tags: &[&str]) -> TestDefinition {
        TestDefinition::new(name)
            .description(format!("{name} description"))
            .author("author")
            .tags(tags.iter().copied())
            .function(|_, _| async { Ok(()) })
    }

    fn scenario() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_all([
                def("T1", &["a"]),
                def("T2", &["a", "b"]),
                def("T3", &["b"]),
            ])
            .unwrap();
        registry
    }

    fn tags(exprs: &[&str]) -> Vec<String> {
        exprs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tag_expr_parse() {
        assert_eq!(
            TagExpr::parse("~x"),
            Some(TagExpr {
                tag: "x".into(),
                negated: true
            })
        );
        assert_eq!(TagExpr::parse("~"), None);
        assert_eq!(TagExpr::parse(""), None);
    }

    #[test]
    fn test_select_by_tags_any() {
        let suite = scenario().suite();
        let selected = select_by_tags(&suite, &tags(&["a"]), false, false);
        assert_eq!(selected.names(), vec!["T1", "T2"]);
    }

    #[test]
    fn test_select_by_tags_all() {
        let suite = scenario().suite();
        let selected = select_by_tags(&suite, &tags(&["a", "b"]), true, false);
        assert_eq!(selected.names(), vec!["T2"]);
    }

    #[test]
    fn test_select_by_tags_empty_is_identity() {
        let suite = scenario().suite();
        let selected = select_by_tags(&suite, &[], false, false);
        assert_eq!(selected.names(), suite.names());
    }

    #[test]
    fn test_select_by_tags_negation_all() {
        let suite = scenario().suite();
        let selected = select_by_tags(&suite, &tags(&["~b"]), true, false);
        assert_eq!(selected.names(), vec!["T1"]);
        assert!(selected.iter().all(|t| !t.has_tag("b")));
    }

    #[test]
    fn test_select_by_tags_negation_any() {
        let suite = scenario().suite();
        let selected = select_by_tags(&suite, &tags(&["a", "~b"]), false, false);
        assert_eq!(selected.names(), vec!["T1"]);
    }

    #[test]
    fn test_select_by_identifiers() {
        let registry = scenario();
        let suite = registry.suite();
        let id = registry.get("T3").unwrap().id.clone();

        let selected = select_by_identifiers(&suite, &[id], false);
        assert_eq!(selected.names(), vec!["T3"]);

        let unchanged = select_by_identifiers(&suite, &[], false);
        assert_eq!(unchanged.len(), 3);
    }

    #[test]
    fn test_select_variants() {
        let mut registry = Registry::new();
        registry
            .register(def("V", &["v"]).variants(Variants::new().with_label("x").with_label("y")))
            .unwrap();
        registry.register(def("B", &["v"])).unwrap();

        let v = registry.get("V").unwrap();
        let b = registry.get("B").unwrap();

        assert_eq!(select_variants(v, &[]).len(), 2);
        assert_eq!(
            select_variants(v, &tags(&["y", "z"])).labels().collect::<Vec<_>>(),
            vec!["y"]
        );
        assert!(select_variants(b, &tags(&["y"])).contains(BASE_VARIANT));
    }

    #[test]
    fn test_select_by_variants_drops_unmatched() {
        let mut registry = Registry::new();
        registry
            .register(def("V", &["v"]).variants(Variants::new().with_label("x")))
            .unwrap();
        registry
            .register(def("W", &["v"]).variants(Variants::new().with_label("y")))
            .unwrap();

        let selected = select_by_variants(&registry.suite(), &tags(&["x"]), false);
        assert_eq!(selected.names(), vec!["V"]);

        let plans = selected.plans();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].variant, "x");
    }

    #[test]
    fn test_select_by_variants_keeps_default_only_tests() {
        let mut registry = Registry::new();
        registry
            .register(def("V", &["v"]).variants(Variants::new().with_label("x").with_label("y")))
            .unwrap();
        registry.register(def("B", &["v"])).unwrap();

        let selected = select_by_variants(&registry.suite(), &tags(&["y"]), false);
        assert_eq!(selected.names(), vec!["B", "V"]);

        let keys: Vec<String> = selected.plans().iter().map(RunPlan::key).collect();
        assert_eq!(keys, vec!["B (variant base)", "V (variant y)"]);
    }

    #[test]
    fn test_plans_expand_variants() {
        let mut registry = Registry::new();
        registry
            .register(def("V", &["v"]).variants(Variants::new().with_label("x").with("y", 3u8)))
            .unwrap();

        let plans = registry.suite().plans();
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].key(), "V (variant y)");
        assert!(plans[1].data.is_some());
    }
}
