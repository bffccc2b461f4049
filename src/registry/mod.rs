//! Test registry and suite filtering
//!
//! The registry is populated once at process start and read-only afterwards.
//! Filters are pure reducers producing fresh [`Suite`] snapshots.

mod filter;

pub use filter::{
    select_by_identifiers, select_by_tags, select_by_variants, select_variants, RunPlan, Suite,
    TagExpr,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::RegistrationError;
use crate::models::{test_identifier, Test, TestDefinition, Variants};

/// Collection of registered tests keyed by name
#[derive(Default)]
pub struct Registry {
    tests: BTreeMap<String, Arc<Test>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a test.
    ///
    /// Name, description, author, tags and function are required and names
    /// must be unique.
    pub fn register(&mut self, def: TestDefinition) -> Result<&Arc<Test>, RegistrationError> {
        if def.name.is_empty() {
            return Err(RegistrationError::MissingName);
        }
        if def.description.is_empty() {
            return Err(RegistrationError::MissingDescription(def.name));
        }
        if def.author.is_empty() {
            return Err(RegistrationError::MissingAuthor(def.name));
        }
        if def.tags.is_empty() {
            return Err(RegistrationError::MissingTags(def.name));
        }
        let Some(function) = def.function else {
            return Err(RegistrationError::MissingFunction(def.name));
        };
        if self.tests.contains_key(&def.name) {
            return Err(RegistrationError::DuplicateName(def.name));
        }

        let declares_variants = !def.variants.is_empty();
        let variants = if def.variants.is_empty() {
            Variants::base()
        } else {
            def.variants
        };

        let test = Test {
            id: test_identifier(&def.name, &def.description, &def.author),
            name: def.name.clone(),
            description: def.description,
            author: def.author,
            tags: def.tags,
            variants,
            declares_variants,
            setup: def.setup,
            function,
        };

        debug!("Registered test {} ({})", test.name, test.id);

        Ok(&*self.tests.entry(def.name).or_insert_with(|| Arc::new(test)))
    }

    /// Register several tests, stopping at the first invalid one
    pub fn register_all(
        &mut self,
        defs: impl IntoIterator<Item = TestDefinition>,
    ) -> Result<(), RegistrationError> {
        for def in defs {
            self.register(def)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Test>> {
        self.tests.get(name)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Every registered test as a name-sorted suite
    pub fn suite(&self) -> Suite {
        Suite::from_tests(self.tests.values().cloned())
    }

    /// All tags with the number of tests carrying each
    pub fn tags(&self) -> BTreeMap<String, usize> {
        let mut tags = BTreeMap::new();
        for test in self.tests.values() {
            for tag in &test.tags {
                *tags.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BASE_VARIANT;

    fn valid(name: &str) -> TestDefinition {
        TestDefinition::new(name)
            .description("description")
            .author("author")
            .tag("a")
            .function(|_, _| async { Ok(()) })
    }

    #[test]
    fn test_register_valid() {
        let mut registry = Registry::new();
        let test = registry.register(valid("t1")).unwrap();
        assert_eq!(test.id, test_identifier("t1", "description", "author"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_defaults_variants() {
        let mut registry = Registry::new();
        let test = registry.register(valid("t1")).unwrap();
        assert_eq!(test.variants.len(), 1);
        assert!(test.variants.contains(BASE_VARIANT));
    }

    #[test]
    fn test_register_missing_fields() {
        let mut registry = Registry::new();

        assert_eq!(
            registry.register(valid("")).unwrap_err(),
            RegistrationError::MissingName
        );
        assert_eq!(
            registry.register(valid("t").description("")).unwrap_err(),
            RegistrationError::MissingDescription("t".into())
        );
        assert_eq!(
            registry.register(valid("t").author("")).unwrap_err(),
            RegistrationError::MissingAuthor("t".into())
        );

        let mut no_tags = valid("t");
        no_tags.tags.clear();
        assert_eq!(
            registry.register(no_tags).unwrap_err(),
            RegistrationError::MissingTags("t".into())
        );

        let mut no_function = valid("t");
        no_function.function = None;
        assert_eq!(
            registry.register(no_function).unwrap_err(),
            RegistrationError::MissingFunction("t".into())
        );

        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_duplicate_name() {
        let mut registry = Registry::new();
        registry.register(valid("t1")).unwrap();
        let err = registry
            .register(valid("t1").description("other"))
            .unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateName("t1".into()));
        assert_eq!(registry.get("t1").unwrap().description, "description");
    }

    #[test]
    fn test_suite_is_sorted() {
        let mut registry = Registry::new();
        registry
            .register_all([valid("zeta"), valid("alpha"), valid("mid")])
            .unwrap();
        let names: Vec<String> = registry.suite().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_tags_count() {
        let mut registry = Registry::new();
        registry
            .register_all([valid("t1").tag("b"), valid("t2")])
            .unwrap();
        let tags = registry.tags();
        assert_eq!(tags.get("a"), Some(&2));
        assert_eq!(tags.get("b"), Some(&1));
    }
}
