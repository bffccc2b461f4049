//! Test definitions
//!
//! A [`TestDefinition`] is what test authors hand to the registry; once
//! validated it becomes an immutable [`Test`] with a derived identifier.

use anyhow::Result;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::variant::{Payload, Variants};
use crate::executor::{Context, ExecutionContext};

/// Body of a test, executed once per iteration
pub type TestFunction =
    Arc<dyn Fn(Context, ExecutionContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Run-level preparation executed once before the iterations of a run
pub type SetupFunction =
    Arc<dyn Fn(Context, ExecutionContext) -> BoxFuture<'static, Result<SetupOutput>> + Send + Sync>;

/// Cleanup returned by a setup function
pub type TeardownFunction = Box<dyn FnOnce() + Send>;

/// What a setup function hands back to the run
#[derive(Default)]
pub struct SetupOutput {
    pub data: Option<Payload>,
    pub teardown: Option<TeardownFunction>,
}

impl SetupOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    pub fn with_teardown(mut self, teardown: impl FnOnce() + Send + 'static) -> Self {
        self.teardown = Some(Box::new(teardown));
        self
    }
}

/// Unvalidated test declaration
#[derive(Clone, Default)]
pub struct TestDefinition {
    pub name: String,
    pub description: String,
    pub author: String,
    pub tags: BTreeSet<String>,
    pub variants: Variants,
    pub setup: Option<SetupFunction>,
    pub function: Option<TestFunction>,
}

impl TestDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn variants(mut self, variants: Variants) -> Self {
        self.variants = variants;
        self
    }

    /// Set the setup function
    pub fn setup<F, Fut>(mut self, setup: F) -> Self
    where
        F: Fn(Context, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SetupOutput>> + Send + 'static,
    {
        self.setup = Some(Arc::new(
            move |ctx: Context, t: ExecutionContext| -> BoxFuture<'static, Result<SetupOutput>> {
                Box::pin(setup(ctx, t))
            },
        ));
        self
    }

    /// Set the test body
    pub fn function<F, Fut>(mut self, function: F) -> Self
    where
        F: Fn(Context, ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.function = Some(Arc::new(
            move |ctx: Context, t: ExecutionContext| -> BoxFuture<'static, Result<()>> {
                Box::pin(function(ctx, t))
            },
        ));
        self
    }
}

/// A registered, immutable test
#[derive(Clone)]
pub struct Test {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub tags: BTreeSet<String>,
    pub variants: Variants,
    /// False when the test declared no variants and got the default
    pub declares_variants: bool,
    pub setup: Option<SetupFunction>,
    pub function: TestFunction,
}

impl Test {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("variants", &self.variants)
            .field("setup", &self.setup.is_some())
            .finish()
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        writeln!(f, "id         : {}", self.id)?;
        writeln!(f, "name       : {}", self.name)?;
        writeln!(f, "desc       : {}", self.description)?;
        writeln!(f, "author     : {}", self.author)?;
        writeln!(f, "tags       : {}", tags.join(", "))?;
        writeln!(f, "variants   : {}", self.variants)
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const FIELD_SEPARATOR: u8 = 0x1f;

/// Stable identifier derived from name, description and author.
///
/// 64-bit FNV-1a; fields are separated so that moving characters between
/// them changes the hash.
pub fn test_identifier(name: &str, description: &str, author: &str) -> String {
    let mut hash = FNV_OFFSET_BASIS;
    let mut feed = |bytes: &[u8]| {
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    };

    feed(name.as_bytes());
    feed(&[FIELD_SEPARATOR]);
    feed(description.as_bytes());
    feed(&[FIELD_SEPARATOR]);
    feed(author.as_bytes());

    format!("{hash:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_is_stable() {
        let a = test_identifier("Create a namespace", "creates a namespace", "Antoine");
        let b = test_identifier("Create a namespace", "creates a namespace", "Antoine");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_identifier_differs_per_field() {
        let base = test_identifier("n", "d", "a");
        assert_ne!(base, test_identifier("n2", "d", "a"));
        assert_ne!(base, test_identifier("n", "d2", "a"));
        assert_ne!(base, test_identifier("n", "d", "a2"));
    }

    #[test]
    fn test_identifier_field_boundaries() {
        assert_ne!(
            test_identifier("ab", "c", "x"),
            test_identifier("a", "bc", "x")
        );
    }

    #[test]
    fn test_definition_builder() {
        let def = TestDefinition::new("t")
            .description("d")
            .author("a")
            .tags(["a", "b"])
            .tag("c")
            .function(|_, _| async { Ok(()) });

        assert_eq!(def.tags.len(), 3);
        assert!(def.function.is_some());
        assert!(def.setup.is_none());
    }
}
