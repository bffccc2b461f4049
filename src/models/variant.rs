//! Test variants
//!
//! A variant is a named alternate input a test can execute under.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Label of the implicit variant used when a test declares none
pub const BASE_VARIANT: &str = "base";

/// Opaque payload shared with test bodies
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Label to opaque-data mapping, iterated in label order.
#[derive(Clone, Default)]
pub struct Variants {
    entries: BTreeMap<String, Option<Payload>>,
}

impl Variants {
    pub fn new() -> Self {
        Self::default()
    }

    /// The implicit `"base" -> nil` singleton
    pub fn base() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(BASE_VARIANT.to_string(), None);
        Self { entries }
    }

    /// Add a variant carrying data
    pub fn with<T: Any + Send + Sync>(mut self, label: impl Into<String>, data: T) -> Self {
        self.entries.insert(label.into(), Some(Arc::new(data)));
        self
    }

    /// Add a variant without data
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.entries.insert(label.into(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    pub fn get(&self, label: &str) -> Option<Option<Payload>> {
        self.entries.get(label).cloned()
    }

    /// Labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Payload>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Keep only the labels present in `requested`
    pub fn retain_labels(&self, requested: &[String]) -> Self {
        let entries = self
            .entries
            .iter()
            .filter(|(label, _)| requested.iter().any(|r| r == *label))
            .map(|(label, data)| (label.clone(), data.clone()))
            .collect();
        Self { entries }
    }
}

impl fmt::Debug for Variants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.labels()).finish()
    }
}

impl fmt::Display for Variants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.labels().collect();
        write!(f, "{}", labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_variant() {
        let variants = Variants::base();
        assert_eq!(variants.len(), 1);
        assert!(variants.contains(BASE_VARIANT));
        assert!(variants.get(BASE_VARIANT).unwrap().is_none());
    }

    #[test]
    fn test_labels_are_sorted() {
        let variants = Variants::new()
            .with("no-data-variant", ())
            .with("data-variant", "data-for-variant");
        let labels: Vec<&str> = variants.labels().collect();
        assert_eq!(labels, vec!["data-variant", "no-data-variant"]);
    }

    #[test]
    fn test_retain_labels() {
        let variants = Variants::new().with_label("json").with_label("msgpack");
        let kept = variants.retain_labels(&["msgpack".to_string(), "xml".to_string()]);
        assert_eq!(kept.len(), 1);
        assert!(kept.contains("msgpack"));
    }
}
