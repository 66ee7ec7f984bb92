//! Suggested balloon types

use serde::{Deserialize, Serialize};

pub const DEFAULT_TYPES: &[&str] = &[
    "Diameter", "Length", "Width", "Height", "X", "Y", "Z", "Angle", "Radius",
];

/// Ordered, append-only set of type labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: Vec<String>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_TYPES.iter().copied())
    }
}

impl TypeRegistry {
    pub fn with_defaults<I, S>(defaults: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self { types: Vec::new() };
        for label in defaults {
            registry.add(label);
        }
        registry
    }

    /// Appends `label` unless it is blank or already present (exact,
    /// case-sensitive match). Returns whether it was added.
    pub fn add(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if label.trim().is_empty() || self.contains(&label) {
            return false;
        }
        self.types.push(label);
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        self.types.iter().any(|t| t == label)
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn first(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_with_defaults_in_order() {
        let registry = TypeRegistry::default();
        assert_eq!(registry.len(), DEFAULT_TYPES.len());
        assert_eq!(registry.first(), Some("Diameter"));
        assert_eq!(registry.types().last().map(String::as_str), Some("Radius"));
    }

    #[test]
    fn test_custom_type_added_once() {
        let mut registry = TypeRegistry::default();
        assert!(registry.add("Thread Pitch"));
        assert!(!registry.add("Thread Pitch"));
        let count = registry
            .types()
            .iter()
            .filter(|t| *t == "Thread Pitch")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let mut registry = TypeRegistry::default();
        assert!(registry.add("diameter"));
        assert!(registry.contains("Diameter"));
        assert!(registry.contains("diameter"));
    }

    #[test]
    fn test_blank_label_rejected() {
        let mut registry = TypeRegistry::with_defaults(Vec::<String>::new());
        assert!(!registry.add(""));
        assert!(!registry.add("   "));
        assert!(registry.is_empty());
    }
}
