//! Factor registry.
//!
//! Maps factor names to constructors and serves as the [`FactorEngine`] the
//! runner creates factors from. Names are matched case-insensitively.

use std::collections::HashMap;

use anyhow::Result;
use factor_platform_core::{Factor, FactorEngine};

use crate::factors::{rmi, RmiFactor};

type Constructor = Box<dyn Fn() -> Box<dyn Factor> + Send + Sync>;

/// Registry of factor constructors.
pub struct FactorRegistry {
    constructors: HashMap<String, Constructor>,
}

impl Default for FactorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FactorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in factors registered.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(rmi::NAME, || Box::new(RmiFactor::new()));
        registry
    }

    /// Registers a constructor under `name`.
    ///
    /// If a factor with the same name already exists, it will be replaced.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Factor> + Send + Sync + 'static,
    {
        self.constructors
            .insert(name.to_ascii_lowercase(), Box::new(constructor));
    }

    /// Returns true if the registry knows `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(&name.to_ascii_lowercase())
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl FactorEngine for FactorRegistry {
    fn create(&self, name: &str) -> Result<Box<dyn Factor>> {
        let constructor = self
            .constructors
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Factor '{}' not found", name))?;

        Ok(constructor())
    }
}

impl std::fmt::Debug for FactorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactorRegistry")
            .field("factors", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_include_rmi() {
        let registry = FactorRegistry::with_builtins();

        assert!(registry.contains("RMI"));
        assert_eq!(registry.names(), vec!["rmi"]);
    }

    #[test]
    fn test_create_is_case_insensitive() {
        let registry = FactorRegistry::with_builtins();

        let factor = registry.create("rmi").unwrap();
        assert_eq!(factor.name(), "RMI");
        assert!(registry.create("Rmi").is_ok());
    }

    #[test]
    fn test_unknown_factor_is_error() {
        let registry = FactorRegistry::new();

        assert!(registry.is_empty());
        let err = registry.create("MACD").err().unwrap();
        assert!(err.to_string().contains("MACD"));
    }

    #[test]
    fn test_register_replaces_existing() {
        let mut registry = FactorRegistry::with_builtins();
        registry.register("rmi", || Box::new(RmiFactor::new()));

        assert_eq!(registry.len(), 1);
    }
}
