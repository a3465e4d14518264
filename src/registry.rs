//! Dialect name → [`PatternExtractor`] lookup.
//!
//! A collection's name picks its dialect by exact match against a table of
//! `(name, constructor)` entries. Names with no entry fall back to the
//! [`GenericExtractor`]. Supporting a new dialect means registering one
//! more entry; existing extractors are never touched.
//!
//! ```rust
//! use texkb::registry::ExtractorRegistry;
//!
//! let registry = ExtractorRegistry::with_builtins();
//! assert_eq!(registry.dialect_for("pgfplots"), "standard");
//! assert_eq!(registry.dialect_for("tcolorbox"), "generic");
//! ```

use crate::dialect_chemfig::ChemfigExtractor;
use crate::dialect_circuitikz::CircuitikzExtractor;
use crate::dialect_generic::GenericExtractor;
use crate::dialect_standard::StandardExtractor;
use crate::dialect_tikz_network::TikzNetworkExtractor;
use crate::dialect_tkz_euclide::TkzEuclideExtractor;
use crate::extract::PatternExtractor;

/// Builds a fresh extractor for one collection.
pub type ExtractorCtor = fn() -> Box<dyn PatternExtractor>;

/// Registration table of dialect constructors.
pub struct ExtractorRegistry {
    entries: Vec<(String, ExtractorCtor)>,
}

impl ExtractorRegistry {
    /// Create a registry with no dialects; everything resolves to the fallback.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create a registry with every built-in dialect.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("tikz-network", || Box::new(TikzNetworkExtractor));
        registry.register("chemfig", || Box::new(ChemfigExtractor));
        registry.register("circuitikz", || Box::new(CircuitikzExtractor));
        registry.register("tkz-euclide", || Box::new(TkzEuclideExtractor));
        registry.register("pgfplots", || Box::new(StandardExtractor));
        registry.register("tikz-pgf", || Box::new(StandardExtractor));
        registry
    }

    /// Add a table entry. A later entry for the same name shadows earlier ones.
    pub fn register(&mut self, name: &str, ctor: ExtractorCtor) {
        self.entries.push((name.to_string(), ctor));
    }

    /// Extractor for `name`, or the generic fallback.
    pub fn resolve(&self, name: &str) -> Box<dyn PatternExtractor> {
        match self.entries.iter().rev().find(|(n, _)| n == name) {
            Some((_, ctor)) => ctor(),
            None => Box::new(GenericExtractor),
        }
    }

    /// Label of the dialect `name` resolves to.
    pub fn dialect_for(&self, name: &str) -> String {
        self.resolve(name).dialect().to_string()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
