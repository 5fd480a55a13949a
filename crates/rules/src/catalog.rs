//! The immutable rule catalog.
//!
//! Built once at engine start; insertion order is evaluation order, so
//! runs over identical inputs produce identically ordered results.

use indexmap::IndexMap;

use tieout_core::{RuleCategory, RuleDefinition};

use crate::unit::RuleUnit;
use crate::{analytics, covenant, crossdoc, forensic, quality, rentroll};

pub struct RuleCatalog {
    units: IndexMap<String, Box<dyn RuleUnit>>,
}

impl RuleCatalog {
    pub fn empty() -> Self {
        Self { units: IndexMap::new() }
    }

    /// The full standard catalog, every category registered.
    pub fn standard() -> Self {
        let mut catalog = Self::empty();
        forensic::register(&mut catalog);
        crossdoc::register(&mut catalog);
        quality::register(&mut catalog);
        analytics::register(&mut catalog);
        covenant::register(&mut catalog);
        rentroll::register(&mut catalog);
        tracing::debug!(units = catalog.len(), "rule catalog built");
        catalog
    }

    /// Register a unit. Rule codes must be unique across categories.
    pub fn register(&mut self, unit: Box<dyn RuleUnit>) {
        let code = unit.definition().code.clone();
        let previous = self.units.insert(code.clone(), unit);
        assert!(previous.is_none(), "duplicate rule code registered: {code}");
    }

    pub fn get(&self, code: &str) -> Option<&dyn RuleUnit> {
        self.units.get(code).map(|u| u.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn RuleUnit> {
        self.units.values().map(|u| u.as_ref())
    }

    pub fn definitions(&self) -> Vec<&RuleDefinition> {
        self.units.values().map(|u| u.definition()).collect()
    }

    pub fn count_in(&self, category: RuleCategory) -> usize {
        self.units
            .values()
            .filter(|u| u.definition().category == category)
            .count()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_is_full_and_unique() {
        let catalog = RuleCatalog::standard();
        // Uniqueness is enforced at registration; the map cannot hold
        // duplicate codes.
        assert!(catalog.len() >= 150, "catalog has only {} units", catalog.len());
        for category in RuleCategory::ALL {
            assert!(
                catalog.count_in(category) > 0,
                "no units registered for {category}"
            );
        }
    }

    #[test]
    fn insertion_order_is_stable() {
        let a: Vec<String> = RuleCatalog::standard()
            .definitions()
            .iter()
            .map(|d| d.code.clone())
            .collect();
        let b: Vec<String> = RuleCatalog::standard()
            .definitions()
            .iter()
            .map(|d| d.code.clone())
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn lookup_by_code() {
        let catalog = RuleCatalog::standard();
        assert!(catalog.get("XD-101").is_some());
        assert!(catalog.get("NOPE-000").is_none());
    }
}
