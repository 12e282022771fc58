//! Cross-token relations (token A priced in units of token B).

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::cache::LockedCache;
use crate::registry::TokenRegistry;

/// Configured correlated pairs, by canonical id.
#[derive(Debug, Clone, Default)]
pub struct RelationTable {
    pairs: Vec<(String, String)>,
}

impl RelationTable {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Canonical ids correlated with `id`, in configuration order.
    pub fn partners<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter_map(move |(a, b)| {
            if a == id {
                Some(b.as_str())
            } else if b == id {
                Some(a.as_str())
            } else {
                None
            }
        })
    }

    /// The same pairs keyed by canonical id, as resolved by `registry`.
    ///
    /// Pairs with a side the registry does not know are dropped.
    pub fn resolved(&self, registry: &TokenRegistry) -> Self {
        let pairs = self
            .pairs
            .iter()
            .filter_map(|(a, b)| match (registry.resolve(a), registry.resolve(b)) {
                (Ok(a_id), Ok(b_id)) => Some((a_id.to_string(), b_id.to_string())),
                _ => {
                    warn!("Skipping relation {}:{}, token not registered", a, b);
                    None
                }
            })
            .collect();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Ratio `price / other`, or `None` if either side is zero or unknown.
pub fn relation_value(price: Option<f64>, other: Option<f64>) -> Option<f64> {
    match (price, other) {
        (Some(p), Some(o)) if p != 0.0 && o != 0.0 && p.is_finite() && o.is_finite() => Some(p / o),
        _ => None,
    }
}

/// Computes relations for a freshly fetched snapshot from inside the cache lock.
pub struct RelationResolver<'a> {
    table: &'a RelationTable,
}

impl<'a> RelationResolver<'a> {
    pub fn new(table: &'a RelationTable) -> Self {
        Self { table }
    }

    /// Relations for `id` at `price`, keyed by the partner's upper-cased symbol.
    ///
    /// Partner lookups go through `cache`, which already holds the lock.
    /// A failed partner lookup drops that relation only.
    pub async fn resolve(
        &self,
        id: &str,
        price: Option<f64>,
        cache: &LockedCache<'_>,
    ) -> BTreeMap<String, f64> {
        let mut relations = BTreeMap::new();

        for other_id in self.table.partners(id) {
            let other = match cache.get_nested(other_id).await {
                Ok(other) => other,
                Err(e) => {
                    warn!("Skipping relation {} -> {}: {}", id, other_id, e);
                    continue;
                }
            };

            match relation_value(price, other.current_price) {
                Some(value) => {
                    relations.insert(other.symbol.to_uppercase(), value);
                }
                None => debug!("No relation {} -> {}: zero or missing price", id, other_id),
            }
        }

        relations
    }
}
