//! Token alias registry.
//!
//! Maps case-insensitive user keys (id, symbol, name or slug) to the
//! provider's canonical id. Built once and read-only afterwards.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::PriceError;
use ticker_presence_types::TokenIdentity;

/// Key spaces in registration priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySpace {
    Id,
    Symbol,
    Name,
    Slug,
}

impl KeySpace {
    const ALL: [KeySpace; 4] = [KeySpace::Id, KeySpace::Symbol, KeySpace::Name, KeySpace::Slug];

    fn key_of(self, token: &TokenIdentity) -> Option<&str> {
        match self {
            KeySpace::Id => Some(&token.canonical_id),
            KeySpace::Symbol => Some(&token.symbol),
            KeySpace::Name => Some(&token.name),
            KeySpace::Slug => token.slug.as_deref(),
        }
    }
}

/// Alias to canonical id resolution table.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    /// Lower-cased key to canonical id. Registration never overwrites.
    lookup: HashMap<String, String>,

    /// Identities keyed by canonical id.
    tokens: HashMap<String, TokenIdentity>,
}

impl TokenRegistry {
    /// Build a registry from a provider token list.
    pub fn new(tokens: Vec<TokenIdentity>) -> Self {
        Self::with_aliases(tokens, &[])
    }

    /// Build a registry with extra static aliases (`alias`, `canonical_id`).
    ///
    /// Aliases are registered before the provider keys so they win any
    /// collision. An alias whose target is not in `tokens` is skipped.
    pub fn with_aliases(tokens: Vec<TokenIdentity>, aliases: &[(String, String)]) -> Self {
        let mut registry = Self::default();

        for token in &tokens {
            registry
                .tokens
                .entry(token.canonical_id.clone())
                .or_insert_with(|| token.clone());
        }

        for (alias, canonical_id) in aliases {
            if registry.tokens.contains_key(canonical_id) {
                registry.register(alias, canonical_id);
            } else {
                warn!("Skipping alias {} for unknown token {}", alias, canonical_id);
            }
        }

        for space in KeySpace::ALL {
            for token in &tokens {
                if let Some(key) = space.key_of(token) {
                    registry.register(key, &token.canonical_id);
                }
            }
        }

        debug!(
            "Token registry built: {} tokens, {} keys",
            registry.tokens.len(),
            registry.lookup.len()
        );

        registry
    }

    fn register(&mut self, key: &str, canonical_id: &str) {
        self.lookup
            .entry(key.to_lowercase())
            .or_insert_with(|| canonical_id.to_string());
    }

    /// Resolve a key to its canonical id.
    pub fn resolve(&self, key: &str) -> Result<&str, PriceError> {
        self.lookup
            .get(&key.to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| PriceError::NotFound(key.to_string()))
    }

    pub fn exists(&self, key: &str) -> bool {
        self.lookup.contains_key(&key.to_lowercase())
    }

    /// Identity registered under a canonical id.
    pub fn identity(&self, canonical_id: &str) -> Option<&TokenIdentity> {
        self.tokens.get(canonical_id)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
