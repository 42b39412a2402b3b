//! Translation completion data.
//!
//! Completion percentages come from a [`CompletionSource`]. The builder owns a
//! [`CompletionCache`] so the translation service is queried at most once per
//! builder unless a caller explicitly asks for a refresh.

mod weblate;

use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;

use crate::error::CompletionError;

pub use weblate::WeblateClient;

/// Language code -> translated percentage (0 to 100).
pub type CompletionMap = BTreeMap<String, f64>;

/// Where completion percentages come from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionSource: Send + Sync {
    async fn fetch(&self) -> Result<CompletionMap, CompletionError>;
}

/// Lazily fetched, memoized completion data.
pub struct CompletionCache<C: CompletionSource> {
    source: C,
    cached: Option<CompletionMap>,
}

impl<C: CompletionSource> CompletionCache<C> {
    pub fn new(source: C) -> Self {
        Self {
            source,
            cached: None,
        }
    }

    /// Returns the completion map, fetching it on first use.
    /// A failed fetch leaves the cache empty.
    pub async fn get(&mut self) -> Result<&CompletionMap, CompletionError> {
        if self.cached.is_none() {
            debug!("Fetching translation completion");
            self.cached = Some(self.source.fetch().await?);
        }

        Ok(self.cached.get_or_insert_with(CompletionMap::new))
    }

    /// Discard the cached map and fetch it again.
    pub async fn refresh(&mut self) -> Result<&CompletionMap, CompletionError> {
        self.cached = None;
        self.get().await
    }

    #[cfg(test)]
    fn cached(&self) -> Option<&CompletionMap> {
        self.cached.as_ref()
    }
}

/// Completion of `code`, 0 when the service does not know it.
pub fn percent_of(completion: &CompletionMap, code: &str) -> f64 {
    completion.get(code).copied().unwrap_or(0.0)
}
