//! List cache tuning, resolved from the `[cache]` settings table.

use std::num::NonZeroUsize;

const DEFAULT_LIST_LIMIT: NonZeroUsize = match NonZeroUsize::new(200) {
    Some(limit) => limit,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// When off, lists are never read or written and every load is a miss.
    pub enabled: bool,
    /// Records kept per list (L).
    pub list_limit: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl CacheConfig {
    /// Enabled cache keeping `list_limit` records per list; zero becomes one.
    pub fn with_list_limit(list_limit: usize) -> Self {
        Self {
            enabled: true,
            list_limit: NonZeroUsize::new(list_limit).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn disabled(self) -> Self {
        Self {
            enabled: false,
            ..self
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enable_list_cache,
            list_limit: settings.list_limit,
        }
    }
}
