//! Compiled Selector Cache
//!
//! Process-wide LRU cache so repeated path strings are compiled once.

use super::compiler::Selector;
use crate::error::Result;
use log::trace;
use lru::LruCache;
use once_cell::sync::Lazy;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Number of compiled selectors kept
pub const CACHE_CAPACITY: usize = 128;

static CACHE: Lazy<Mutex<LruCache<String, Selector>>> = Lazy::new(|| {
    let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
    Mutex::new(LruCache::new(capacity))
});

/// Compile `expr`, reusing a cached selector when possible.
///
/// Syntax errors are not cached.
pub fn compile_cached(expr: &str) -> Result<Selector> {
    {
        let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(selector) = cache.get(expr) {
            trace!("selector cache hit for {:?}", expr);
            return Ok(selector.clone());
        }
    }

    // Compile outside the lock
    let selector = Selector::compile(expr)?;
    let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
    cache.put(expr.to_string(), selector.clone());
    Ok(selector)
}

/// Number of cached selectors
pub fn cached_len() -> usize {
    CACHE.lock().unwrap_or_else(|e| e.into_inner()).len()
}

/// Drop every cached selector
pub fn clear() {
    CACHE.lock().unwrap_or_else(|e| e.into_inner()).clear();
}
