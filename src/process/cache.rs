//! Short-lived process handle cache keyed by pid
//!
//! Every entry carries a generation number drawn from a single counter.
//! When a cached handle fails its liveness check the entry is replaced and
//! the pid moves to a new generation, so callers holding a
//! [`ProcessIdentity`](crate::core::ProcessIdentity) can tell that the
//! identifier now names a different process.

use crate::core::types::{MemoryResult, ProcessId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug)]
struct CacheEntry<H> {
    handle: Arc<H>,
    generation: u64,
}

#[derive(Debug)]
struct CacheState<H> {
    entries: HashMap<ProcessId, CacheEntry<H>>,
    next_generation: u64,
}

/// Maps pids to open handles, revalidating each entry on use
#[derive(Debug)]
pub struct HandleCache<H> {
    state: Mutex<CacheState<H>>,
    max_entries: usize,
}

impl<H> HandleCache<H> {
    /// Creates a cache holding at most `max_entries` handles
    pub fn new(max_entries: usize) -> Self {
        HandleCache {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_generation: 1,
            }),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<H>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a live handle for `pid` and its generation.
    ///
    /// A cached handle is reused only while `is_live` reports it running;
    /// otherwise `open` is called and the result stored under a fresh
    /// generation. Errors from `open` leave the cache without an entry for
    /// the pid.
    ///
    /// The lock covers map access only. `open` and `is_live` run unlocked,
    /// so two threads refreshing the same pid may both open it; the first
    /// to store its handle wins and the other handle is dropped.
    pub fn resolve<O, L>(&self, pid: ProcessId, open: O, is_live: L) -> MemoryResult<(Arc<H>, u64)>
    where
        O: FnOnce(ProcessId) -> MemoryResult<H>,
        L: Fn(&H) -> MemoryResult<bool>,
    {
        let cached = self
            .lock()
            .entries
            .get(&pid)
            .map(|e| (Arc::clone(&e.handle), e.generation));

        let stale = match cached {
            Some((handle, generation)) if is_live(&handle).unwrap_or(false) => {
                return Ok((handle, generation));
            }
            Some((_, generation)) => {
                debug!(pid, generation, "evicting stale process handle");
                Some(generation)
            }
            None => None,
        };

        let opened = open(pid);
        let mut state = self.lock();

        match state.entries.get(&pid) {
            Some(entry) if Some(entry.generation) != stale => {
                // Refreshed by another caller while this one was opening
                return Ok((Arc::clone(&entry.handle), entry.generation));
            }
            Some(_) => {
                state.entries.remove(&pid);
            }
            None => {}
        }

        let handle = Arc::new(opened?);
        let generation = state.next_generation;
        state.next_generation += 1;

        if state.entries.len() >= self.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.generation)
                .map(|(pid, _)| *pid);
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }

        state.entries.insert(
            pid,
            CacheEntry {
                handle: Arc::clone(&handle),
                generation,
            },
        );
        Ok((handle, generation))
    }

    /// Generation currently cached for `pid`, if any
    pub fn generation(&self, pid: ProcessId) -> Option<u64> {
        self.lock().entries.get(&pid).map(|e| e.generation)
    }

    /// Drops the entry for `pid`
    pub fn invalidate(&self, pid: ProcessId) -> bool {
        self.lock().entries.remove(&pid).is_some()
    }

    /// Drops every entry
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MemoryError;
    use std::cell::Cell;

    #[test]
    fn test_reuses_live_handle() {
        let cache = HandleCache::new(4);
        let opens = Cell::new(0);
        let open = |pid: ProcessId| -> MemoryResult<u32> {
            opens.set(opens.get() + 1);
            Ok(pid * 10)
        };

        let (first, gen1) = cache.resolve(7, open, |_| Ok(true)).unwrap();
        let (second, gen2) = cache.resolve(7, open, |_| Ok(true)).unwrap();

        assert_eq!(*first, 70);
        assert_eq!(*second, 70);
        assert_eq!(gen1, gen2);
        assert_eq!(opens.get(), 1);
    }

    #[test]
    fn test_stale_handle_gets_new_generation() {
        let cache = HandleCache::new(4);
        let (_, gen1) = cache.resolve(7, |pid| Ok(pid), |_| Ok(true)).unwrap();
        let (_, gen2) = cache.resolve(7, |pid| Ok(pid), |_| Ok(false)).unwrap();
        assert!(gen2 > gen1);
        assert_eq!(cache.generation(7), Some(gen2));
    }

    #[test]
    fn test_liveness_error_counts_as_stale() {
        let cache = HandleCache::new(4);
        let (_, gen1) = cache.resolve(7, |pid| Ok(pid), |_| Ok(true)).unwrap();
        let (_, gen2) = cache
            .resolve(7, |pid| Ok(pid), |_| Err(MemoryError::native("is_running", "gone")))
            .unwrap();
        assert_ne!(gen1, gen2);
    }

    #[test]
    fn test_open_failure_leaves_no_entry() {
        let cache: HandleCache<u32> = HandleCache::new(4);
        let result = cache.resolve(7, |pid| Err(MemoryError::ProcessNotFound(pid)), |_| Ok(true));
        assert!(matches!(result, Err(MemoryError::ProcessNotFound(7))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_entry_evicted_when_full() {
        let cache = HandleCache::new(2);
        cache.resolve(1, |pid| Ok(pid), |_| Ok(true)).unwrap();
        cache.resolve(2, |pid| Ok(pid), |_| Ok(true)).unwrap();
        cache.resolve(3, |pid| Ok(pid), |_| Ok(true)).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.generation(1), None);
        assert!(cache.generation(3).is_some());
    }

    #[test]
    fn test_callbacks_run_without_the_lock() {
        let cache = HandleCache::new(4);
        cache.resolve(1, |pid| Ok(pid), |_| Ok(true)).unwrap();

        // Re-entering the cache from `open` and `is_live` must not block
        let (handle, _) = cache
            .resolve(
                2,
                |pid| {
                    cache.resolve(1, |pid| Ok(pid), |_| Ok(true))?;
                    Ok(pid)
                },
                |_| Ok(cache.generation(1).is_some()),
            )
            .unwrap();
        assert_eq!(*handle, 2);

        let (handle, _) = cache
            .resolve(2, |pid| Ok(pid + 100), |_| Ok(cache.len() == 2))
            .unwrap();
        assert_eq!(*handle, 2);
    }

    #[test]
    fn test_concurrent_refresh_keeps_first_handle() {
        let cache = HandleCache::new(4);
        let (_, stale) = cache.resolve(7, |pid| Ok(pid), |_| Ok(true)).unwrap();

        let (handle, generation) = cache
            .resolve(
                7,
                |_| {
                    // Another caller refreshes the entry in the meantime
                    cache.invalidate(7);
                    cache.resolve(7, |_| Ok(70), |_| Ok(true))?;
                    Ok(700)
                },
                |_| Ok(false),
            )
            .unwrap();

        assert_eq!(*handle, 70);
        assert!(generation > stale);
        assert_eq!(cache.generation(7), Some(generation));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = HandleCache::new(0);
        assert_eq!(cache.max_entries(), 1);

        cache.resolve(1, |pid| Ok(pid), |_| Ok(true)).unwrap();
        assert!(cache.invalidate(1));
        assert!(!cache.invalidate(1));

        cache.resolve(2, |pid| Ok(pid), |_| Ok(true)).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
