//! Request deduplication cache
//!
//! Guards expensive fetches keyed by `(client, scope)`. While a fetch for a
//! key is outstanding, or its result is cached, a second `begin` for the
//! same key is a no-op. Fresh results after a mutation need an explicit
//! `invalidate`.
//!
//! Stale results are dropped on arrival: every fetch carries a
//! [`FetchTicket`] with the generation it started under and a weak handle
//! to the caller's [`RequestScope`]. If the key was invalidated in the
//! meantime, or the caller dropped its scope, `complete` discards the value.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use cap_table_types::ClientId;

/// Liveness token of the caller waiting on a fetch. Dropping it marks every
/// outstanding ticket issued under it as abandoned.
#[derive(Debug, Default)]
pub struct RequestScope {
    alive: Arc<()>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Proof that the holder started the fetch for `key`
#[derive(Debug)]
pub struct FetchTicket<K> {
    key: K,
    generation: u64,
    scope: Weak<()>,
}

impl<K> FetchTicket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn is_abandoned(&self) -> bool {
        self.scope.strong_count() == 0
    }
}

#[derive(Debug)]
enum Slot<V> {
    InFlight { generation: u64 },
    Ready { value: Arc<V> },
}

#[derive(Debug)]
struct Inner<K, V> {
    slots: HashMap<K, Slot<V>>,
    next_generation: u64,
}

#[derive(Debug)]
pub struct RequestCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> Default for RequestCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 0,
            }),
        }
    }
}

impl<K, V> RequestCache<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fetch for `key`. Returns `None` when one is already in flight
    /// or a result is cached.
    pub fn begin(&self, key: K, scope: &RequestScope) -> Option<FetchTicket<K>> {
        let mut inner = self.lock();
        if inner.slots.contains_key(&key) {
            tracing::debug!(?key, "Fetch already in flight or satisfied");
            return None;
        }
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner
            .slots
            .insert(key.clone(), Slot::InFlight { generation });
        Some(FetchTicket {
            key,
            generation,
            scope: Arc::downgrade(&scope.alive),
        })
    }

    /// Store a fetch result. Returns `false` when the result was discarded
    /// because the key was invalidated or the requesting scope is gone.
    pub fn complete(&self, ticket: FetchTicket<K>, value: V) -> bool {
        let mut inner = self.lock();
        let current = matches!(
            inner.slots.get(&ticket.key),
            Some(Slot::InFlight { generation }) if *generation == ticket.generation
        );

        if !current {
            tracing::warn!(key = ?ticket.key, "Discarding superseded fetch result");
            return false;
        }
        if ticket.is_abandoned() {
            inner.slots.remove(&ticket.key);
            tracing::warn!(key = ?ticket.key, "Discarding fetch result for dropped scope");
            return false;
        }

        inner.slots.insert(
            ticket.key,
            Slot::Ready {
                value: Arc::new(value),
            },
        );
        true
    }

    /// Clear the in-flight marker after a failed fetch so a retry can start
    pub fn fail(&self, ticket: FetchTicket<K>) {
        let mut inner = self.lock();
        if matches!(
            inner.slots.get(&ticket.key),
            Some(Slot::InFlight { generation }) if *generation == ticket.generation
        ) {
            inner.slots.remove(&ticket.key);
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        match self.lock().slots.get(key) {
            Some(Slot::Ready { value }) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        matches!(self.lock().slots.get(key), Some(Slot::InFlight { .. }))
    }

    /// Forget `key`; an outstanding fetch for it will be discarded on arrival
    pub fn invalidate(&self, key: &K) {
        self.lock().slots.remove(key);
    }

    pub fn invalidate_where<F>(&self, mut predicate: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.lock().slots.retain(|key, _| !predicate(key));
    }
}

impl<S, V> RequestCache<(ClientId, S), V>
where
    S: Eq + Hash + Clone + Debug,
{
    /// Drop every entry belonging to `client`
    pub fn invalidate_client(&self, client: ClientId) {
        self.invalidate_where(|(owner, _)| *owner == client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Cache = RequestCache<(ClientId, &'static str), u32>;

    #[test]
    fn second_begin_is_noop_while_in_flight() {
        let cache = Cache::new();
        let scope = RequestScope::new();
        let key = (ClientId::new(), "badges");

        let ticket = cache.begin(key, &scope).unwrap();
        assert!(cache.begin(key, &scope).is_none());
        assert!(cache.is_in_flight(&key));

        assert!(cache.complete(ticket, 7));
        assert_eq!(cache.get(&key).as_deref(), Some(&7));
        assert!(cache.begin(key, &scope).is_none());
    }

    #[test]
    fn invalidate_discards_late_result() {
        let cache = Cache::new();
        let scope = RequestScope::new();
        let key = (ClientId::new(), "badges");

        let stale = cache.begin(key, &scope).unwrap();
        cache.invalidate(&key);
        let fresh = cache.begin(key, &scope).unwrap();

        assert!(!cache.complete(stale, 1));
        assert!(cache.complete(fresh, 2));
        assert_eq!(cache.get(&key).as_deref(), Some(&2));
    }

    #[test]
    fn dropped_scope_discards_result_and_allows_retry() {
        let cache = Cache::new();
        let key = (ClientId::new(), "badges");
        let scope = RequestScope::new();
        let ticket = cache.begin(key, &scope).unwrap();
        drop(scope);

        assert!(!cache.complete(ticket, 9));
        assert!(cache.get(&key).is_none());
        assert!(cache.begin(key, &RequestScope::new()).is_some());
    }

    #[test]
    fn failure_clears_in_flight_marker() {
        let cache = Cache::new();
        let scope = RequestScope::new();
        let key = (ClientId::new(), "badges");
        let ticket = cache.begin(key, &scope).unwrap();
        cache.fail(ticket);
        assert!(cache.begin(key, &scope).is_some());
    }

    #[test]
    fn invalidate_client_leaves_other_clients() {
        let cache = Cache::new();
        let scope = RequestScope::new();
        let mine = (ClientId::new(), "badges");
        let theirs = (ClientId::new(), "badges");
        for key in [mine, theirs] {
            let ticket = cache.begin(key, &scope).unwrap();
            cache.complete(ticket, 1);
        }

        cache.invalidate_client(mine.0);
        assert!(cache.get(&mine).is_none());
        assert!(cache.get(&theirs).is_some());
    }
}
