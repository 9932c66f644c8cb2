//! Thread-safe query cache with versioned entries and update notifications.
//!
//! Every write (fetch result, optimistic patch, push merge, rollback) stamps
//! the entry with a fresh value from a process-wide monotonic counter. The
//! version is what lets a rollback tell whether anybody else wrote an entry
//! after the optimistic patch.
//!
//! Closures passed to [`QueryCache::patch`] run under the cache's write lock
//! and must not call back into the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::domain::{KeyFilter, QueryKey, QueryValue};

/// What happened to a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Replaced wholesale (fetch result or explicit write).
    Written,
    /// Modified in place by an optimistic patch or a push merge.
    Patched,
    /// Marked stale.
    Invalidated,
    /// Restored from a mutation snapshot.
    Restored,
    /// Evicted.
    Removed,
}

/// Notification sent when an entry changes.
#[derive(Debug, Clone)]
pub struct CacheUpdate {
    pub key: QueryKey,
    pub change: ChangeKind,
    pub version: u64,
}

/// A cached value plus bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    value: QueryValue,
    version: u64,
    fetched_at: Instant,
    invalidated: bool,
}

impl CacheEntry {
    #[must_use]
    pub fn value(&self) -> &QueryValue {
        &self.value
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Stale once invalidated or older than `stale_after`.
    #[must_use]
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        self.invalidated || self.fetched_at.elapsed() >= stale_after
    }
}

/// Permission to store the result of one network fetch.
///
/// Obtained from [`QueryCache::begin_fetch`]; the result is only stored if
/// the key's fetch generation did not move in the meantime.
#[derive(Debug)]
pub struct FetchTicket {
    key: QueryKey,
    generation: u64,
}

impl FetchTicket {
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

/// Handle for a fetch pause; see [`QueryCache::pause_fetches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseId(u64);

/// Entries captured before an optimistic patch.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    key: QueryKey,
    before: CacheEntry,
    /// Version written by the optimistic patch, if the patch touched this entry.
    patched: Option<u64>,
}

impl Snapshot {
    /// Record which entries the optimistic patch changed.
    pub fn mark_patched(&mut self, report: &PatchReport) {
        for entry in &mut self.entries {
            if let Some((_, version)) = report.changed.iter().find(|(key, _)| key == &entry.key) {
                entry.patched = Some(*version);
            }
        }
    }

    /// Keys captured by this snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Value captured for `key`.
    #[must_use]
    pub fn value(&self, key: &QueryKey) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map(|e| &e.before.value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entries changed by a [`QueryCache::patch`] call with their new versions.
#[derive(Debug, Clone, Default)]
pub struct PatchReport {
    pub changed: Vec<(QueryKey, u64)>,
}

impl PatchReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.changed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Outcome of [`QueryCache::rollback`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Entries put back verbatim.
    pub restored: usize,
    /// Entries written by someone else since the patch whose patched records
    /// were reverted one by one.
    pub reverted: usize,
    /// Entries written by someone else since the patch; marked stale.
    pub invalidated: usize,
}

#[derive(Debug, Default)]
struct FetchState {
    generation: u64,
    in_flight: bool,
}

#[derive(Debug, Default)]
struct FetchControl {
    states: HashMap<QueryKey, FetchState>,
    pauses: Vec<(u64, KeyFilter)>,
    next_pause: u64,
}

impl FetchControl {
    fn is_paused(&self, key: &QueryKey) -> bool {
        self.pauses.iter().any(|(_, filter)| filter.matches(key))
    }
}

/// Process-wide store of query results.
///
/// Construct once at startup and share by `Arc`.
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CacheEntry>>,
    fetches: Mutex<FetchControl>,
    next_version: AtomicU64,
    stale_after: Duration,
    tx: broadcast::Sender<CacheUpdate>,
}

impl QueryCache {
    /// Create a cache whose entries go stale after `stale_after`.
    #[must_use]
    pub fn new(stale_after: Duration) -> Self {
        Self::with_capacity(stale_after, 1024)
    }

    /// Like [`QueryCache::new`] with an explicit notification buffer size.
    #[must_use]
    pub fn with_capacity(stale_after: Duration, notify_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(notify_capacity.max(1));
        Self {
            entries: RwLock::new(HashMap::new()),
            fetches: Mutex::new(FetchControl::default()),
            next_version: AtomicU64::new(1),
            stale_after,
            tx,
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    fn bump(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    fn notify(&self, updates: Vec<CacheUpdate>) {
        for update in updates {
            trace!(key = %update.key, change = ?update.change, version = update.version, "Cache update");
            // No receivers is fine.
            let _ = self.tx.send(update);
        }
    }

    /// Current value for `key`.
    #[must_use]
    pub fn read(&self, key: &QueryKey) -> Option<QueryValue> {
        self.entries.read().get(key).map(|e| e.value.clone())
    }

    /// Current entry for `key`, including version and staleness.
    #[must_use]
    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    #[must_use]
    pub fn version_of(&self, key: &QueryKey) -> Option<u64> {
        self.entries.read().get(key).map(|e| e.version)
    }

    /// True if `key` is missing, invalidated, or older than `stale_after`.
    #[must_use]
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries
            .read()
            .get(key)
            .map_or(true, |e| e.is_stale(self.stale_after))
    }

    /// Keys currently stale.
    #[must_use]
    pub fn stale_keys(&self) -> Vec<QueryKey> {
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.is_stale(self.stale_after))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// All keys matching `filter`.
    #[must_use]
    pub fn keys(&self, filter: &KeyFilter) -> Vec<QueryKey> {
        self.entries
            .read()
            .keys()
            .filter(|k| filter.matches(k))
            .cloned()
            .collect()
    }

    /// Replace the value for `key`. Returns the new version.
    pub fn write(&self, key: QueryKey, value: QueryValue) -> u64 {
        let version = self.bump();
        self.entries.write().insert(
            key.clone(),
            CacheEntry {
                value,
                version,
                fetched_at: Instant::now(),
                invalidated: false,
            },
        );
        self.notify(vec![CacheUpdate {
            key,
            change: ChangeKind::Written,
            version,
        }]);
        version
    }

    /// Apply `update` to every entry matching `filter`.
    ///
    /// `update` returns whether it changed the value; only changed entries get
    /// a new version and a notification.
    pub fn patch<F>(&self, filter: &KeyFilter, mut update: F) -> PatchReport
    where
        F: FnMut(&QueryKey, &mut QueryValue) -> bool,
    {
        let mut report = PatchReport::default();
        {
            let mut entries = self.entries.write();
            for (key, entry) in entries.iter_mut().filter(|(k, _)| filter.matches(k)) {
                if update(key, &mut entry.value) {
                    entry.version = self.bump();
                    report.changed.push((key.clone(), entry.version));
                }
            }
        }
        self.notify(
            report
                .changed
                .iter()
                .map(|(key, version)| CacheUpdate {
                    key: key.clone(),
                    change: ChangeKind::Patched,
                    version: *version,
                })
                .collect(),
        );
        report
    }

    /// Mark every entry matching `filter` stale. Returns how many were marked.
    pub fn invalidate(&self, filter: &KeyFilter) -> usize {
        let mut updates = Vec::new();
        {
            let mut entries = self.entries.write();
            for (key, entry) in entries.iter_mut().filter(|(k, _)| filter.matches(k)) {
                if !entry.invalidated {
                    entry.invalidated = true;
                    updates.push(CacheUpdate {
                        key: key.clone(),
                        change: ChangeKind::Invalidated,
                        version: entry.version,
                    });
                }
            }
        }
        let count = updates.len();
        if count > 0 {
            debug!(count, "Invalidated cache entries");
        }
        self.notify(updates);
        count
    }

    /// Evict every entry matching `filter`. Returns how many were removed.
    pub fn remove(&self, filter: &KeyFilter) -> usize {
        let mut updates = Vec::new();
        self.entries.write().retain(|key, entry| {
            if filter.matches(key) {
                updates.push(CacheUpdate {
                    key: key.clone(),
                    change: ChangeKind::Removed,
                    version: entry.version,
                });
                false
            } else {
                true
            }
        });
        let count = updates.len();
        self.notify(updates);
        count
    }

    /// Capture every entry matching `filter`.
    #[must_use]
    pub fn snapshot(&self, filter: &KeyFilter) -> Snapshot {
        let entries = self
            .entries
            .read()
            .iter()
            .filter(|(k, _)| filter.matches(k))
            .map(|(key, entry)| SnapshotEntry {
                key: key.clone(),
                before: entry.clone(),
                patched: None,
            })
            .collect();
        Snapshot { entries }
    }

    /// Undo an optimistic patch.
    ///
    /// An entry is restored verbatim only if its version is still the one the
    /// patch wrote (or, for untouched entries, the one captured). Entries that
    /// another writer changed in between are invalidated rather than
    /// overwritten, so a confirmed value is never replaced by pre-patch data.
    pub fn rollback(&self, snapshot: &Snapshot) -> RollbackReport {
        self.rollback_with(snapshot, |_, _, _| false)
    }

    /// Like [`rollback`](Self::rollback), but entries changed by another
    /// writer are first handed to `revert` with their captured value so the
    /// records the patch touched can be put back individually. `revert`
    /// returns whether it changed the current value. Those entries are
    /// invalidated either way.
    ///
    /// `revert` runs under the write lock.
    pub fn rollback_with<F>(&self, snapshot: &Snapshot, mut revert: F) -> RollbackReport
    where
        F: FnMut(&QueryKey, &QueryValue, &mut QueryValue) -> bool,
    {
        let mut report = RollbackReport::default();
        let mut updates = Vec::new();
        {
            let mut entries = self.entries.write();
            for snap in &snapshot.entries {
                let expected = snap.patched.unwrap_or(snap.before.version);
                match entries.get_mut(&snap.key) {
                    Some(current) if current.version == expected => {
                        if snap.patched.is_none() {
                            continue;
                        }
                        let version = self.bump();
                        *current = CacheEntry {
                            version,
                            ..snap.before.clone()
                        };
                        report.restored += 1;
                        updates.push(CacheUpdate {
                            key: snap.key.clone(),
                            change: ChangeKind::Restored,
                            version,
                        });
                    }
                    Some(current) => {
                        if snap.patched.is_none() {
                            continue;
                        }
                        if revert(&snap.key, &snap.before.value, &mut current.value) {
                            current.version = self.bump();
                            report.reverted += 1;
                            updates.push(CacheUpdate {
                                key: snap.key.clone(),
                                change: ChangeKind::Patched,
                                version: current.version,
                            });
                        }
                        if !current.invalidated {
                            current.invalidated = true;
                            report.invalidated += 1;
                            updates.push(CacheUpdate {
                                key: snap.key.clone(),
                                change: ChangeKind::Invalidated,
                                version: current.version,
                            });
                        }
                    }
                    // Evicted since the snapshot; nothing to restore into.
                    None => {}
                }
            }
        }
        self.notify(updates);
        report
    }

    /// Start a fetch for `key`, always granted.
    #[must_use]
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchTicket {
        let mut control = self.fetches.lock();
        let state = control.states.entry(key.clone()).or_default();
        state.in_flight = true;
        FetchTicket {
            key: key.clone(),
            generation: state.generation,
        }
    }

    /// Start a background fetch for `key` unless one is already running or
    /// fetches for the key are paused.
    #[must_use]
    pub fn try_begin_fetch(&self, key: &QueryKey) -> Option<FetchTicket> {
        let mut control = self.fetches.lock();
        if control.is_paused(key) {
            return None;
        }
        let state = control.states.entry(key.clone()).or_default();
        if state.in_flight {
            return None;
        }
        state.in_flight = true;
        Some(FetchTicket {
            key: key.clone(),
            generation: state.generation,
        })
    }

    /// Store a fetch result if the ticket is still current.
    ///
    /// Returns `false` when the fetch was cancelled or its key is paused; the
    /// value is dropped in that case.
    pub fn complete_fetch(&self, ticket: FetchTicket, value: QueryValue) -> bool {
        {
            let mut control = self.fetches.lock();
            let paused = control.is_paused(&ticket.key);
            let Some(state) = control.states.get_mut(&ticket.key) else {
                return false;
            };
            if state.generation != ticket.generation {
                debug!(key = %ticket.key, "Discarding cancelled fetch result");
                return false;
            }
            state.in_flight = false;
            if paused {
                debug!(key = %ticket.key, "Discarding fetch result for paused key");
                return false;
            }
        }
        self.write(ticket.key, value);
        true
    }

    /// Release a ticket whose fetch failed.
    pub fn abandon_fetch(&self, ticket: FetchTicket) {
        let mut control = self.fetches.lock();
        if let Some(state) = control.states.get_mut(&ticket.key) {
            if state.generation == ticket.generation {
                state.in_flight = false;
            }
        }
    }

    /// Cancel in-flight fetches for matching keys. Their results will be
    /// discarded when they arrive; the requests themselves keep running.
    pub fn cancel_fetches(&self, filter: &KeyFilter) -> usize {
        let mut control = self.fetches.lock();
        let mut cancelled = 0;
        for (key, state) in control.states.iter_mut() {
            if state.in_flight && filter.matches(key) {
                state.generation += 1;
                state.in_flight = false;
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            debug!(cancelled, "Cancelled in-flight fetches");
        }
        cancelled
    }

    /// Cancel matching fetches and refuse new background fetches for them
    /// until [`QueryCache::resume_fetches`] is called.
    pub fn pause_fetches(&self, filter: KeyFilter) -> PauseId {
        self.cancel_fetches(&filter);
        let mut control = self.fetches.lock();
        let id = control.next_pause;
        control.next_pause += 1;
        control.pauses.push((id, filter));
        PauseId(id)
    }

    /// Lift a pause created by [`QueryCache::pause_fetches`].
    pub fn resume_fetches(&self, pause: PauseId) {
        self.fetches.lock().pauses.retain(|(id, _)| *id != pause.0);
    }

    /// True if a fetch for `key` is running.
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.fetches
            .lock()
            .states
            .get(key)
            .is_some_and(|s| s.in_flight)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::cache::edit;
    use crate::domain::{LeadFilter, LeadId, LeadStatus, Page, Resource};
    use crate::testkit::domain::{lead, lead_page};

    fn list_key() -> QueryKey {
        QueryKey::lead_list(&LeadFilter::default())
    }

    fn seeded() -> QueryCache {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.write(list_key(), lead_page(vec![lead("1"), lead("2")]));
        cache
    }

    fn set_status(id: &'static str, status: LeadStatus) -> impl FnMut(&QueryKey, &mut QueryValue) -> bool {
        move |_, value| {
            value.for_each_lead_mut(|l| {
                if l.id.as_str() == id {
                    l.apply_status(status);
                    true
                } else {
                    false
                }
            })
        }
    }

    #[test]
    fn test_write_and_read() {
        let cache = seeded();
        let page = cache.read(&list_key()).unwrap();
        assert_eq!(page.as_lead_page().unwrap().data.len(), 2);
        assert!(!cache.is_stale(&list_key()));
        assert!(cache.is_stale(&QueryKey::pipeline_summary()));
    }

    #[test]
    fn test_versions_are_monotonic() {
        let cache = seeded();
        let v1 = cache.version_of(&list_key()).unwrap();
        let v2 = cache.write(list_key(), lead_page(vec![]));
        assert!(v2 > v1);
    }

    #[test]
    fn test_patch_only_bumps_changed_entries() {
        let cache = seeded();
        let detail = QueryKey::lead(&LeadId::new("9"));
        cache.write(detail.clone(), QueryValue::Lead(lead("9")));
        let detail_version = cache.version_of(&detail).unwrap();

        let report = cache.patch(&KeyFilter::Resource(Resource::Leads), set_status("1", LeadStatus::Won));

        assert_eq!(report.len(), 1);
        assert_eq!(cache.version_of(&detail), Some(detail_version));
        let value = cache.read(&list_key()).unwrap();
        assert_eq!(value.lead(&LeadId::new("1")).unwrap().status, LeadStatus::Won);
    }

    #[test]
    fn test_invalidate_marks_stale_once() {
        let cache = seeded();
        assert_eq!(cache.invalidate(&KeyFilter::Lists(Resource::Leads)), 1);
        assert_eq!(cache.invalidate(&KeyFilter::Lists(Resource::Leads)), 0);
        assert!(cache.is_stale(&list_key()));
        assert_eq!(cache.stale_keys(), vec![list_key()]);
    }

    #[test]
    fn test_rollback_restores_exact_value() {
        let cache = seeded();
        let filter = KeyFilter::lead(&LeadId::new("1"));
        let before = cache.read(&list_key()).unwrap();

        let mut snapshot = cache.snapshot(&filter);
        let report = cache.patch(&filter, set_status("1", LeadStatus::InProgress));
        snapshot.mark_patched(&report);
        assert_ne!(cache.read(&list_key()).unwrap(), before);

        let rollback = cache.rollback(&snapshot);
        assert_eq!(rollback, RollbackReport { restored: 1, reverted: 0, invalidated: 0 });
        assert_eq!(cache.read(&list_key()).unwrap(), before);
    }

    #[test]
    fn test_rollback_does_not_clobber_foreign_write() {
        let cache = seeded();
        let filter = KeyFilter::lead(&LeadId::new("1"));

        let mut snapshot = cache.snapshot(&filter);
        let report = cache.patch(&filter, set_status("1", LeadStatus::InProgress));
        snapshot.mark_patched(&report);

        // A push merge lands before the mutation fails.
        cache.patch(&filter, set_status("2", LeadStatus::Lost));
        let merged = cache.read(&list_key()).unwrap();

        let rollback = cache.rollback(&snapshot);
        assert_eq!(rollback, RollbackReport { restored: 0, reverted: 0, invalidated: 1 });
        assert_eq!(cache.read(&list_key()).unwrap(), merged);
        assert!(cache.is_stale(&list_key()));
    }

    #[test]
    fn test_rollback_with_reverts_patched_record_under_foreign_write() {
        let cache = seeded();
        let filter = KeyFilter::lead(&LeadId::new("1"));

        let mut snapshot = cache.snapshot(&filter);
        let report = cache.patch(&filter, set_status("1", LeadStatus::InProgress));
        snapshot.mark_patched(&report);
        cache.patch(&filter, set_status("2", LeadStatus::Lost));

        let rollback = cache.rollback_with(&snapshot, |_, before, current| {
            edit::revert_lead(before, current, &LeadId::new("1"))
        });

        assert_eq!(rollback, RollbackReport { restored: 0, reverted: 1, invalidated: 1 });
        let value = cache.read(&list_key()).unwrap();
        assert_eq!(value.lead(&LeadId::new("1")).unwrap().status, LeadStatus::Pending);
        assert_eq!(value.lead(&LeadId::new("2")).unwrap().status, LeadStatus::Lost);
        assert!(cache.is_stale(&list_key()));
    }

    #[test]
    fn test_cancelled_fetch_is_discarded() {
        let cache = QueryCache::default();
        let ticket = cache.begin_fetch(&list_key());
        assert!(cache.is_fetching(&list_key()));

        assert_eq!(cache.cancel_fetches(&KeyFilter::Lists(Resource::Leads)), 1);
        assert!(!cache.complete_fetch(ticket, lead_page(vec![lead("1")])));
        assert!(cache.read(&list_key()).is_none());
    }

    #[test]
    fn test_try_begin_fetch_deduplicates_and_respects_pause() {
        let cache = QueryCache::default();
        let ticket = cache.try_begin_fetch(&list_key()).unwrap();
        assert!(cache.try_begin_fetch(&list_key()).is_none());
        cache.abandon_fetch(ticket);

        let pause = cache.pause_fetches(KeyFilter::Resource(Resource::Leads));
        assert!(cache.try_begin_fetch(&list_key()).is_none());
        cache.resume_fetches(pause);
        assert!(cache.try_begin_fetch(&list_key()).is_some());
    }

    #[test]
    fn test_completed_fetch_clears_invalidation() {
        let cache = seeded();
        cache.invalidate(&KeyFilter::All);
        let ticket = cache.begin_fetch(&list_key());
        assert!(cache.complete_fetch(ticket, QueryValue::LeadPage(Page::single(vec![lead("3")]))));
        assert!(!cache.is_stale(&list_key()));
    }

    #[test]
    fn test_notifications() {
        let cache = seeded();
        let mut rx = cache.subscribe();
        cache.invalidate(&KeyFilter::All);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.key, list_key());
        assert_eq!(update.change, ChangeKind::Invalidated);
    }

    #[test]
    fn test_remove() {
        let cache = seeded();
        assert_eq!(cache.remove(&KeyFilter::All), 1);
        assert!(cache.is_empty());
    }
}
