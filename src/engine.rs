//! Top-level wiring: owns the account store, dictionaries, inverted indexes,
//! group cache and email set, and serializes writers through a single
//! admission lock (§5). This is the object every HTTP handler, the loader
//! (C14), and the rebuild scheduler (C11) share one `Arc` of.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::dictionary::Dictionaries;
use crate::error::EngineResult;
use crate::group::GroupCache;
use crate::index::IndexStorage;
use crate::store::AccountStore;

pub struct Engine {
    pub store: AccountStore,
    pub dict: Dictionaries,
    pub index: IndexStorage,
    pub group_cache: GroupCache,
    pub emails: RwLock<HashSet<String>>,
    /// The `NOW` scalar (seconds since epoch), loaded once from `options.txt`
    /// and never mutated afterward (§3).
    pub now: i64,

    /// Serializes create/update/likes against each other (§5). Reads never
    /// take this lock.
    writer_lock: Mutex<()>,
    /// Monotonic marker of the last successful write, used by the rebuild
    /// scheduler to detect quiescence.
    last_write_at: RwLock<Instant>,
    /// Set while a rebuild (C11) is in flight; new requests are rejected
    /// while this is true (§5) to avoid racing index mutation.
    rebuilding: AtomicBool,
    /// Counts writes since the last rebuild; a rebuild is only worth doing if
    /// this is nonzero.
    writes_since_rebuild: AtomicI64,
}

impl Engine {
    pub fn new(now: i64) -> Self {
        Engine {
            store: AccountStore::new(),
            dict: Dictionaries::new(),
            index: IndexStorage::new(),
            group_cache: GroupCache::new(),
            emails: RwLock::new(HashSet::new()),
            now,
            writer_lock: Mutex::new(()),
            last_write_at: RwLock::new(Instant::now()),
            rebuilding: AtomicBool::new(false),
            writes_since_rebuild: AtomicI64::new(0),
        }
    }

    /// Acquires the single-writer admission slot for the duration of `f`.
    /// Marks the quiescence clock and bumps the dirty counter only when `f`
    /// succeeds — a rejected write (e.g. a duplicate-email create) touches no
    /// store state and should not reschedule a rebuild.
    pub(crate) fn with_writer_lock<T>(&self, f: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
        let _guard = self.writer_lock.lock();
        let result = f();
        if result.is_ok() {
            *self.last_write_at.write() = Instant::now();
            self.writes_since_rebuild.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::SeqCst)
    }

    /// Quiescence check used by the rebuild scheduler (§4.8, §9): at least one
    /// write since the last rebuild, and no write for at least `window`.
    pub fn due_for_rebuild(&self, window: Duration) -> bool {
        if self.writes_since_rebuild.load(Ordering::SeqCst) == 0 {
            return false;
        }
        self.last_write_at.read().elapsed() >= window
    }

    /// Runs a full rebuild (C11): resorts adjacency, rebuilds every inverted
    /// index and the recommend buckets. The group cache is untouched — it is
    /// maintained strictly incrementally (§4.8).
    pub fn run_rebuild(&self) {
        self.rebuilding.store(true, Ordering::SeqCst);
        crate::rebuild::rebuild_all(self);
        self.writes_since_rebuild.store(0, Ordering::SeqCst);
        self.rebuilding.store(false, Ordering::SeqCst);
    }
}
