//! Thread debugging registry.
//!
//! Owns every live [`ThreadDebuggingSession`]. Sessions live in an arena of
//! slots addressed by [`Token`]; a `(pid, tid)` index serves lookups from the
//! trap path, where only the guest ids of the current thread are known.
//!
//! Storage is reserved up front when the registry is initialized, so inserts
//! and removals after that point never grow the arena. Lookups take the read
//! side of a spin `RwLock` and clone an `Arc`, which is valid in VMX root.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};
use hashbrown::HashMap;
use spin::RwLock;

use crate::config::UdConfig;
use crate::error::Error;
use crate::session::{SessionInfo, ThreadDebuggingSession};
use crate::token::{EPOCH_MASK, MAX_SLOTS, Token};

/// Key for identifying a thread: (process_id, thread_id).
type ThreadKey = (u32, u32);

struct Slot {
    serial: u32,
    session: Option<Arc<ThreadDebuggingSession>>,
}

struct RegistryInner {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_thread: HashMap<ThreadKey, Token>,
    next_serial: u32,
    epoch: u32,
    capacity: usize,
}

impl RegistryInner {
    fn with_config(config: &UdConfig, epoch: u32) -> Result<Self, Error> {
        let capacity = config.max_threads;
        if capacity > MAX_SLOTS {
            return Err(Error::NoMemory);
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| Error::NoMemory)?;
        let mut free = Vec::new();
        free.try_reserve_exact(capacity)
            .map_err(|_| Error::NoMemory)?;
        let mut by_thread = HashMap::new();
        by_thread
            .try_reserve(capacity)
            .map_err(|_| Error::NoMemory)?;

        Ok(Self {
            slots,
            free,
            by_thread,
            next_serial: config.token_seed.max(1),
            epoch,
            capacity,
        })
    }

    fn next_serial(&mut self) -> u32 {
        let serial = self.next_serial;
        // Zero is skipped so the null token can never be produced.
        self.next_serial = self.next_serial.wrapping_add(1).max(1);
        serial
    }

    fn get(&self, token: Token) -> Option<&Arc<ThreadDebuggingSession>> {
        if token.epoch() != self.epoch {
            return None;
        }
        let slot = self.slots.get(token.slot() as usize)?;
        if slot.serial != token.serial() {
            return None;
        }
        slot.session.as_ref()
    }

    fn alloc_slot(&mut self) -> Result<u32, Error> {
        if let Some(idx) = self.free.pop() {
            return Ok(idx);
        }
        if self.slots.len() >= self.capacity {
            return Err(Error::RegistryFull);
        }
        let idx = u32::try_from(self.slots.len()).map_err(|_| Error::RegistryFull)?;
        self.slots.push(Slot {
            serial: 0,
            session: None,
        });
        Ok(idx)
    }
}

/// Registry of tracked threads.
pub struct ThreadRegistry {
    inner: RwLock<Option<RegistryInner>>,
    /// Bumped on every initialization; outlives `remove_all`.
    epoch: AtomicU32,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    /// Create an uninitialized registry. Every operation fails until
    /// [`initialize`](Self::initialize) succeeds.
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(None),
            epoch: AtomicU32::new(0),
        }
    }

    /// Reserve storage, reset the token seed and start a new epoch.
    ///
    /// Any previous content is dropped. Tokens issued before this call no
    /// longer resolve, even when the new serials repeat the old ones.
    pub fn initialize(&self, config: &UdConfig) -> Result<(), Error> {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel).wrapping_add(1) & EPOCH_MASK;
        let inner = RegistryInner::with_config(config, epoch)?;
        *self.inner.write() = Some(inner);
        log::debug!(
            "udbg: registry initialized (capacity={}, seed={:#x}, epoch={})",
            config.max_threads,
            config.token_seed,
            epoch
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Create a session for `(process_id, thread_id)`.
    ///
    /// A thread that already has a session is rejected and keeps its session.
    pub fn create_session(
        &self,
        process_id: u32,
        thread_id: u32,
        spin_region: u64,
    ) -> Result<Token, Error> {
        let mut guard = self.inner.write();
        let inner = guard.as_mut().ok_or(Error::Inactive)?;

        let key = (process_id, thread_id);
        if let Some(existing) = inner.by_thread.get(&key) {
            return Err(Error::AlreadyTracked(*existing));
        }

        let idx = inner.alloc_slot()?;
        let serial = inner.next_serial();
        let token = Token::new(serial, inner.epoch, idx);
        let slot = &mut inner.slots[idx as usize];
        slot.serial = serial;
        slot.session = Some(Arc::new(ThreadDebuggingSession::new(
            token,
            process_id,
            thread_id,
            spin_region,
        )));
        inner.by_thread.insert(key, token);

        log::info!(
            "udbg: tracking pid={} tid={} token={} spin={:#x}",
            process_id,
            thread_id,
            token,
            spin_region
        );
        Ok(token)
    }

    /// Look up a session by token. Stale and never-issued tokens return `None`.
    pub fn find_by_token(&self, token: Token) -> Option<Arc<ThreadDebuggingSession>> {
        if token.is_null() {
            return None;
        }
        let guard = self.inner.read();
        guard.as_ref()?.get(token).cloned()
    }

    /// Look up a session by guest process and thread id.
    pub fn find_by_thread(
        &self,
        process_id: u32,
        thread_id: u32,
    ) -> Option<Arc<ThreadDebuggingSession>> {
        let guard = self.inner.read();
        let inner = guard.as_ref()?;
        let token = *inner.by_thread.get(&(process_id, thread_id))?;
        inner.get(token).cloned()
    }

    /// Remove one session, e.g. when its thread exits.
    pub fn remove(&self, token: Token) -> Option<Arc<ThreadDebuggingSession>> {
        let mut guard = self.inner.write();
        let inner = guard.as_mut()?;
        inner.get(token)?;

        let slot = &mut inner.slots[token.slot() as usize];
        let session = slot.session.take()?;
        inner
            .by_thread
            .remove(&(session.process_id(), session.thread_id()));
        inner.free.push(token.slot());

        log::info!(
            "udbg: untracked pid={} tid={} token={}",
            session.process_id(),
            session.thread_id(),
            token
        );
        Some(session)
    }

    /// Remove every session of a process. Returns the number removed.
    pub fn remove_process(&self, process_id: u32) -> usize {
        let mut guard = self.inner.write();
        let Some(inner) = guard.as_mut() else {
            return 0;
        };

        let RegistryInner {
            slots,
            free,
            by_thread,
            ..
        } = inner;
        let mut removed = 0;
        by_thread.retain(|&(pid, _), token| {
            if pid != process_id {
                return true;
            }
            slots[token.slot() as usize].session = None;
            free.push(token.slot());
            removed += 1;
            false
        });

        if removed > 0 {
            log::info!("udbg: untracked {} thread(s) of pid={}", removed, process_id);
        }
        removed
    }

    /// Unlink and release every session, then return to the uninitialized state.
    ///
    /// Cannot fail. A session still referenced by a processor that is
    /// mid-exit is unlinked here and freed when that reference drops.
    pub fn remove_all(&self) -> usize {
        let Some(inner) = self.inner.write().take() else {
            return 0;
        };
        let count = inner.slots.iter().filter(|s| s.session.is_some()).count();
        drop(inner);
        log::info!("udbg: released {} thread debugging session(s)", count);
        count
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .as_ref()
            .map_or(0, |inner| inner.by_thread.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all live sessions ordered by slot.
    pub fn list(&self) -> Vec<SessionInfo> {
        let guard = self.inner.read();
        match guard.as_ref() {
            Some(inner) => inner
                .slots
                .iter()
                .filter_map(|s| s.session.as_deref().map(SessionInfo::from))
                .collect(),
            None => Vec::new(),
        }
    }
}
