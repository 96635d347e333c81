//! Fixed-capacity per-thread command mailbox.
//!
//! The producer is the controller's request path, which may run where
//! allocation and blocking are not allowed; the consumer is the processor
//! currently running the paused thread. Slots are claimed with a CAS on the
//! kind word, the payload is written, then the kind is published with
//! `Release`. A poller that loads a kind with `Acquire` therefore always sees
//! a complete payload, and a slot still being written is skipped.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Number of action slots per thread.
pub const MAX_USER_ACTIONS_FOR_THREADS: usize = 3;

/// Kind word of a slot that a producer is filling.
const KIND_WRITING: u32 = u32::MAX;

/// User debugger command kinds.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Empty slot.
    None = 0,
    /// Resume the paused thread at its saved context.
    Continue = 1,
}

impl ActionKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Continue),
            _ => None,
        }
    }
}

/// One queued command with its optional parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingAction {
    /// Raw action kind, see [`ActionKind`].
    pub kind: u32,
    pub params: [u64; 4],
}

impl PendingAction {
    pub fn new(kind: ActionKind, params: [u64; 4]) -> Self {
        Self {
            kind: kind as u32,
            params,
        }
    }

    /// Continue without parameters.
    pub fn continue_thread() -> Self {
        Self::new(ActionKind::Continue, [0; 4])
    }

    /// Decoded kind, `None` if the kind is not known to this build.
    pub fn action(&self) -> Option<ActionKind> {
        ActionKind::from_raw(self.kind)
    }

    /// Whether this action can be placed in a mailbox.
    pub fn is_enqueueable(&self) -> bool {
        self.kind != ActionKind::None as u32 && self.kind != KIND_WRITING
    }
}

struct ActionSlot {
    kind: AtomicU32,
    params: [AtomicU64; 4],
}

impl ActionSlot {
    const fn new() -> Self {
        Self {
            kind: AtomicU32::new(ActionKind::None as u32),
            params: [
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
                AtomicU64::new(0),
            ],
        }
    }
}

/// Fixed slot array of pending actions.
pub struct Mailbox {
    slots: [ActionSlot; MAX_USER_ACTIONS_FOR_THREADS],
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            slots: [const { ActionSlot::new() }; MAX_USER_ACTIONS_FOR_THREADS],
        }
    }

    /// Place `action` in the first empty slot.
    ///
    /// Returns the slot index, or `None` when every slot is occupied. The
    /// caller is responsible for rejecting non-enqueueable kinds.
    pub fn push(&self, action: &PendingAction) -> Option<usize> {
        debug_assert!(action.is_enqueueable());

        for (idx, slot) in self.slots.iter().enumerate() {
            if slot
                .kind
                .compare_exchange(
                    ActionKind::None as u32,
                    KIND_WRITING,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                )
                .is_err()
            {
                continue;
            }

            for (dst, src) in slot.params.iter().zip(action.params.iter()) {
                dst.store(*src, Ordering::Relaxed);
            }
            // Publishing the kind last makes the slot visible to the poller.
            slot.kind.store(action.kind, Ordering::Release);
            return Some(idx);
        }

        None
    }

    /// Take the first ready action, leaving its slot empty.
    ///
    /// Only the processor servicing the owning thread may call this.
    pub fn pop(&self) -> Option<PendingAction> {
        for slot in self.slots.iter() {
            let kind = slot.kind.load(Ordering::Acquire);
            if kind == ActionKind::None as u32 || kind == KIND_WRITING {
                continue;
            }

            let mut params = [0u64; 4];
            for (dst, src) in params.iter_mut().zip(slot.params.iter()) {
                *dst = src.swap(0, Ordering::Relaxed);
            }
            slot.kind.store(ActionKind::None as u32, Ordering::Release);
            return Some(PendingAction { kind, params });
        }

        None
    }

    /// Number of slots holding a ready action.
    pub fn pending(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.kind.load(Ordering::Acquire))
            .filter(|&k| k != ActionKind::None as u32 && k != KIND_WRITING)
            .count()
    }

    pub fn is_full(&self) -> bool {
        self.slots
            .iter()
            .all(|s| s.kind.load(Ordering::Acquire) != ActionKind::None as u32)
    }
}
