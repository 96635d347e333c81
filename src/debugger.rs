//! User debugger lifecycle.
//!
//! [`UserDebugger`] owns the registry, the configuration and the hypervisor
//! glue. One instance is shared by every processor; all of its methods take
//! `&self`.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::config::UdConfig;
use crate::error::Error;
use crate::ops::UdOps;
use crate::registry::ThreadRegistry;
use crate::session::{SessionInfo, ThreadDebuggingSession};
use crate::token::Token;

/// Subsystem state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdState {
    /// Not initialized; every request is rejected.
    Inactive = 0,
    /// Registry is being set up and interception enabled.
    Activating = 1,
    /// Traps and commands are serviced.
    Active = 2,
    /// Sessions are being released.
    Deactivating = 3,
}

impl UdState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Activating,
            2 => Self::Active,
            3 => Self::Deactivating,
            _ => Self::Inactive,
        }
    }
}

/// Hypervisor-side user-mode debugger.
pub struct UserDebugger<O: UdOps> {
    state: AtomicU8,
    registry: ThreadRegistry,
    config: UdConfig,
    ops: O,
}

impl<O: UdOps> UserDebugger<O> {
    /// Create an inactive debugger.
    pub fn new(config: UdConfig, ops: O) -> Self {
        Self {
            state: AtomicU8::new(UdState::Inactive as u8),
            registry: ThreadRegistry::new(),
            config,
            ops,
        }
    }

    pub fn state(&self) -> UdState {
        UdState::from_raw(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == UdState::Active
    }

    pub fn config(&self) -> &UdConfig {
        &self.config
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// Initialize the user debugger. Call from VMX non-root.
    ///
    /// Does nothing if already active. On failure the subsystem stays inactive
    /// and interception is left untouched.
    ///
    /// Returns [`Error::Inactive`] while another caller is activating or
    /// deactivating; the subsystem is not usable yet and the caller may retry.
    pub fn activate(&self) -> Result<(), Error> {
        if let Err(current) = self.state.compare_exchange(
            UdState::Inactive as u8,
            UdState::Activating as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return match UdState::from_raw(current) {
                UdState::Active => Ok(()),
                state => {
                    log::debug!("udbg: activate refused in state {:?}", state);
                    Err(Error::Inactive)
                }
            };
        }

        if let Err(e) = self.registry.initialize(&self.config) {
            log::error!("udbg: activation failed: {}", e);
            self.state.store(UdState::Inactive as u8, Ordering::Release);
            return Err(e);
        }

        // Intercept #DB and #BP on every core before any thread can be trapped.
        self.ops.enable_db_bp_exiting_all_cores();

        self.state.store(UdState::Active as u8, Ordering::Release);
        log::info!(
            "udbg: user debugger active (max_threads={})",
            self.config.max_threads
        );
        Ok(())
    }

    /// Uninitialize the user debugger. Call from VMX non-root.
    ///
    /// Late traps see the subsystem as inactive before any session is freed.
    pub fn deactivate(&self) {
        if self
            .state
            .compare_exchange(
                UdState::Active as u8,
                UdState::Deactivating as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        let released = self.registry.remove_all();
        self.state.store(UdState::Inactive as u8, Ordering::Release);
        log::info!("udbg: user debugger inactive ({} session(s) released)", released);
    }

    /// Start tracking a thread the attach mechanism has prepared.
    ///
    /// `spin_region` is the guest address of the thread's copy of
    /// [`SPIN_LOOP_CODE`](crate::spin_region::SPIN_LOOP_CODE).
    pub fn attach_thread(
        &self,
        process_id: u32,
        thread_id: u32,
        spin_region: u64,
    ) -> Result<Token, Error> {
        if !self.is_active() {
            return Err(Error::Inactive);
        }
        self.registry
            .create_session(process_id, thread_id, spin_region)
    }

    /// Stop tracking one thread, e.g. on thread exit.
    pub fn detach_thread(&self, token: Token) -> Result<(), Error> {
        if !self.is_active() {
            return Err(Error::Inactive);
        }
        self.registry
            .remove(token)
            .map(|_| ())
            .ok_or(Error::UnknownToken(token))
    }

    /// Stop tracking every thread of a terminated process.
    pub fn detach_process(&self, process_id: u32) -> usize {
        if !self.is_active() {
            return 0;
        }
        self.registry.remove_process(process_id)
    }

    pub fn find_by_token(&self, token: Token) -> Option<Arc<ThreadDebuggingSession>> {
        if !self.is_active() {
            return None;
        }
        self.registry.find_by_token(token)
    }

    pub fn find_by_thread(
        &self,
        process_id: u32,
        thread_id: u32,
    ) -> Option<Arc<ThreadDebuggingSession>> {
        if !self.is_active() {
            return None;
        }
        self.registry.find_by_thread(process_id, thread_id)
    }

    /// Status of every tracked thread.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.registry.list()
    }
}
