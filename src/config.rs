//! Subsystem configuration.

/// First serial handed out after each activation.
pub const DEFAULT_TOKEN_SEED: u32 = 0x0100_0000;

/// Default number of threads that can be tracked at once.
pub const DEFAULT_MAX_THREADS: usize = 256;

/// Configuration for [`UserDebugger`](crate::UserDebugger).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdConfig {
    /// Capacity reserved for the session arena at activation.
    pub max_threads: usize,
    /// Seed of the token serial counter. Must be non-zero.
    pub token_seed: u32,
}

impl Default for UdConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            token_seed: DEFAULT_TOKEN_SEED,
        }
    }
}

impl UdConfig {
    /// Set the session capacity.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the token seed. A zero seed is bumped to 1 so the null token is never issued.
    pub fn with_token_seed(mut self, seed: u32) -> Self {
        self.token_seed = seed.max(1);
        self
    }
}
