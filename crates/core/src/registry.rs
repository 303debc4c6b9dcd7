//! Specialization store: template substitution and handle minting.
//!
//! A kernel template module submits parametrized source text once per
//! distinct specialization; this module substitutes the capacity constant
//! and mints a process-unique [`KernelHandle`] from a monotonically
//! increasing counter. Handles are dense (0, 1, 2, ...) in call order and
//! never reused, which keeps staged artifact names reproducible for
//! out-of-process tooling.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once, OnceLock};

use tracing::debug;

/// Placeholder token replaced by the decimal capacity during specialization.
pub const CAPACITY_TOKEN: &str = "@capacity@";

/// Process-unique identifier for one specialized kernel artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelHandle(usize);

impl KernelHandle {
    /// Numeric value, used as the staged artifact name stem.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for KernelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns the handle counter and performs template specialization.
///
/// The process normally shares one registry via [`KernelRegistry::global`];
/// tests construct private registries for deterministic numbering.
pub struct KernelRegistry {
    next_handle: AtomicUsize,
    runtime_init: Once,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicUsize::new(0),
            runtime_init: Once::new(),
        }
    }

    /// The process-wide registry. Every runtime built with
    /// [`crate::kernel::JitRuntime::new`] shares this counter, so staged
    /// names never collide within one process.
    pub fn global() -> Arc<KernelRegistry> {
        static GLOBAL: OnceLock<Arc<KernelRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(KernelRegistry::new())))
    }

    /// Substitute `capacity` into `template` and mint a fresh handle.
    ///
    /// Substitution is purely textual: every occurrence of
    /// [`CAPACITY_TOKEN`] becomes the decimal form of `capacity`. No other
    /// validation happens here; a malformed template produces malformed
    /// source whose failure surfaces at backend compile time.
    ///
    /// The first call on a registry runs the one-shot runtime-init step.
    /// Minting is atomic: concurrent callers always receive distinct,
    /// consecutively numbered handles.
    pub fn specialize(&self, template: &str, capacity: usize) -> (String, KernelHandle) {
        self.runtime_init.call_once(|| {
            // Device runtime warm-up is owned by the backend; this layer
            // only marks the start of JIT activity.
            debug!("first kernel specialization, seeding handle counter");
        });

        let source = template.replace(CAPACITY_TOKEN, &capacity.to_string());
        let handle = KernelHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!(%handle, capacity, "specialized kernel template");
        (source, handle)
    }

    /// Number of handles minted so far.
    pub fn minted(&self) -> usize {
        self.next_handle.load(Ordering::Relaxed)
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
