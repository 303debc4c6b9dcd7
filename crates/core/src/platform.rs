//! Device-runtime platform resolution.
//!
//! Staged kernel sources start with a platform-specific preamble selecting
//! the CUDA or HIP runtime headers. The platform is resolved once per
//! process and cached: an explicit `MOE_JIT_PLATFORM` override wins,
//! otherwise the HIP runtime library is probed dynamically and CUDA is the
//! default when neither signal is present. A wrong default is not an error
//! here; it surfaces later as a backend compile failure.

use std::sync::OnceLock;

use tracing::{debug, info};

/// Runtime include set for CUDA kernel sources.
pub const CUDA_PREAMBLE: &str = "#include <cuda_runtime.h>\n#include <cuda_fp16.h>\n";

/// Runtime include set for HIP kernel sources.
pub const HIP_PREAMBLE: &str = "#include <hip/hip_runtime.h>\n#include <hip/hip_fp16.h>\n";

/// Candidate sonames for the HIP runtime, newest first.
const HIP_RUNTIME_LIBS: &[&str] = &["libamdhip64.so", "libamdhip64.so.6", "libamdhip64.so.5"];

/// Device-runtime family a kernel source is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Cuda,
    Hip,
}

impl Platform {
    /// Resolve the platform for this process, caching the first answer.
    pub fn resolve() -> Self {
        static RESOLVED: OnceLock<Platform> = OnceLock::new();
        *RESOLVED.get_or_init(|| {
            let platform = Self::detect();
            info!(?platform, "resolved device-runtime platform");
            platform
        })
    }

    /// Uncached detection: env override, then HIP runtime probe, then CUDA.
    fn detect() -> Self {
        match std::env::var("MOE_JIT_PLATFORM").ok().as_deref() {
            Some("cuda") => return Self::Cuda,
            Some("hip") => return Self::Hip,
            Some(other) => debug!(value = other, "ignoring unrecognized MOE_JIT_PLATFORM"),
            None => {}
        }
        if hip_runtime_present() {
            Self::Hip
        } else {
            Self::Cuda
        }
    }

    /// Header boilerplate prepended to every staged source on this platform.
    pub fn preamble(self) -> &'static str {
        match self {
            Self::Cuda => CUDA_PREAMBLE,
            Self::Hip => HIP_PREAMBLE,
        }
    }
}

/// Probe for a loadable HIP runtime library.
fn hip_runtime_present() -> bool {
    for name in HIP_RUNTIME_LIBS {
        if unsafe { libloading::Library::new(name) }.is_ok() {
            debug!(library = name, "HIP runtime detected");
            return true;
        }
    }
    false
}
