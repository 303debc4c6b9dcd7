//! JIT specialization and dispatch for sparse MoE device kernels.
//!
//! Kernel template modules hand this crate parametrized source text plus a
//! concrete expert capacity; it substitutes the constant, mints a
//! process-unique handle, stages the finished source atomically under a
//! deterministic name, and returns a thin callable that forwards device
//! buffers to the native backend's invoke entry point. Compilation is owned
//! by the backend and happens lazily on first invocation.
//!
//! ## Submodules
//!
//! - [`registry`]: specialization store (capacity substitution, handle minting)
//! - [`kernel`]: compile-and-invoke bridge ([`JitRuntime`], [`BoundKernel`])
//! - [`staging`]: recognized artifact naming and atomic placement
//! - [`platform`]: CUDA/HIP resolution and source preambles
//! - [`backend`]: backend invoke contract and recording test double
//! - [`extension`]: dynamically loaded native extension (feature `cuda-kernels`)
//! - [`distributed`]: participant identity for multi-process staging
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use moe_jit_core::{CustomKernelExtension, JitConfig, JitRuntime};
//!
//! let config = JitConfig::from_env();
//! let backend = Arc::new(CustomKernelExtension::load(&config)?);
//! let runtime = JitRuntime::new(backend);
//!
//! // Once per distinct specialization, at module init time:
//! let dispatch = runtime.create(DISPATCH_TEMPLATE, capacity)?;
//!
//! // Once per compute call:
//! dispatch.call(&[gates, indices, locations, input, output])?;
//! ```

pub mod backend;
pub mod config;
pub mod distributed;
pub mod error;
#[cfg(feature = "cuda-kernels")]
pub mod extension;
pub mod kernel;
pub mod platform;
pub mod registry;
pub mod staging;

pub use backend::{InvokeBackend, RecordedCall, RecordingBackend};
pub use config::JitConfig;
pub use distributed::DistributedContext;
pub use error::{JitError, Result};
#[cfg(feature = "cuda-kernels")]
pub use extension::CustomKernelExtension;
pub use kernel::{BoundKernel, JitRuntime};
pub use platform::Platform;
pub use registry::{KernelHandle, KernelRegistry, CAPACITY_TOKEN};
pub use staging::SOURCE_EXT;
