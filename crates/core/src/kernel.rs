//! Compile-and-invoke bridge: stage specialized sources, bind callables.
//!
//! [`JitRuntime`] ties the pieces together: the specialization store mints
//! handles, the platform preamble is prepended, the finished source is
//! placed atomically under its recognized name, and the caller gets back a
//! [`BoundKernel`] that forwards buffers to the backend. Compilation itself
//! is never triggered here; the backend builds the staged source on the
//! first real invocation.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use candle_core::Tensor;
use tracing::debug;

use crate::backend::InvokeBackend;
use crate::config::JitConfig;
use crate::distributed::DistributedContext;
use crate::error::{JitError, Result};
use crate::platform::Platform;
use crate::registry::{KernelHandle, KernelRegistry};
use crate::staging;

/// Front end for JIT kernel creation.
///
/// Construction is one-time setup; the runtime is then shared by every
/// kernel template module in the process. All runtimes built with
/// [`JitRuntime::new`] share the process-wide handle counter.
pub struct JitRuntime {
    registry: Arc<KernelRegistry>,
    config: JitConfig,
    platform: Platform,
    context: DistributedContext,
    backend: Arc<dyn InvokeBackend>,
}

impl JitRuntime {
    /// Runtime with environment-derived configuration and identity.
    pub fn new(backend: Arc<dyn InvokeBackend>) -> Self {
        Self::with_parts(
            KernelRegistry::global(),
            JitConfig::from_env(),
            Platform::resolve(),
            DistributedContext::from_env(),
            backend,
        )
    }

    /// Runtime with every collaborator supplied explicitly.
    pub fn with_parts(
        registry: Arc<KernelRegistry>,
        config: JitConfig,
        platform: Platform,
        context: DistributedContext,
        backend: Arc<dyn InvokeBackend>,
    ) -> Self {
        Self {
            registry,
            config,
            platform,
            context,
            backend,
        }
    }

    /// Specialize `template` for `capacity` and stage the result.
    ///
    /// The normal entry point for kernel template modules, called once per
    /// distinct specialization at module-initialization time. The returned
    /// kernel is then invoked once per actual compute call.
    pub fn create(&self, template: &str, capacity: usize) -> Result<BoundKernel> {
        let (source, handle) = self.registry.specialize(template, capacity);
        self.materialize(&source, handle)
    }

    /// Substitute the capacity constant and mint a fresh handle without
    /// staging anything yet.
    pub fn specialize(&self, template: &str, capacity: usize) -> (String, KernelHandle) {
        self.registry.specialize(template, capacity)
    }

    /// Place `source` under the recognized name for `handle` and bind a
    /// callable to it.
    ///
    /// The platform preamble is prepended first; the write is atomic from
    /// the backend's point of view (temp file + rename). Calling this twice
    /// with the same handle yields independent callables resolving to the
    /// same artifact, since the recognized name is a pure function of
    /// handle and identity.
    pub fn materialize(&self, source: &str, handle: KernelHandle) -> Result<BoundKernel> {
        let path = staging::staged_path(&self.config.staging_dir, handle, &self.context);

        let mut unit = String::with_capacity(self.platform.preamble().len() + source.len());
        unit.push_str(self.platform.preamble());
        unit.push_str(source);
        staging::write_staged(&path, &unit)?;

        debug!(%handle, path = %path.display(), "materialized kernel source");
        Ok(BoundKernel {
            handle,
            key: self.context.rank,
            path,
            backend: Arc::clone(&self.backend),
            staged: OnceLock::new(),
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn context(&self) -> DistributedContext {
        self.context
    }
}

/// Callable bound to one compiled kernel artifact.
///
/// Stateless beyond the captured handle and identity; safe to invoke
/// repeatedly and concurrently. Buffers are forwarded to the backend in
/// call order, unchanged; no reordering or batching happens at this layer.
pub struct BoundKernel {
    handle: KernelHandle,
    key: usize,
    path: PathBuf,
    backend: Arc<dyn InvokeBackend>,
    staged: OnceLock<()>,
}

impl BoundKernel {
    /// Forward `buffers` with the captured handle (and identity) to the
    /// backend's invoke entry point.
    ///
    /// The first call verifies once that the staged source still exists;
    /// the backend compiles it on its own first use of the handle, so any
    /// compile error of a malformed template surfaces here, unmodified.
    pub fn call(&self, buffers: &[Tensor]) -> Result<()> {
        self.ensure_staged()?;
        self.backend.invoke(buffers, self.handle, self.key)
    }

    fn ensure_staged(&self) -> Result<()> {
        if self.staged.get().is_some() {
            return Ok(());
        }
        if !self.path.exists() {
            return Err(JitError::MissingArtifact(self.path.clone()));
        }
        let _ = self.staged.set(());
        Ok(())
    }

    pub fn handle(&self) -> KernelHandle {
        self.handle
    }

    /// Participant identity captured at materialization time.
    pub fn key(&self) -> usize {
        self.key
    }

    /// Recognized path of the staged source, for debuggers and cache
    /// inspectors.
    pub fn source_path(&self) -> &Path {
        &self.path
    }
}
