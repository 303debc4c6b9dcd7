//! Backend invoke contract and test double.
//!
//! The native compiler/loader subsystem sits behind a single generic entry
//! point keyed by handle. It owns compilation timing: the staged source for
//! a handle is built on its first invocation. This layer only guarantees
//! the recognized source file is complete before `invoke` can be reached.

use std::sync::Mutex;

use candle_core::Tensor;

use crate::error::Result;
use crate::registry::KernelHandle;

/// Native compile-and-run subsystem behind one invoke entry point.
///
/// `buffers` is an ordered, variable-length list whose count, order and
/// dtypes are defined by the kernel template; nothing is validated
/// generically here. `key` is the participant identity (0 when no
/// distributed context is active). Thread-safety of the underlying call is
/// the backend's contract.
pub trait InvokeBackend: Send + Sync {
    fn invoke(&self, buffers: &[Tensor], handle: KernelHandle, key: usize) -> Result<()>;
}

/// One captured invocation, in call order.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub buffers: Vec<Tensor>,
    pub handle: KernelHandle,
    pub key: usize,
}

/// Recording backend for tests: captures every invocation instead of
/// launching anything. CPU tensors are fine here.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All invocations captured so far, in call order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl InvokeBackend for RecordingBackend {
    fn invoke(&self, buffers: &[Tensor], handle: KernelHandle, key: usize) -> Result<()> {
        self.calls.lock().unwrap().push(RecordedCall {
            buffers: buffers.to_vec(),
            handle,
            key,
        });
        Ok(())
    }
}
