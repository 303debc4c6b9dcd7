//! Dynamically loaded native kernel extension.
//!
//! The extension is the compiler/loader subsystem: it watches the staged
//! source path for a handle, builds it on first use, and runs the compiled
//! kernel. It is loaded at runtime with `libloading` (no static linking)
//! and exposes one C entry point:
//!
//! ```c
//! void invoke(const void** buffers, int num_buffers, int handle, int key);
//! ```
//!
//! Buffer pointers are raw device addresses extracted from candle tensors;
//! they stay valid for the duration of the call because the caller keeps
//! the tensors alive across it.

use std::ffi::c_void;
use std::os::raw::c_int;

use candle_core::{Device, Storage, Tensor};
use libloading::{Library, Symbol};
use tracing::info;

use crate::backend::InvokeBackend;
use crate::config::JitConfig;
use crate::error::{JitError, Result};
use crate::registry::KernelHandle;

/// Library names probed when no explicit extension path is configured.
const EXTENSION_LIBS: &[&str] = &["libmoe_custom_kernel.so", "moe_custom_kernel.so"];

type InvokeFn = unsafe extern "C" fn(*const *const c_void, c_int, c_int, c_int);

/// Native kernel extension loaded from a shared library.
pub struct CustomKernelExtension {
    library: Library,
}

impl CustomKernelExtension {
    /// Load the extension, preferring `MOE_JIT_EXTENSION_PATH` when set.
    ///
    /// Failure here is a fatal startup condition: without the extension no
    /// staged kernel can ever be compiled or invoked.
    pub fn load(config: &JitConfig) -> Result<Self> {
        let mut candidates: Vec<String> = Vec::new();
        if let Some(path) = &config.extension_path {
            candidates.push(path.display().to_string());
        }
        candidates.extend(EXTENSION_LIBS.iter().map(|s| s.to_string()));

        let mut tried = Vec::new();
        for candidate in candidates {
            match unsafe { Library::new(&candidate) } {
                Ok(library) => {
                    info!(library = %candidate, "loaded JIT kernel extension");
                    let extension = Self { library };
                    // Resolve eagerly so a bad build aborts at startup, not
                    // at first compute call.
                    extension.invoke_fn()?;
                    return Ok(extension);
                }
                Err(e) => tried.push(format!("{candidate}: {e}")),
            }
        }
        Err(JitError::ExtensionLoad { tried })
    }

    fn invoke_fn(&self) -> Result<Symbol<'_, InvokeFn>> {
        unsafe { self.library.get(b"invoke\0") }
            .map_err(|_| JitError::MissingSymbol("invoke".to_string()))
    }
}

impl InvokeBackend for CustomKernelExtension {
    fn invoke(&self, buffers: &[Tensor], handle: KernelHandle, key: usize) -> Result<()> {
        let ptrs = buffers
            .iter()
            .map(device_ptr)
            .collect::<Result<Vec<_>>>()?;

        let invoke = self.invoke_fn()?;
        unsafe {
            invoke(
                ptrs.as_ptr(),
                ptrs.len() as c_int,
                handle.index() as c_int,
                key as c_int,
            );
        }
        Ok(())
    }
}

/// Extract the raw device pointer from a tensor as `*const c_void`.
///
/// The pointer is only valid while the tensor is alive; `invoke` borrows
/// the buffer slice for the whole call, which upholds that.
fn device_ptr(tensor: &Tensor) -> Result<*const c_void> {
    use candle_core::cuda_backend::cudarc::driver::DevicePtr;
    use candle_core::DType;

    let (storage, layout) = tensor.storage_and_layout();
    let cuda_storage = match &*storage {
        Storage::Cuda(s) => s,
        _ => {
            return Err(JitError::UnsupportedDevice(format!(
                "{:?}",
                tensor.device().location()
            )))
        }
    };

    let cuda_device = match tensor.device() {
        Device::Cuda(d) => d,
        _ => unreachable!(),
    };
    let stream = cuda_device.cuda_stream();

    let base_ptr = match tensor.dtype() {
        DType::F16 => {
            let slice = cuda_storage.as_cuda_slice::<half::f16>()?;
            let (ptr, _guard) = slice.device_ptr(&stream);
            ptr as *const c_void
        }
        DType::BF16 => {
            let slice = cuda_storage.as_cuda_slice::<half::bf16>()?;
            let (ptr, _guard) = slice.device_ptr(&stream);
            ptr as *const c_void
        }
        DType::F32 => {
            let slice = cuda_storage.as_cuda_slice::<f32>()?;
            let (ptr, _guard) = slice.device_ptr(&stream);
            ptr as *const c_void
        }
        DType::U8 => {
            let slice = cuda_storage.as_cuda_slice::<u8>()?;
            let (ptr, _guard) = slice.device_ptr(&stream);
            ptr as *const c_void
        }
        DType::U32 => {
            let slice = cuda_storage.as_cuda_slice::<u32>()?;
            let (ptr, _guard) = slice.device_ptr(&stream);
            ptr as *const c_void
        }
        DType::I64 => {
            let slice = cuda_storage.as_cuda_slice::<i64>()?;
            let (ptr, _guard) = slice.device_ptr(&stream);
            ptr as *const c_void
        }
        DType::F64 => {
            let slice = cuda_storage.as_cuda_slice::<f64>()?;
            let (ptr, _guard) = slice.device_ptr(&stream);
            ptr as *const c_void
        }
        other => return Err(JitError::UnsupportedDType(other)),
    };

    // Non-zero start offsets happen on sliced buffers.
    let offset = layout.start_offset() * tensor.dtype().size_in_bytes();
    Ok(unsafe { (base_ptr as *const u8).add(offset) } as *const c_void)
}
