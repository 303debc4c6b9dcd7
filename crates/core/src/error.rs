//! Error types for JIT kernel specialization and dispatch.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while staging or dispatching JIT kernels.
///
/// Template problems are deliberately absent: a malformed template is not
/// rejected at specialization time and only surfaces as a backend compile
/// error on first invocation.
#[derive(Error, Debug)]
pub enum JitError {
    /// Writing or renaming the staged kernel source failed. Fatal, no retry.
    #[error("failed to stage kernel source at {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The native kernel extension could not be loaded.
    #[error(
        "cannot load JIT kernel extension (tried: {tried:?}); \
         did you forget to install the custom kernel extension?"
    )]
    ExtensionLoad { tried: Vec<String> },

    /// The extension library is present but lacks the invoke entry point.
    #[error("kernel extension is missing symbol `{0}`")]
    MissingSymbol(String),

    /// A staged source disappeared between materialization and first call.
    #[error("staged kernel source {0} is missing")]
    MissingArtifact(PathBuf),

    /// A kernel buffer lives on a device the dispatch path cannot address.
    #[error("kernel buffers must be device-resident, got {0}")]
    UnsupportedDevice(String),

    /// A kernel buffer has a dtype the dispatch path cannot pass through FFI.
    #[error("unsupported buffer dtype {0:?} for kernel dispatch")]
    UnsupportedDType(candle_core::DType),

    /// The backend reported a failure while invoking a compiled kernel.
    #[error("backend invoke failed: {0}")]
    Backend(String),

    /// Underlying tensor operation failed.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, JitError>;
