//! JIT staging configuration.
//!
//! Environment variables:
//! - `MOE_JIT_STAGING_DIR`: directory for recognized kernel sources
//!   (default: the OS temp dir)
//! - `MOE_JIT_EXTENSION_PATH`: explicit path to the native kernel extension

use std::env;
use std::path::PathBuf;

/// Configuration for staging and backend discovery.
#[derive(Debug, Clone)]
pub struct JitConfig {
    /// Directory where recognized kernel sources are staged. Artifacts live
    /// for the process lifetime; cleanup is an OS concern.
    pub staging_dir: PathBuf,
    /// Explicit path to the native kernel extension library, if any.
    pub extension_path: Option<PathBuf>,
}

impl JitConfig {
    /// Read configuration from the environment with defaults.
    pub fn from_env() -> Self {
        let staging_dir = env::var_os("MOE_JIT_STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let extension_path = env::var_os("MOE_JIT_EXTENSION_PATH").map(PathBuf::from);

        Self {
            staging_dir,
            extension_path,
        }
    }

    /// Configuration with an explicit staging directory.
    pub fn with_staging_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: dir.into(),
            extension_path: None,
        }
    }
}

impl Default for JitConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
