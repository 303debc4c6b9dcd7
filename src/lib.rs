//! Facade crate for the MoE JIT kernel layer.
//!
//! Re-exports the public API of `moe-jit-core` so downstream model code can
//! depend on a single crate name.

pub use moe_jit_core::*;
