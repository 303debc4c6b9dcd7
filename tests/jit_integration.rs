//! Integration tests for the specialize → stage → dispatch flow.
//!
//! All tests are CPU-only: they use the RecordingBackend in place of the
//! native extension and an isolated staging directory per test.

use std::path::Path;
use std::sync::Arc;
use std::thread;

use candle_core::{DType, Device, Tensor};
use moe_jit::{
    DistributedContext, JitConfig, JitRuntime, KernelRegistry, Platform, RecordingBackend,
    CAPACITY_TOKEN,
};

/// Reduced dispatch-stage template in the shape real kernel modules submit.
const DISPATCH_TEMPLATE: &str = "\
#define capacity (@capacity@)

extern \"C\" __global__ void template_op_kernel0(int* locations, float* dispatched) {
  if (locations[threadIdx.x] < capacity) dispatched[threadIdx.x] = 1.0f;
}
";

fn runtime_at(
    dir: &Path,
    context: DistributedContext,
    backend: Arc<RecordingBackend>,
) -> JitRuntime {
    JitRuntime::with_parts(
        Arc::new(KernelRegistry::new()),
        JitConfig::with_staging_dir(dir),
        Platform::Cuda,
        context,
        backend,
    )
}

#[test]
fn full_flow_stages_and_dispatches() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::new());
    let runtime = runtime_at(
        dir.path(),
        DistributedContext::single_process(),
        Arc::clone(&backend),
    );

    let kernel = runtime.create(DISPATCH_TEMPLATE, 128).unwrap();
    assert_eq!(kernel.handle().index(), 0);

    let staged = std::fs::read_to_string(kernel.source_path()).unwrap();
    assert!(staged.starts_with("#include <cuda_runtime.h>"));
    assert!(staged.contains("#define capacity (128)"));
    assert!(!staged.contains(CAPACITY_TOKEN));

    let locations = Tensor::zeros((32,), DType::U32, &Device::Cpu).unwrap();
    let dispatched = Tensor::zeros((32,), DType::F32, &Device::Cpu).unwrap();
    kernel.call(&[locations, dispatched]).unwrap();
    kernel.call(&[]).unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].buffers.len(), 2);
    assert_eq!(calls[0].handle, kernel.handle());
    assert_eq!(calls[0].key, 0);
}

#[test]
fn sequential_specializations_get_dense_handles_and_files() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::new());
    let runtime = runtime_at(dir.path(), DistributedContext::single_process(), backend);

    let k64 = runtime.create(DISPATCH_TEMPLATE, 64).unwrap();
    let k128 = runtime.create(DISPATCH_TEMPLATE, 128).unwrap();

    assert_eq!(k64.handle().index(), 0);
    assert_eq!(k128.handle().index(), 1);
    assert!(dir.path().join("0.cu").exists());
    assert!(dir.path().join("1.cu").exists());

    // Same template, different capacity: independent artifacts.
    let a = std::fs::read_to_string(k64.source_path()).unwrap();
    let b = std::fs::read_to_string(k128.source_path()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn distributed_rank_suffixes_staged_names() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::new());
    let context = DistributedContext {
        rank: 3,
        world_size: 4,
    };
    let runtime = runtime_at(dir.path(), context, Arc::clone(&backend));

    runtime.create(DISPATCH_TEMPLATE, 16).unwrap();
    runtime.create(DISPATCH_TEMPLATE, 32).unwrap();
    let kernel = runtime.create(DISPATCH_TEMPLATE, 64).unwrap();

    assert_eq!(kernel.handle().index(), 2);
    assert_eq!(kernel.source_path(), dir.path().join("2-3.cu"));

    kernel.call(&[]).unwrap();
    assert_eq!(backend.calls()[0].key, 3);
}

#[test]
fn concurrent_creation_mints_unique_handles_and_files() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::new());
    let runtime = Arc::new(runtime_at(
        dir.path(),
        DistributedContext::single_process(),
        backend,
    ));

    let threads = 8;
    let per_thread = 8;
    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                (0..per_thread)
                    .map(|i| runtime.create(DISPATCH_TEMPLATE, 16 + i).unwrap())
                    .map(|k| k.handle().index())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut handles: Vec<usize> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    handles.sort_unstable();
    let expected: Vec<usize> = (0..threads * per_thread).collect();
    assert_eq!(handles, expected);

    for h in &expected {
        assert!(dir.path().join(format!("{h}.cu")).exists());
    }
}

#[test]
fn staged_sources_are_never_observed_partially_written() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::new());
    let runtime = runtime_at(dir.path(), DistributedContext::single_process(), backend);

    // Large body so a non-atomic write would be observable mid-flight.
    let body = format!("cap=@capacity@;\n{}", "x".repeat(1 << 20));
    let full_len = {
        let probe = runtime.create(&body, 1).unwrap();
        std::fs::metadata(probe.source_path()).unwrap().len()
    };

    let watched = dir.path().join("1.cu");
    let poller = {
        let watched = watched.clone();
        thread::spawn(move || loop {
            if watched.exists() {
                // Visible means complete: rename publishes the whole file.
                return std::fs::metadata(&watched).unwrap().len();
            }
            std::hint::spin_loop();
        })
    };

    let kernel = runtime.create(&body, 2).unwrap();
    assert_eq!(kernel.source_path(), watched);
    assert_eq!(poller.join().unwrap(), full_len);
}

#[test]
fn buffer_order_and_identity_reach_the_backend() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(RecordingBackend::new());
    let runtime = runtime_at(
        dir.path(),
        DistributedContext::single_process(),
        Arc::clone(&backend),
    );

    let kernel = runtime.create(DISPATCH_TEMPLATE, 8).unwrap();

    let a = Tensor::full(1.0f32, (4,), &Device::Cpu).unwrap();
    let b = Tensor::full(2.0f32, (4,), &Device::Cpu).unwrap();
    let c = Tensor::full(3.0f32, (4,), &Device::Cpu).unwrap();
    kernel.call(&[a, b, c]).unwrap();

    let calls = backend.calls();
    let firsts: Vec<f32> = calls[0]
        .buffers
        .iter()
        .map(|t| t.to_vec1::<f32>().unwrap()[0])
        .collect();
    assert_eq!(firsts, vec![1.0, 2.0, 3.0]);
}
