//! Map/reduce pairwise distance kernels for chunked numeric matrices.
//!
//! Each distance metric is split into a map step that turns a pair of row
//! blocks into additive partial statistics and a reduce step that turns the
//! fully accumulated statistics into distances. Entries `< 0` are missing
//! and excluded pairwise (see [`pairdist_core::mask`]).
//!
//! The map step runs on a [`MapBackend`]: the [`CpuBackend`] is always
//! available as the reference implementation and fallback; the
//! `CudaBackend` (feature `cuda`) runs one device thread per row pair and
//! returns statistics in the same layout.
//!
//! # Quick start
//!
//! ```
//! use pairdist_kernels::{ops, ChunkConfig, CpuBackend, Metric, RowBlock};
//!
//! let data = [4i8, 3, 2, 3, 5, 6, 7, 0];
//! let x = RowBlock::new(&data, 2, 4).unwrap();
//! let d = ops::pairwise_distance(&CpuBackend::new(), &x, Metric::Euclidean, ChunkConfig::new(1, 2))
//!     .unwrap();
//! assert!((d.get(0, 1) - 6.6332).abs() < 1e-4);
//! ```
//!
//! # Auto-selecting a backend
//!
//! ```
//! use pairdist_kernels::{auto_backend, Device};
//!
//! let backend = auto_backend::<f32>();
//! println!("Using: {}", backend.device_info().name);
//! ```

pub mod backend;
pub mod block;
pub mod cpu;
pub mod grid;
pub mod metric;
pub mod ops;
pub mod tensor;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use backend::{BackendKind, Device, DeviceInfo, MapBackend};
pub use block::RowBlock;
pub use cpu::CpuBackend;
pub use grid::{BlockShape, LaunchGrid};
pub use metric::{MapElement, MapKernels, Metric, MetricSpec, METRICS};
pub use ops::ChunkConfig;
pub use tensor::{DistanceMatrix, StatsTensor};

#[cfg(feature = "cuda")]
pub use cuda::{CudaBackend, DeviceScalar, MapKernel};

/// Returns the best available backend for element type `T`.
///
/// Tries CUDA first and falls back to the CPU backend, with a warning,
/// when no device is usable.
#[cfg(feature = "cuda")]
pub fn auto_backend<T: DeviceScalar>() -> Box<dyn MapBackend<T>> {
    match CudaBackend::new() {
        Ok(backend) => Box::new(backend),
        Err(e) => {
            log::warn!("{e}; falling back to CPU kernels");
            Box::new(CpuBackend::new())
        }
    }
}

/// Returns the best available backend for element type `T`.
///
/// Without the `cuda` feature this is always the CPU backend.
#[cfg(not(feature = "cuda"))]
pub fn auto_backend<T: MapElement>() -> Box<dyn MapBackend<T>> {
    Box::new(CpuBackend::new())
}
