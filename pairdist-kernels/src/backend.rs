//! Backend traits and core types.

use core::fmt;

use pairdist_core::{Element, Result, Summarizable};

use crate::block::RowBlock;
use crate::cpu;
use crate::metric::Metric;
use crate::tensor::{DistanceMatrix, StatsTensor};

/// Identifies which compute backend is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BackendKind {
    /// Host kernels.
    Cpu,
    /// NVIDIA CUDA backend.
    Cuda,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "CPU"),
            Self::Cuda => write!(f, "CUDA"),
        }
    }
}

/// Information about a compute device.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub name: String,
    /// Backend kind.
    pub kind: BackendKind,
    /// Total device memory in bytes (0 if unknown).
    pub total_memory: u64,
    /// Maximum parallelism (threads per block, worker threads, ...).
    pub max_parallelism: usize,
}

impl Summarizable for DeviceInfo {
    fn summary(&self) -> String {
        format!(
            "{} ({}, {} bytes, {} parallel)",
            self.name, self.kind, self.total_memory, self.max_parallelism
        )
    }
}

/// A compute device.
pub trait Device: Send + Sync {
    /// Returns information about the underlying compute device.
    fn device_info(&self) -> DeviceInfo;
}

/// A backend that can run a metric's map step over inputs of type `T`.
///
/// Every backend returns statistics in the same [`StatsTensor`] layout, so
/// accumulation and reduction do not care where the map step ran.
pub trait MapBackend<T: Element>: Device {
    /// Computes the `(a.rows(), b.rows(), k)` partial statistics of every row pair.
    ///
    /// `a` and `b` must have the same number of columns.
    fn map_block(&self, a: &RowBlock<'_, T>, b: &RowBlock<'_, T>, metric: Metric)
        -> Result<StatsTensor>;

    /// Reduces fully accumulated statistics to distances.
    ///
    /// Defaults to the host kernel.
    fn reduce_block(&self, stats: &StatsTensor, metric: Metric) -> Result<DistanceMatrix<f64>> {
        cpu::reduce_block(stats, metric)
    }
}
