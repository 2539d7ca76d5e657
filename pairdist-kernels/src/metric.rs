//! Metric registry.
//!
//! Each metric is a map/reduce pair: the map step turns two vectors into
//! `n_map_param` additive partial statistics, the reduce step turns the
//! fully accumulated statistics into one distance. A row in [`METRICS`]
//! carries everything a backend needs: the parameter count, the CPU map
//! kernel per element type, the reduce kernel and the device entry point.
//! Adding a metric means writing its kernels and adding its row.

use core::fmt;
use core::str::FromStr;

use pairdist_core::{Element, PairdistError, Result};

use crate::cpu;

/// A per-pair map kernel: writes `n_map_param` statistics into `out`.
pub type PairMapFn<T> = fn(&[T], &[T], &mut [f64]);

/// A per-pair reduce kernel: one accumulated statistics vector to one distance.
pub type PairReduceFn = fn(&[f64]) -> f64;

/// A metric's CPU map kernel for every supported element type.
#[derive(Clone, Copy)]
pub struct MapKernels {
    pub f32: PairMapFn<f32>,
    pub f64: PairMapFn<f64>,
    pub i8: PairMapFn<i8>,
}

/// Instantiates a generic map kernel for every element type.
macro_rules! map_kernels {
    ($kernel:path) => {
        MapKernels {
            f32: $kernel,
            f64: $kernel,
            i8: $kernel,
        }
    };
}

/// Element types with a map kernel in every registry row.
pub trait MapElement: Element {
    /// Picks this type's kernel out of a registry row.
    fn select(kernels: &MapKernels) -> PairMapFn<Self>;
}

impl MapElement for f32 {
    fn select(kernels: &MapKernels) -> PairMapFn<Self> {
        kernels.f32
    }
}

impl MapElement for f64 {
    fn select(kernels: &MapKernels) -> PairMapFn<Self> {
        kernels.f64
    }
}

impl MapElement for i8 {
    fn select(kernels: &MapKernels) -> PairMapFn<Self> {
        kernels.i8
    }
}

/// Supported distance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Metric {
    /// `1 - pearson(x, y)` over pairwise-valid positions.
    Correlation,
    /// L2 distance over pairwise-valid positions.
    Euclidean,
}

/// One registry row.
#[derive(Clone, Copy)]
pub struct MetricSpec {
    pub metric: Metric,
    /// Name used for lookup.
    pub name: &'static str,
    /// Number of partial statistics the map step produces per row pair.
    pub n_map_param: usize,
    /// CPU map kernels.
    pub map: MapKernels,
    /// Reduce kernel, shared by every backend.
    pub reduce: PairReduceFn,
    /// Entry point of the device map kernel.
    pub device_kernel: &'static str,
}

impl fmt::Debug for MetricSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricSpec")
            .field("name", &self.name)
            .field("n_map_param", &self.n_map_param)
            .field("device_kernel", &self.device_kernel)
            .finish()
    }
}

/// The registry.
pub const METRICS: &[MetricSpec] = &[
    MetricSpec {
        metric: Metric::Correlation,
        name: "correlation",
        n_map_param: 6,
        map: map_kernels!(cpu::correlation_map),
        reduce: cpu::correlation_reduce,
        device_kernel: "correlation_map",
    },
    MetricSpec {
        metric: Metric::Euclidean,
        name: "euclidean",
        n_map_param: 1,
        map: map_kernels!(cpu::euclidean_map),
        reduce: cpu::euclidean_reduce,
        device_kernel: "euclidean_map",
    },
];

/// Finds a registry row by metric name.
pub fn lookup(name: &str) -> Result<&'static MetricSpec> {
    METRICS
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| PairdistError::UnknownMetric(name.to_string()))
}

impl Metric {
    /// All registered metrics.
    pub fn all() -> impl Iterator<Item = Metric> {
        METRICS.iter().map(|spec| spec.metric)
    }

    /// This metric's registry row.
    pub fn spec(self) -> &'static MetricSpec {
        match METRICS.iter().find(|spec| spec.metric == self) {
            Some(spec) => spec,
            None => unreachable!("{self:?} has no registry row"),
        }
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn n_map_param(self) -> usize {
        self.spec().n_map_param
    }

    /// The CPU map kernel specialized for element type `T`.
    pub fn map_fn<T: MapElement>(self) -> PairMapFn<T> {
        T::select(&self.spec().map)
    }

    /// Reduces one fully accumulated statistics vector.
    #[inline]
    pub fn reduce_pair(self, stats: &[f64]) -> f64 {
        (self.spec().reduce)(stats)
    }
}

impl FromStr for Metric {
    type Err = PairdistError;

    fn from_str(s: &str) -> Result<Self> {
        lookup(s).map(|spec| spec.metric)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
