//! CUDA backend: map kernels on NVIDIA GPUs with runtime compilation.
//!
//! Uses `cudarc` for driver API access and NVRTC to compile the map
//! kernels once per input element type, with FMA contraction off.

pub mod kernels;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use cudarc::driver::{
    CudaContext, CudaFunction, CudaSlice, CudaStream, DeviceRepr, LaunchConfig, PushKernelArg,
};
use cudarc::nvrtc::{compile_ptx_with_opts, CompileOptions};
use log::{debug, info};

use pairdist_core::{ElementKind, PairdistError, Result};

use crate::backend::{BackendKind, Device, DeviceInfo, MapBackend};
use crate::block::RowBlock;
use crate::cpu::check_columns;
use crate::grid::{BlockShape, LaunchGrid};
use crate::metric::{self, MapElement, Metric, METRICS};
use crate::tensor::StatsTensor;

mod sealed {
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i8 {}
}

/// Element types the device kernels are compiled for.
///
/// Sealed: the device reads `T::KIND.size_of()` bytes per element, so only
/// the types the kernels are compiled for may implement it.
pub trait DeviceScalar: MapElement + DeviceRepr + sealed::Sealed {}

impl DeviceScalar for f32 {}
impl DeviceScalar for f64 {}
impl DeviceScalar for i8 {}

const DEVICE_KINDS: [ElementKind; 3] = [ElementKind::F32, ElementKind::F64, ElementKind::I8];

/// A compiled map kernel, tied to the metric it computes and the element
/// type it reads.
///
/// Only [`CudaBackend::kernel_for`] creates these, so the element type is
/// checked at compile time and the metric when the kernel is launched.
pub struct MapKernel<'a, T> {
    metric: Metric,
    function: &'a CudaFunction,
    elem: PhantomData<T>,
}

impl<T> Clone for MapKernel<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MapKernel<'_, T> {}

impl<T> MapKernel<'_, T> {
    /// The metric this kernel computes.
    pub fn metric(&self) -> Metric {
        self.metric
    }
}

/// NVIDIA CUDA compute backend.
///
/// Every map call owns its device allocations and releases them before
/// returning; nothing is cached between calls except compiled kernels.
pub struct CudaBackend {
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    shape: BlockShape,
    name: String,
    total_memory: u64,
    kernels: HashMap<(ElementKind, Metric), CudaFunction>,
}

impl CudaBackend {
    /// Creates a CUDA backend on device 0, compiling all map kernels.
    ///
    /// # Errors
    ///
    /// Returns [`PairdistError::BackendUnavailable`] if no CUDA device is
    /// available, the driver cannot be loaded, or kernel compilation fails.
    pub fn new() -> Result<Self> {
        Self::with_block_shape(BlockShape::default())
    }

    /// Creates a CUDA backend launching `shape` thread blocks.
    pub fn with_block_shape(shape: BlockShape) -> Result<Self> {
        if shape.threads() == 0 || shape.threads() > 1024 {
            return Err(PairdistError::InvalidInput(format!(
                "CUDA block shape {}×{} must have 1..=1024 threads",
                shape.x, shape.y
            )));
        }
        let ctx = CudaContext::new(0)
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA context init: {e}")))?;
        let stream = ctx.default_stream();
        let name = ctx.name().unwrap_or_else(|_| "CUDA GPU".to_string());
        let (_, total) = cudarc::driver::result::mem_get_info()
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA mem info: {e}")))?;

        let mut compiled = HashMap::new();
        for kind in DEVICE_KINDS {
            let opts = CompileOptions {
                fmad: Some(false),
                ..Default::default()
            };
            let ptx = compile_ptx_with_opts(kernels::kernel_source(kind), opts)
                .map_err(|e| {
                    PairdistError::BackendUnavailable(format!("CUDA kernel compile: {e}"))
                })?;
            let module = ctx
                .load_module(ptx)
                .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA module load: {e}")))?;
            for spec in METRICS {
                let func = module
                    .load_function(spec.device_kernel)
                    .map_err(|e| {
                        PairdistError::BackendUnavailable(format!("CUDA function load: {e}"))
                    })?;
                compiled.insert((kind, spec.metric), func);
            }
        }
        info!(
            "CUDA backend on {} ({} bytes), {} kernels compiled",
            name,
            total,
            compiled.len()
        );

        Ok(Self {
            ctx,
            stream,
            shape,
            name,
            total_memory: total as u64,
            kernels: compiled,
        })
    }

    /// Expose the CUDA context for reuse by callers that stage their own data.
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.ctx
    }

    /// The compiled map kernel for element type `T` and `metric`.
    pub fn kernel_for<T: DeviceScalar>(&self, metric: Metric) -> Result<MapKernel<'_, T>> {
        let function = self.kernels.get(&(T::KIND, metric)).ok_or_else(|| {
            PairdistError::BackendUnavailable(format!(
                "no {} kernel compiled for {}",
                metric,
                T::KIND
            ))
        })?;
        Ok(MapKernel {
            metric,
            function,
            elem: PhantomData,
        })
    }

    /// Stages two row blocks on the device, runs `kernel` over their row
    /// pairs and copies the statistics back.
    ///
    /// `kernel` must compute the metric named by `metric_name`; the output
    /// buffer is sized from that registry row, so a mismatch is rejected
    /// before anything is staged. Strided blocks are packed first. The
    /// output has the layout of the CPU map step: `(a.rows(), b.rows(), k)`.
    pub fn call_metric_kernel<T: DeviceScalar>(
        &self,
        a: &RowBlock<'_, T>,
        b: &RowBlock<'_, T>,
        metric_name: &str,
        kernel: MapKernel<'_, T>,
    ) -> Result<StatsTensor> {
        let spec = metric::lookup(metric_name)?;
        if kernel.metric != spec.metric {
            return Err(PairdistError::InvalidInput(format!(
                "{} kernel cannot compute {} statistics",
                kernel.metric, spec.name
            )));
        }
        check_columns(a, b)?;
        let k = spec.n_map_param;
        let (p, q, m) = (a.rows(), b.rows(), a.cols());
        if p == 0 || q == 0 || m == 0 {
            return Ok(StatsTensor::zeros(p, q, k));
        }

        let a_host = a.to_standard_layout();
        let b_host = b.to_standard_layout();

        let input_bytes = (p + q) * m * T::KIND.size_of();
        let output_bytes = p * q * k * std::mem::size_of::<f64>();
        self.ctx
            .bind_to_thread()
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA bind context: {e}")))?;
        let (free, _) = cudarc::driver::result::mem_get_info()
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA mem info: {e}")))?;
        if input_bytes + output_bytes > free {
            return Err(PairdistError::BackendUnavailable(format!(
                "insufficient device memory: need {} bytes, {} free",
                input_bytes + output_bytes,
                free
            )));
        }

        let p_u32 = to_u32(p, "rows of A")?;
        let q_u32 = to_u32(q, "rows of B")?;
        let m_u32 = to_u32(m, "columns")?;
        let grid = LaunchGrid::covering(p, q, self.shape)?;
        grid.check_device_limits()?;
        let cfg = LaunchConfig {
            grid_dim: (grid.blocks.0, grid.blocks.1, 1),
            block_dim: (self.shape.x, self.shape.y, 1),
            shared_mem_bytes: 0,
        };

        let a_dev: CudaSlice<T> = self
            .stream
            .clone_htod(a_host.as_ref())
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA htod: {e}")))?;
        let b_dev: CudaSlice<T> = self
            .stream
            .clone_htod(b_host.as_ref())
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA htod: {e}")))?;
        let out_dev: CudaSlice<f64> = self
            .stream
            .alloc_zeros(p * q * k)
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA alloc: {e}")))?;

        debug!(
            "CUDA {} map for {}: {}×{} pairs, {} columns, grid {:?} of {}×{}",
            spec.name,
            T::KIND,
            p,
            q,
            m,
            grid.blocks,
            self.shape.x,
            self.shape.y
        );
        unsafe {
            self.stream
                .launch_builder(kernel.function)
                .arg(&a_dev)
                .arg(&b_dev)
                .arg(&out_dev)
                .arg(&p_u32)
                .arg(&q_u32)
                .arg(&m_u32)
                .launch(cfg)
        }
        .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA launch: {e}")))?;

        let host = self
            .stream
            .clone_dtoh(&out_dev)
            .map_err(|e| PairdistError::BackendUnavailable(format!("CUDA dtoh: {e}")))?;
        StatsTensor::from_vec(host, p, q, k)
    }
}

fn to_u32(v: usize, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| {
        PairdistError::InvalidInput(format!("{} ({}) exceeds the device index range", what, v))
    })
}

impl Device for CudaBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: self.name.clone(),
            kind: BackendKind::Cuda,
            total_memory: self.total_memory,
            max_parallelism: self.shape.threads() as usize,
        }
    }
}

impl<T: DeviceScalar> MapBackend<T> for CudaBackend {
    fn map_block(
        &self,
        a: &RowBlock<'_, T>,
        b: &RowBlock<'_, T>,
        metric: Metric,
    ) -> Result<StatsTensor> {
        let kernel = self.kernel_for::<T>(metric)?;
        self.call_metric_kernel(a, b, metric.name(), kernel)
    }
}
