//! CUDA C map kernels for runtime compilation via NVRTC.
//!
//! The source is specialized per input element type by prefixing an
//! `ELEM_T` definition. Each thread owns one `(i, j)` output slot and
//! accumulates in double precision; threads past the output bounds return
//! before touching memory.

use pairdist_core::ElementKind;

/// Map kernel source, generic over `ELEM_T`.
pub const KERNEL_SOURCE: &str = r#"
#ifndef ELEM_T
#define ELEM_T double
#endif

extern "C" {

// 2D grid: x covers rows of A, y covers rows of B.
// out is (p, q, k) row-major.

__global__ void euclidean_map(
    const ELEM_T* x,
    const ELEM_T* y,
    double* out,
    unsigned int p,
    unsigned int q,
    unsigned int m
) {
    unsigned int i = blockIdx.x * blockDim.x + threadIdx.x;
    unsigned int j = blockIdx.y * blockDim.y + threadIdx.y;
    if (i >= p || j >= q) return;

    const ELEM_T* a = x + (size_t)i * m;
    const ELEM_T* b = y + (size_t)j * m;

    double square_sum = 0.0;
    for (unsigned int d = 0; d < m; d++) {
        double av = (double)a[d];
        double bv = (double)b[d];
        if (av >= 0.0 && bv >= 0.0) {
            double diff = av - bv;
            square_sum += diff * diff;
        }
    }
    out[(size_t)i * q + j] = square_sum;
}

__global__ void correlation_map(
    const ELEM_T* x,
    const ELEM_T* y,
    double* out,
    unsigned int p,
    unsigned int q,
    unsigned int m
) {
    unsigned int i = blockIdx.x * blockDim.x + threadIdx.x;
    unsigned int j = blockIdx.y * blockDim.y + threadIdx.y;
    if (i >= p || j >= q) return;

    const ELEM_T* a = x + (size_t)i * m;
    const ELEM_T* b = y + (size_t)j * m;

    // Registers, written once at the end.
    double sx = 0.0, sy = 0.0, sxx = 0.0, syy = 0.0, sxy = 0.0, n = 0.0;
    for (unsigned int d = 0; d < m; d++) {
        double av = (double)a[d];
        double bv = (double)b[d];
        if (av >= 0.0 && bv >= 0.0) {
            sx += av;
            sy += bv;
            sxx += av * av;
            syy += bv * bv;
            sxy += av * bv;
            n += 1.0;
        }
    }

    double* slot = out + ((size_t)i * q + j) * 6;
    slot[0] = sx;
    slot[1] = sy;
    slot[2] = sxx;
    slot[3] = syy;
    slot[4] = sxy;
    slot[5] = n;
}

} // extern "C"
"#;

/// Kernel source specialized for `kind`.
pub fn kernel_source(kind: ElementKind) -> String {
    format!("#define ELEM_T {}\n{}", kind.c_type(), KERNEL_SOURCE)
}
