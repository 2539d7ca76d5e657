//! Shared primitives for the pairdist distance kernels.
//!
//! `pairdist-core` holds what every backend agrees on:
//!
//! - **Error types**: [`PairdistError`] and [`Result`]
//! - **Traits**: [`Summarizable`] for one-line descriptions of tensors and devices
//! - **Element types**: [`Element`] over the supported input scalars (f32, f64, i8)
//! - **Masking**: the sentinel-missing rule shared by all kernels

pub mod element;
pub mod error;
pub mod mask;
pub mod traits;

pub use element::{DistanceValue, Element, ElementKind};
pub use error::{PairdistError, Result};
pub use traits::*;
