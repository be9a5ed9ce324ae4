//! Spectral indices
//!
//! Ratio indices (NBR, NDMI, NDVI, ...), tasseled-cap components, the
//! tasseled-cap angle and NDFI from spectral unmixing, computed per pixel
//! from harmonized fixed-point reflectance.

mod compute;
mod spectral;
mod standardize;
pub mod tasseled_cap;
pub mod unmix;

pub use compute::{compute_index, transform_collection, IndexRequest};
pub use spectral::SpectralIndex;
pub use standardize::standardize;
