//! Pixel-wise reductions over image collections
//!
//! - Medoid: best-available-pixel composite
//! - Reducers: median, mean, sum, min, max, count, standard deviation
//! - Clear-pixel counts and timestamp unions

mod medoid;
mod reduce;
mod union;

pub use medoid::{medoid, medoid_with_provenance, Medoid, MedoidComposite, MedoidParams};
pub use reduce::{clear_pixel_count, reduce_collection, Reducer, CLEAR_COUNT_BAND};
pub use union::union_collections;

pub(crate) use medoid::median_in_place;

use bapcomp_core::{stack_layout, Error, RasterImage, Result};

/// Common shape and band names of a non-empty stack of images
pub(crate) fn check_stack(images: &[RasterImage]) -> Result<((usize, usize), Vec<String>)> {
    let layout = stack_layout(images)?
        .ok_or_else(|| Error::Algorithm("cannot reduce an empty collection".into()))?;
    Ok((layout.shape, layout.bands))
}
